//! Error taxonomy for the identity core.
//!
//! Every failure that leaves this crate is a [`CoreError`], which always
//! resolves to one of the fixed [`ErrorKind`]s. Lower layers keep their own
//! error types ([`CryptoError`], [`KeystoreError`]); conversions happen here
//! so no store- or platform-specific error crosses into the service layer.

use std::fmt;

use bc_crypto::CryptoError;
use serde::Serialize;
use thiserror::Error;

use crate::keystore::KeystoreError;

/// The externally visible failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    NoIdentity,
    UnsupportedHardware,
    KeystoreLocked,
    InvalidPeerKey,
    InvalidKeyLength,
    AuthenticationFailed,
    UnsupportedVersion,
    MalformedInput,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::AlreadyExists,
        ErrorKind::NotFound,
        ErrorKind::NoIdentity,
        ErrorKind::UnsupportedHardware,
        ErrorKind::KeystoreLocked,
        ErrorKind::InvalidPeerKey,
        ErrorKind::InvalidKeyLength,
        ErrorKind::AuthenticationFailed,
        ErrorKind::UnsupportedVersion,
        ErrorKind::MalformedInput,
    ];

    /// Stable string code reported across the bridge.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::NoIdentity => "NO_IDENTITY",
            ErrorKind::UnsupportedHardware => "UNSUPPORTED_HARDWARE",
            ErrorKind::KeystoreLocked => "KEYSTORE_LOCKED",
            ErrorKind::InvalidPeerKey => "INVALID_PEER_KEY",
            ErrorKind::InvalidKeyLength => "INVALID_KEY_LENGTH",
            ErrorKind::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::MalformedInput => "MALFORMED_INPUT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no identity has been provisioned")]
    NoIdentity,

    #[error("unsupported hardware: {0}")]
    UnsupportedHardware(String),

    /// The key container refused the operation (lockout, I/O failure,
    /// corrupted record or key outside its validity window).
    #[error("keystore locked: {0}")]
    KeystoreLocked(String),

    #[error("invalid peer key: {0}")]
    InvalidPeerKey(String),

    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("unsupported envelope version: 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::NoIdentity => ErrorKind::NoIdentity,
            CoreError::UnsupportedHardware(_) => ErrorKind::UnsupportedHardware,
            CoreError::KeystoreLocked(_) => ErrorKind::KeystoreLocked,
            CoreError::InvalidPeerKey(_) => ErrorKind::InvalidPeerKey,
            CoreError::InvalidKeyLength { .. } => ErrorKind::InvalidKeyLength,
            CoreError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            CoreError::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            CoreError::MalformedInput(_) => ErrorKind::MalformedInput,
        }
    }

    /// Map to the structured (kind, message) pair handed to the bridge.
    ///
    /// Store failures can carry file paths or platform text, so they are
    /// reported with a fixed message. Authentication failures never carry
    /// detail.
    pub fn to_reply(&self) -> ErrorReply {
        let kind = self.kind();
        let message = match self {
            CoreError::AuthenticationFailed => "Authentication failed".to_string(),
            CoreError::KeystoreLocked(_) => "Key store unavailable".to_string(),
            other => other.to_string(),
        };
        ErrorReply {
            kind,
            code: kind.code(),
            message,
        }
    }

    /// Whether the full error text may be written to local logs.
    pub fn should_log_details(&self) -> bool {
        !matches!(self, CoreError::AuthenticationFailed)
    }
}

/// Wire-safe failure handed across the bridge boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<CoreError> for ErrorReply {
    fn from(err: CoreError) -> Self {
        err.to_reply()
    }
}

impl From<CryptoError> for CoreError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidPeerKey(detail) => CoreError::InvalidPeerKey(detail),
            CryptoError::InvalidKeyLength { expected, got } => {
                CoreError::InvalidKeyLength { expected, got }
            }
            CryptoError::AuthenticationFailed => CoreError::AuthenticationFailed,
            CryptoError::UnsupportedVersion(v) => CoreError::UnsupportedVersion(v),
            CryptoError::MalformedEnvelope(detail) => CoreError::MalformedInput(detail),
            CryptoError::EntropyUnavailable => {
                CoreError::UnsupportedHardware("system randomness unavailable".to_string())
            }
            CryptoError::EncryptFailed => {
                CoreError::MalformedInput("payload could not be encrypted".to_string())
            }
        }
    }
}

impl From<KeystoreError> for CoreError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::AlreadyExists(alias) => CoreError::AlreadyExists(alias),
            KeystoreError::NotFound(alias) => CoreError::NotFound(alias),
            KeystoreError::UsageNotPermitted { alias, usage } => {
                CoreError::NotFound(format!("{alias} has no {usage} capability"))
            }
            KeystoreError::UnsupportedHardware(detail) => CoreError::UnsupportedHardware(detail),
            KeystoreError::EntropyUnavailable => {
                CoreError::UnsupportedHardware("system randomness unavailable".to_string())
            }
            KeystoreError::InvalidPeerKey(detail) => CoreError::InvalidPeerKey(detail),
            KeystoreError::InvalidAlias(alias) => {
                CoreError::MalformedInput(format!("invalid key alias {alias:?}"))
            }
            KeystoreError::InvalidSpec(detail) => CoreError::MalformedInput(detail),
            err @ (KeystoreError::Locked
            | KeystoreError::KeyExpired(_)
            | KeystoreError::NotYetValid(_)
            | KeystoreError::Corrupted(_)
            | KeystoreError::Io(_)) => CoreError::KeystoreLocked(err.to_string()),
        }
    }
}
