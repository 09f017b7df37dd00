//! Error type shared by every primitive in this crate.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Peer public key has the wrong length, is a low-order point, or
    /// produced a non-contributory shared secret.
    #[error("invalid peer public key: {0}")]
    InvalidPeerKey(String),

    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// Tag verification failed. Deliberately carries no detail.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("unsupported envelope version: 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("system randomness unavailable")]
    EntropyUnavailable,

    #[error("encryption failed")]
    EncryptFailed,
}
