//! bc-keytool - operator CLI for the BharatConnect identity core
//!
//! This crate provides a command-line interface for:
//! - Provisioning and inspecting the device identity
//! - Encrypting and decrypting envelopes
//! - Wrapping and unwrapping master keys

pub mod cli;
pub mod config;
pub mod output;
pub mod runner;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use config::{CliOverrides, KeytoolConfig};
pub use output::{JsonResponse, OutputFormat, OutputFormatter};
pub use runner::{RunError, Runner};

use bc_core::ErrorKind;

/// Exit codes for CLI operations
///
/// Exit codes provide machine-readable status for scripting:
/// - 0: Success
/// - 1: General error (I/O, configuration)
/// - 2: Authentication failed - envelope did not verify
/// - 3: Timeout - the key store did not answer in time
/// - 4: Invalid input - bad arguments, keys or envelopes
/// - 5: No identity - run `identity init` first
/// - 6: Key store unavailable - locked, corrupted or unreadable
/// - 7: Already exists - strict provisioning found an identity
/// - 8: Unsupported - envelope version or hardware not supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    AuthenticationFailed = 2,
    Timeout = 3,
    InvalidInput = 4,
    NoIdentity = 5,
    KeystoreUnavailable = 6,
    AlreadyExists = 7,
    Unsupported = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ErrorKind> for ExitCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::AuthenticationFailed => ExitCode::AuthenticationFailed,
            ErrorKind::NoIdentity | ErrorKind::NotFound => ExitCode::NoIdentity,
            ErrorKind::KeystoreLocked => ExitCode::KeystoreUnavailable,
            ErrorKind::AlreadyExists => ExitCode::AlreadyExists,
            ErrorKind::UnsupportedHardware | ErrorKind::UnsupportedVersion => {
                ExitCode::Unsupported
            }
            ErrorKind::InvalidPeerKey
            | ErrorKind::InvalidKeyLength
            | ErrorKind::MalformedInput => ExitCode::InvalidInput,
        }
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::AuthenticationFailed => "AUTH_FAILED",
            ExitCode::Timeout => "TIMEOUT",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::NoIdentity => "NO_IDENTITY",
            ExitCode::KeystoreUnavailable => "KEYSTORE_UNAVAILABLE",
            ExitCode::AlreadyExists => "ALREADY_EXISTS",
            ExitCode::Unsupported => "UNSUPPORTED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::AuthenticationFailed => "Envelope failed authentication",
            ExitCode::Timeout => "Key store operation timed out",
            ExitCode::InvalidInput => "Invalid arguments or data provided",
            ExitCode::NoIdentity => "No device identity has been provisioned",
            ExitCode::KeystoreUnavailable => "Key store is locked or unavailable",
            ExitCode::AlreadyExists => "A device identity already exists",
            ExitCode::Unsupported => "Envelope version or hardware not supported",
        }
    }
}
