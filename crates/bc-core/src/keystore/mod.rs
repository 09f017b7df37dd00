//! Key container abstraction.
//!
//! A [`SecureKeyStore`] generates and holds asymmetric key pairs and exposes
//! only opaque operations on them: export the public half, run a key
//! agreement, sign. Callers never see a private scalar. Hardware-backed
//! containers implement the same trait; the software stores in this module
//! serve tests and devices without secure hardware.

use std::fmt;

use bc_crypto::{PublicKeyBytes, SharedSecret};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod file;
mod material;
mod memory;

pub use file::FileKeyStore;
pub use memory::SoftwareKeyStore;

pub const MAX_ALIAS_LEN: usize = 64;

/// Longest validity a key may be created with, roughly a century.
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeystoreError {
    #[error("alias already in use: {0}")]
    AlreadyExists(String),

    #[error("no key under alias: {0}")]
    NotFound(String),

    #[error("key {alias} does not permit {usage}")]
    UsageNotPermitted { alias: String, usage: &'static str },

    #[error("required isolation level unavailable: {0}")]
    UnsupportedHardware(String),

    #[error("system randomness unavailable")]
    EntropyUnavailable,

    #[error("invalid peer key: {0}")]
    InvalidPeerKey(String),

    #[error("invalid alias: {0:?}")]
    InvalidAlias(String),

    #[error("invalid key spec: {0}")]
    InvalidSpec(String),

    #[error("key store is locked")]
    Locked,

    #[error("key {0} has expired")]
    KeyExpired(String),

    #[error("key {0} is not yet valid")]
    NotYetValid(String),

    #[error("corrupted key record: {0}")]
    Corrupted(String),

    #[error("key store I/O failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for KeystoreError {
    fn from(err: std::io::Error) -> Self {
        KeystoreError::Io(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    X25519,
}

/// Isolation level a store provides. Ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Software,
    TrustedEnvironment,
    StrongBox,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SecurityLevel::Software => "software",
            SecurityLevel::TrustedEnvironment => "trusted-environment",
            SecurityLevel::StrongBox => "strongbox",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyUsage {
    pub key_agreement: bool,
    pub signing: bool,
}

impl Default for KeyUsage {
    fn default() -> Self {
        Self {
            key_agreement: true,
            signing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ValidityWindow {
    /// Window opening now and lasting `days`, at most [`MAX_VALIDITY_DAYS`].
    pub fn starting_now(days: u32) -> Result<Self, KeystoreError> {
        if days > MAX_VALIDITY_DAYS {
            return Err(KeystoreError::InvalidSpec(format!(
                "validity of {days} days exceeds {MAX_VALIDITY_DAYS}"
            )));
        }
        let now = Utc::now();
        let not_after = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_add_signed(span))
            .ok_or_else(|| {
                KeystoreError::InvalidSpec(format!("validity of {days} days is out of range"))
            })?;
        Ok(Self {
            not_before: now,
            not_after,
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Fails with `KeyExpired` / `NotYetValid` when `at` lies outside.
    pub fn check(&self, alias: &str, at: DateTime<Utc>) -> Result<(), KeystoreError> {
        if at < self.not_before {
            return Err(KeystoreError::NotYetValid(alias.to_string()));
        }
        if at > self.not_after {
            return Err(KeystoreError::KeyExpired(alias.to_string()));
        }
        Ok(())
    }
}

/// Parameters for [`SecureKeyStore::create_key_pair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub curve: Curve,
    pub validity: ValidityWindow,
    pub usage: KeyUsage,
    /// Refuse to create the key unless the store provides at least this.
    pub min_security_level: Option<SecurityLevel>,
}

impl KeySpec {
    /// Agreement key valid for `validity_days` from now.
    pub fn agreement(validity_days: u32) -> Result<Self, KeystoreError> {
        Ok(Self {
            curve: Curve::X25519,
            validity: ValidityWindow::starting_now(validity_days)?,
            usage: KeyUsage::default(),
            min_security_level: None,
        })
    }

    pub fn with_signing(mut self, signing: bool) -> Self {
        self.usage.signing = signing;
        self
    }

    pub fn requiring(mut self, level: SecurityLevel) -> Self {
        self.min_security_level = Some(level);
        self
    }

    pub(crate) fn validate(&self, store_level: SecurityLevel) -> Result<(), KeystoreError> {
        if self.validity.not_after <= self.validity.not_before {
            return Err(KeystoreError::InvalidSpec(
                "validity window is empty or inverted".to_string(),
            ));
        }
        if !self.usage.key_agreement && !self.usage.signing {
            return Err(KeystoreError::InvalidSpec("key has no usage".to_string()));
        }
        if let Some(required) = self.min_security_level {
            if store_level < required {
                return Err(KeystoreError::UnsupportedHardware(format!(
                    "{required} required, store provides {store_level}"
                )));
            }
        }
        Ok(())
    }
}

/// Opaque reference to a key inside a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle {
    alias: String,
}

impl KeyHandle {
    /// Only stores mint handles; callers get them from `create_key_pair`
    /// or `get_handle`.
    pub fn new(alias: impl Into<String>) -> Self {
        Self { alias: alias.into() }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// Public metadata about a stored key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub alias: String,
    pub curve: Curve,
    pub created_at: DateTime<Utc>,
    pub validity: ValidityWindow,
    pub usage: KeyUsage,
    pub security_level: SecurityLevel,
}

/// A container that holds private keys and only performs operations on
/// them.
///
/// Implementations must be internally consistent under concurrent use.
/// Serializing lookup-then-create for one alias is the caller's job (see
/// [`crate::locks::AliasLocks`]); stores themselves report a lost race as
/// `AlreadyExists`.
pub trait SecureKeyStore: Send + Sync {
    fn security_level(&self) -> SecurityLevel;

    fn create_key_pair(&self, alias: &str, spec: &KeySpec) -> Result<KeyHandle, KeystoreError>;

    fn get_handle(&self, alias: &str) -> Result<KeyHandle, KeystoreError>;

    fn export_public_key(&self, handle: &KeyHandle) -> Result<PublicKeyBytes, KeystoreError>;

    /// X25519 with the stored private key.
    fn agree(
        &self,
        handle: &KeyHandle,
        peer: &PublicKeyBytes,
    ) -> Result<SharedSecret, KeystoreError>;

    /// Ed25519 signature with the key's signing companion.
    fn sign(&self, handle: &KeyHandle, message: &[u8]) -> Result<[u8; 64], KeystoreError>;

    /// Public half of the signing companion.
    fn signing_public_key(&self, handle: &KeyHandle) -> Result<[u8; 32], KeystoreError>;

    fn key_info(&self, handle: &KeyHandle) -> Result<KeyInfo, KeystoreError>;
}

/// Aliases double as file names, so keep them to a safe alphabet.
pub fn validate_alias(alias: &str) -> Result<(), KeystoreError> {
    let ok = !alias.is_empty()
        && alias.len() <= MAX_ALIAS_LEN
        && alias != "."
        && alias != ".."
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(KeystoreError::InvalidAlias(alias.to_string()))
    }
}
