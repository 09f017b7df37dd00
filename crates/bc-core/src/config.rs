//! Core configuration, embedded by hosts in their own config files.
//!
//! ```toml
//! [identity]
//! alias = "bharatconnect_identity"
//! validity_days = 3650
//! signing = true
//! require_hardware = false
//!
//! [envelope]
//! suite = "chacha20poly1305"
//! accepted_suites = ["chacha20poly1305", "aes-256-gcm"]
//! ```

use bc_crypto::Suite;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keystore::{validate_alias, KeySpec, KeystoreError, SecurityLevel, MAX_VALIDITY_DAYS};

pub const DEFAULT_IDENTITY_ALIAS: &str = "bharatconnect_identity";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub envelope: EnvelopeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Key container alias the identity lives under.
    #[serde(default = "default_alias")]
    pub alias: String,

    #[serde(default = "default_validity_days")]
    pub validity_days: u32,

    /// Generate an Ed25519 signing companion with the identity.
    #[serde(default = "default_true")]
    pub signing: bool,

    /// Refuse to provision unless the store is StrongBox-backed.
    #[serde(default)]
    pub require_hardware: bool,
}

fn default_alias() -> String {
    DEFAULT_IDENTITY_ALIAS.to_string()
}

fn default_validity_days() -> u32 {
    3650
}

fn default_true() -> bool {
    true
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            validity_days: default_validity_days(),
            signing: true,
            require_hardware: false,
        }
    }
}

impl IdentityConfig {
    /// Key spec for a fresh identity, validity starting now.
    pub fn key_spec(&self) -> Result<KeySpec, KeystoreError> {
        let spec = KeySpec::agreement(self.validity_days)?.with_signing(self.signing);
        Ok(if self.require_hardware {
            spec.requiring(SecurityLevel::StrongBox)
        } else {
            spec
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Suite used when sealing.
    #[serde(default = "default_suite")]
    pub suite: String,

    /// Suites accepted when opening.
    #[serde(default = "default_accepted_suites")]
    pub accepted_suites: Vec<String>,
}

fn default_suite() -> String {
    Suite::default().name().to_string()
}

fn default_accepted_suites() -> Vec<String> {
    Suite::ALL.iter().map(|s| s.name().to_string()).collect()
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            suite: default_suite(),
            accepted_suites: default_accepted_suites(),
        }
    }
}

impl EnvelopeConfig {
    pub fn seal_suite(&self) -> Result<Suite, ConfigError> {
        parse_suite(&self.suite)
    }

    pub fn accepted(&self) -> Result<Vec<Suite>, ConfigError> {
        self.accepted_suites.iter().map(|s| parse_suite(s)).collect()
    }
}

fn parse_suite(name: &str) -> Result<Suite, ConfigError> {
    name.parse::<Suite>()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
}

impl CoreConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_alias(&self.identity.alias).map_err(|_| {
            ConfigError::ValidationError(format!(
                "Invalid identity alias '{}': use 1-64 characters from [A-Za-z0-9._-]",
                self.identity.alias
            ))
        })?;

        if self.identity.validity_days == 0 || self.identity.validity_days > MAX_VALIDITY_DAYS {
            return Err(ConfigError::ValidationError(format!(
                "validity_days must be between 1 and {MAX_VALIDITY_DAYS}"
            )));
        }

        let seal = self.envelope.seal_suite()?;
        let accepted = self.envelope.accepted()?;
        if !accepted.contains(&seal) {
            return Err(ConfigError::ValidationError(format!(
                "Sealing suite '{}' is not in accepted_suites",
                seal
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        config.validate().unwrap();
        assert_eq!(config.identity.alias, "bharatconnect_identity");
        assert_eq!(config.identity.validity_days, 3650);
        assert_eq!(config.envelope.seal_suite().unwrap(), Suite::ChaCha20Poly1305);
        assert_eq!(config.envelope.accepted().unwrap(), Suite::ALL.to_vec());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        assert_eq!(CoreConfig::from_toml("").unwrap(), CoreConfig::default());
    }

    #[test]
    fn partial_toml() {
        let config = CoreConfig::from_toml(
            r#"
            [identity]
            alias = "test-key"
            require_hardware = true

            [envelope]
            suite = "aes-256-gcm"
            "#,
        )
        .unwrap();
        assert_eq!(config.identity.alias, "test-key");
        assert!(config.identity.signing);
        assert_eq!(
            config.identity.key_spec().unwrap().min_security_level,
            Some(SecurityLevel::StrongBox)
        );
        assert_eq!(config.envelope.seal_suite().unwrap(), Suite::Aes256Gcm);
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            "[identity]\nalias = \"../up\"",
            "[identity]\nvalidity_days = 0",
            "[identity]\nvalidity_days = 36501",
            "[identity]\nvalidity_days = 4000000000",
            "[envelope]\nsuite = \"rot13\"",
            "[envelope]\nsuite = \"aes-256-gcm\"\naccepted_suites = [\"chacha20poly1305\"]",
        ];
        for case in cases {
            assert!(
                matches!(CoreConfig::from_toml(case), Err(ConfigError::ValidationError(_))),
                "{case}"
            );
        }
    }

    #[test]
    fn round_trips_through_toml() {
        let config = CoreConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(CoreConfig::from_toml(&text).unwrap(), config);
    }
}
