//! Configuration management for bc-keytool
//!
//! Configuration is stored in TOML format and carries the identity core
//! settings alongside the tool's own key store, logging and limit settings.
//!
//! # Configuration File Locations
//!
//! - Unix: `~/.config/bharatconnect/keytool.toml`
//! - Windows: `%APPDATA%\bharatconnect\keytool.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use bc_core::CoreConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid core configuration: {0}")]
    Core(#[from] bc_core::config::ConfigError),
}

/// Keytool configuration
///
/// # Example TOML
///
/// ```toml
/// [keystore]
/// backend = "file"   # "file" | "memory"
/// dir = ""           # Empty = default data directory
///
/// [core.identity]
/// alias = "bharatconnect_identity"
/// validity_days = 3650
///
/// [core.envelope]
/// suite = "chacha20poly1305"
///
/// [logging]
/// level = "warn"
///
/// [limits]
/// timeout_seconds = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeytoolConfig {
    #[serde(default)]
    pub keystore: KeystoreConfig,

    /// Identity core settings, validated by `bc-core`
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Key container backend: "file" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Directory for the file backend (empty = default data directory)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_backend() -> String {
    "file".to_string()
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Upper bound on a single key store operation
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    10
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
        }
    }
}

impl LimitsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

const VALID_BACKENDS: [&str; 2] = ["file", "memory"];
const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl KeytoolConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: KeytoolConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, or defaults if no file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        match custom_path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    /// The configuration a command runs with: the file (if any) plus CLI
    /// overrides. A file that exists but does not load is an error, never
    /// a silent fallback to defaults, since it may carry security policy.
    pub fn resolve(
        custom_path: Option<&Path>,
        overrides: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        Ok(Self::load_from(custom_path)?.with_overrides(overrides))
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("in", "bharatconnect", "bharatconnect")
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("keytool.toml"))
    }

    /// Default directory for the file key store.
    pub fn default_store_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("keys"))
    }

    /// The configured store directory, falling back to the default.
    pub fn store_dir(&self) -> Option<PathBuf> {
        self.keystore
            .dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
            .or_else(Self::default_store_dir)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write a default config file on first run. Returns whether one was
    /// created.
    pub fn create_default_if_missing() -> Result<bool, ConfigError> {
        if let Some(path) = Self::default_path() {
            if !path.exists() {
                Self::default().save(&path)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_BACKENDS.contains(&self.keystore.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid keystore backend '{}'. Valid values: {:?}",
                self.keystore.backend, VALID_BACKENDS
            )));
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, VALID_LEVELS
            )));
        }

        if self.limits.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        self.core.validate()?;
        Ok(())
    }

    /// Apply CLI overrides. Command-line values take precedence.
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(ref backend) = overrides.backend {
            self.keystore.backend = backend.clone();
        }
        if let Some(ref dir) = overrides.store_dir {
            self.keystore.dir = Some(dir.clone());
        }
        if let Some(timeout) = overrides.timeout_seconds {
            self.limits.timeout_seconds = timeout;
        }
        if let Some(ref alias) = overrides.alias {
            self.core.identity.alias = alias.clone();
        }
        if let Some(ref suite) = overrides.suite {
            self.core.envelope.suite = suite.clone();
        }
        if overrides.debug {
            self.logging.level = "debug".to_string();
        } else if overrides.verbose {
            self.logging.level = "info".to_string();
        }
        self
    }
}

/// CLI flags that override config file values
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backend: Option<String>,
    pub store_dir: Option<PathBuf>,
    pub timeout_seconds: Option<u64>,
    pub alias: Option<String>,
    pub suite: Option<String>,
    pub verbose: bool,
    pub debug: bool,
}
