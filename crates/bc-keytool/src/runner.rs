//! Deadline-bounded execution of identity core calls.
//!
//! The core is synchronous and a key store may block (file I/O, a locked
//! device). Every call runs on the blocking pool under a timeout so the
//! tool always answers.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bc_core::keystore::{FileKeyStore, KeystoreError, SecureKeyStore, SoftwareKeyStore};
use bc_core::{CoreError, CryptoService, ErrorReply};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::KeytoolConfig;
use crate::ExitCode;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("{operation} did not complete: {source}")]
    Join {
        operation: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl RunError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunError::Core(err) => ExitCode::from(err.kind()),
            RunError::Timeout { .. } => ExitCode::Timeout,
            RunError::Join { .. } => ExitCode::GeneralError,
        }
    }

    /// Core failures as they would cross a bridge; `None` for failures of
    /// the tool itself.
    pub fn reply(&self) -> Option<ErrorReply> {
        match self {
            RunError::Core(err) => Some(err.to_reply()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no key store directory configured and no default data directory available")]
    NoStoreDir,

    #[error("unknown keystore backend '{0}'")]
    UnknownBackend(String),

    #[error("failed to open key store at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: KeystoreError,
    },

    #[error(transparent)]
    Config(#[from] bc_core::config::ConfigError),
}

/// Open the key container named by the config.
pub fn open_store(config: &KeytoolConfig) -> Result<Arc<dyn SecureKeyStore>, SetupError> {
    match config.keystore.backend.as_str() {
        "memory" => {
            debug!("using in-memory key store");
            Ok(Arc::new(SoftwareKeyStore::new()))
        }
        "file" => {
            let path = config.store_dir().ok_or(SetupError::NoStoreDir)?;
            debug!(path = %path.display(), "opening file key store");
            let store = FileKeyStore::open(path.clone())
                .map_err(|source| SetupError::Store { path, source })?;
            Ok(Arc::new(store))
        }
        other => Err(SetupError::UnknownBackend(other.to_string())),
    }
}

/// Runs service calls on the blocking pool with a deadline.
#[derive(Clone)]
pub struct Runner {
    service: Arc<CryptoService>,
    timeout: Duration,
}

impl Runner {
    pub fn new(service: Arc<CryptoService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Build the store and service described by `config`.
    pub fn from_config(config: &KeytoolConfig) -> Result<Self, SetupError> {
        let store = open_store(config)?;
        let service = CryptoService::new(store, &config.core)?;
        Ok(Self::new(Arc::new(service), config.limits.timeout()))
    }

    pub fn service(&self) -> &Arc<CryptoService> {
        &self.service
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, RunError>
    where
        F: FnOnce(&CryptoService) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let service = self.service.clone();
        let task = tokio::task::spawn_blocking(move || f(&service));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map_err(RunError::from),
            Ok(Err(source)) => Err(RunError::Join { operation, source }),
            Err(_) => {
                // The blocking call keeps running; its result is dropped.
                warn!(operation, timeout = ?self.timeout, "key store call timed out");
                Err(RunError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Drive `future` on a fresh multi-thread runtime, then tear the runtime
/// down without joining blocking calls a timed-out [`Runner::run`] left
/// behind. A hung key store cannot hold the process open.
pub fn block_on_detached<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}
