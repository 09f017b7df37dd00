//! Public façade over identity management and envelope encryption.

use std::sync::Arc;

use bc_crypto::{MasterKey, PublicKeyBytes};
use tracing::{debug, warn};

use crate::config::{ConfigError, CoreConfig};
use crate::envelope::EnvelopeCrypto;
use crate::errors::CoreError;
use crate::identity::{IdentityManager, IdentityState};
use crate::keystore::{KeyInfo, SecureKeyStore};
use crate::locks::AliasLocks;

/// Every operation validates its inputs, then delegates. Failures are
/// always a [`CoreError`].
pub struct CryptoService {
    identity: IdentityManager,
    envelopes: EnvelopeCrypto,
}

impl CryptoService {
    pub fn new(store: Arc<dyn SecureKeyStore>, config: &CoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let locks = Arc::new(AliasLocks::new());
        Ok(Self {
            identity: IdentityManager::new(store.clone(), locks.clone(), config.identity.clone()),
            envelopes: EnvelopeCrypto::new(store, locks, &config.envelope)?,
        })
    }

    pub fn identity(&self) -> &IdentityManager {
        &self.identity
    }

    pub fn envelopes(&self) -> &EnvelopeCrypto {
        &self.envelopes
    }

    pub fn state(&self) -> Result<IdentityState, CoreError> {
        self.identity.state()
    }

    /// Provision the identity if needed and return its public key.
    pub fn generate_identity(&self) -> Result<PublicKeyBytes, CoreError> {
        self.identity.ensure_identity().map_err(log_failure("generate_identity"))
    }

    /// Like [`generate_identity`](Self::generate_identity) but fails with
    /// `AlreadyExists` instead of returning an existing key.
    pub fn provision_identity(&self) -> Result<PublicKeyBytes, CoreError> {
        self.identity.create_identity().map_err(log_failure("provision_identity"))
    }

    pub fn public_key(&self) -> Result<PublicKeyBytes, CoreError> {
        self.identity.public_key()
    }

    pub fn key_info(&self) -> Result<KeyInfo, CoreError> {
        self.identity.key_info()
    }

    /// Ed25519 signature by the identity's signing companion.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64], CoreError> {
        self.identity.sign(message).map_err(log_failure("sign"))
    }

    pub fn signing_public_key(&self) -> Result<[u8; 32], CoreError> {
        self.identity.signing_public_key()
    }

    pub fn encrypt(&self, recipient: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
        require_non_empty("plaintext", plaintext)?;
        debug!(len = plaintext.len(), "encrypt");
        self.envelopes
            .encrypt(recipient, plaintext)
            .map_err(log_failure("encrypt"))
    }

    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, CoreError> {
        require_non_empty("envelope", envelope)?;
        debug!(len = envelope.len(), "decrypt");
        let handle = self.identity.handle()?;
        self.envelopes
            .decrypt(envelope, &handle)
            .map_err(log_failure("decrypt"))
    }

    pub fn wrap_key(&self, recipient: &[u8], master_key: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.envelopes
            .wrap_master_key(master_key, recipient)
            .map_err(log_failure("wrap_key"))
    }

    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<MasterKey, CoreError> {
        require_non_empty("wrapped key", wrapped)?;
        let handle = self.identity.handle()?;
        self.envelopes
            .unwrap_master_key(wrapped, &handle)
            .map_err(log_failure("unwrap_key"))
    }
}

fn require_non_empty(what: &str, bytes: &[u8]) -> Result<(), CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::MalformedInput(format!("{what} is empty")));
    }
    Ok(())
}

fn log_failure(op: &'static str) -> impl Fn(CoreError) -> CoreError {
    move |err| {
        if err.should_log_details() {
            warn!(op, kind = %err.kind(), error = %err, "operation failed");
        } else {
            warn!(op, kind = %err.kind(), "operation failed");
        }
        err
    }
}
