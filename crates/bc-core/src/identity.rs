//! Device identity lifecycle.
//!
//! The identity is a single key pair under a fixed alias. Whether it exists
//! is a property of the key container, not of this process: every query
//! goes back to the store, and provisioning is a lookup-then-create under
//! the alias lock.

use std::sync::Arc;

use bc_crypto::PublicKeyBytes;
use tracing::{debug, info, warn};

use crate::config::IdentityConfig;
use crate::errors::CoreError;
use crate::keystore::{KeyHandle, KeyInfo, KeystoreError, SecureKeyStore};
use crate::locks::AliasLocks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    Uninitialized,
    Provisioned,
}

pub struct IdentityManager {
    store: Arc<dyn SecureKeyStore>,
    locks: Arc<AliasLocks>,
    config: IdentityConfig,
}

impl IdentityManager {
    pub fn new(
        store: Arc<dyn SecureKeyStore>,
        locks: Arc<AliasLocks>,
        config: IdentityConfig,
    ) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    pub fn alias(&self) -> &str {
        &self.config.alias
    }

    pub fn state(&self) -> Result<IdentityState, CoreError> {
        match self.store.get_handle(self.alias()) {
            Ok(_) => Ok(IdentityState::Provisioned),
            Err(KeystoreError::NotFound(_)) => Ok(IdentityState::Uninitialized),
            Err(e) => Err(e.into()),
        }
    }

    /// Return the identity public key, creating the key pair on first use.
    ///
    /// Never regenerates an existing key. A creation race lost to another
    /// process resolves to that process's key.
    pub fn ensure_identity(&self) -> Result<PublicKeyBytes, CoreError> {
        self.locks.with_alias(self.alias(), || {
            let handle = match self.store.get_handle(self.alias()) {
                Ok(handle) => {
                    debug!(alias = self.alias(), "identity already provisioned");
                    handle
                }
                Err(KeystoreError::NotFound(_)) => match self.create_locked() {
                    Ok(handle) => handle,
                    Err(KeystoreError::AlreadyExists(_)) => {
                        warn!(alias = self.alias(), "identity created concurrently, reusing it");
                        self.store.get_handle(self.alias())?
                    }
                    Err(e) => return Err(e.into()),
                },
                Err(e) => return Err(e.into()),
            };
            Ok(self.store.export_public_key(&handle)?)
        })
    }

    /// Strict provisioning: fails with `AlreadyExists` if an identity is
    /// already present.
    pub fn create_identity(&self) -> Result<PublicKeyBytes, CoreError> {
        self.locks.with_alias(self.alias(), || {
            match self.store.get_handle(self.alias()) {
                Ok(_) => return Err(CoreError::AlreadyExists(self.alias().to_string())),
                Err(KeystoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            let handle = self.create_locked()?;
            Ok(self.store.export_public_key(&handle)?)
        })
    }

    fn create_locked(&self) -> Result<KeyHandle, KeystoreError> {
        let handle = self
            .store
            .create_key_pair(self.alias(), &self.config.key_spec()?)?;
        let fingerprint = self.store.export_public_key(&handle)?.fingerprint();
        info!(
            alias = self.alias(),
            %fingerprint,
            security_level = %self.store.security_level(),
            "provisioned device identity"
        );
        Ok(handle)
    }

    pub fn handle(&self) -> Result<KeyHandle, CoreError> {
        self.store.get_handle(self.alias()).map_err(no_identity)
    }

    /// Fails with `NoIdentity` until the identity has been provisioned.
    pub fn public_key(&self) -> Result<PublicKeyBytes, CoreError> {
        let handle = self.handle()?;
        Ok(self.store.export_public_key(&handle)?)
    }

    pub fn key_info(&self) -> Result<KeyInfo, CoreError> {
        let handle = self.handle()?;
        Ok(self.store.key_info(&handle)?)
    }

    /// Sign with the identity's Ed25519 companion key.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64], CoreError> {
        let handle = self.handle()?;
        self.locks
            .with_alias(self.alias(), || Ok(self.store.sign(&handle, message)?))
    }

    pub fn signing_public_key(&self) -> Result<[u8; 32], CoreError> {
        let handle = self.handle()?;
        Ok(self.store.signing_public_key(&handle)?)
    }
}

fn no_identity(err: KeystoreError) -> CoreError {
    match err {
        KeystoreError::NotFound(_) => CoreError::NoIdentity,
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::keystore::{SecurityLevel, SoftwareKeyStore};
    use bc_crypto::keys::verify_signature;

    fn manager_with(store: Arc<SoftwareKeyStore>, config: IdentityConfig) -> IdentityManager {
        IdentityManager::new(store, Arc::new(AliasLocks::new()), config)
    }

    fn manager() -> (Arc<SoftwareKeyStore>, IdentityManager) {
        let store = Arc::new(SoftwareKeyStore::new());
        (store.clone(), manager_with(store, IdentityConfig::default()))
    }

    #[test]
    fn ensure_is_idempotent() {
        let (store, ids) = manager();
        assert_eq!(ids.state().unwrap(), IdentityState::Uninitialized);

        let first = ids.ensure_identity().unwrap();
        let second = ids.ensure_identity().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(ids.state().unwrap(), IdentityState::Provisioned);
    }

    #[test]
    fn public_key_before_provisioning() {
        let (_, ids) = manager();
        assert_eq!(ids.public_key(), Err(CoreError::NoIdentity));
        assert_eq!(ids.handle().unwrap_err().kind(), ErrorKind::NoIdentity);

        let pk = ids.ensure_identity().unwrap();
        assert_eq!(ids.public_key().unwrap(), pk);
    }

    #[test]
    fn strict_create_refuses_regeneration() {
        let (_, ids) = manager();
        let pk = ids.create_identity().unwrap();
        assert_eq!(
            ids.create_identity(),
            Err(CoreError::AlreadyExists("bharatconnect_identity".into()))
        );
        assert_eq!(ids.public_key().unwrap(), pk);
    }

    #[test]
    fn state_reflects_the_store() {
        let store = Arc::new(SoftwareKeyStore::new());
        let a = manager_with(store.clone(), IdentityConfig::default());
        let b = manager_with(store, IdentityConfig::default());

        let pk = a.ensure_identity().unwrap();
        assert_eq!(b.state().unwrap(), IdentityState::Provisioned);
        assert_eq!(b.ensure_identity().unwrap(), pk);
    }

    #[test]
    fn locked_store() {
        let (store, ids) = manager();
        store.set_locked(true);
        assert_eq!(ids.ensure_identity().unwrap_err().kind(), ErrorKind::KeystoreLocked);
        assert_eq!(ids.state().unwrap_err().kind(), ErrorKind::KeystoreLocked);
    }

    #[test]
    fn hardware_policy() {
        let config = IdentityConfig {
            require_hardware: true,
            ..IdentityConfig::default()
        };
        let ids = manager_with(Arc::new(SoftwareKeyStore::new()), config.clone());
        assert_eq!(
            ids.ensure_identity().unwrap_err().kind(),
            ErrorKind::UnsupportedHardware
        );
        assert_eq!(ids.state().unwrap(), IdentityState::Uninitialized);

        let strongbox = Arc::new(SoftwareKeyStore::with_security_level(SecurityLevel::StrongBox));
        let ids = manager_with(strongbox, config);
        ids.ensure_identity().unwrap();
        assert_eq!(ids.key_info().unwrap().security_level, SecurityLevel::StrongBox);
    }

    #[test]
    fn signing_companion() {
        let (_, ids) = manager();
        ids.ensure_identity().unwrap();
        let sig = ids.sign(b"challenge").unwrap();
        verify_signature(&ids.signing_public_key().unwrap(), b"challenge", &sig).unwrap();

        let no_signing = IdentityConfig {
            signing: false,
            ..IdentityConfig::default()
        };
        let ids = manager_with(Arc::new(SoftwareKeyStore::new()), no_signing);
        ids.ensure_identity().unwrap();
        assert_eq!(ids.sign(b"x").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn key_info_carries_validity() {
        let (_, ids) = manager();
        ids.ensure_identity().unwrap();
        let info = ids.key_info().unwrap();
        let days = (info.validity.not_after - info.validity.not_before).num_days();
        assert_eq!(days, 3650);
        assert!(info.usage.key_agreement);
        assert!(info.usage.signing);
    }

    #[test]
    fn out_of_range_validity_is_an_error() {
        // Bypasses CoreConfig::validate, as a caller building the manager
        // directly can.
        let config = IdentityConfig {
            validity_days: 4_000_000_000,
            ..IdentityConfig::default()
        };
        let ids = manager_with(Arc::new(SoftwareKeyStore::new()), config);
        assert_eq!(ids.ensure_identity().unwrap_err().kind(), ErrorKind::MalformedInput);
        assert_eq!(ids.state().unwrap(), IdentityState::Uninitialized);
    }
}
