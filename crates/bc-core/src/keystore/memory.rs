//! In-memory key store for tests and ephemeral use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bc_crypto::{PublicKeyBytes, SharedSecret};
use parking_lot::RwLock;
use tracing::debug;

use super::material::KeyMaterial;
use super::{
    validate_alias, KeyHandle, KeyInfo, KeySpec, KeystoreError, SecureKeyStore, SecurityLevel,
};

/// Keys live in process memory and vanish with the store.
///
/// `set_locked(true)` makes every operation fail with
/// [`KeystoreError::Locked`], which is how tests exercise platform lockout.
pub struct SoftwareKeyStore {
    keys: RwLock<HashMap<String, Arc<KeyMaterial>>>,
    locked: AtomicBool,
    level: SecurityLevel,
}

impl SoftwareKeyStore {
    pub fn new() -> Self {
        Self::with_security_level(SecurityLevel::Software)
    }

    /// Report a different isolation level. Useful for exercising hardware
    /// policy without hardware.
    pub fn with_security_level(level: SecurityLevel) -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            locked: AtomicBool::new(false),
            level,
        }
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    fn ensure_unlocked(&self) -> Result<(), KeystoreError> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(KeystoreError::Locked);
        }
        Ok(())
    }

    fn material(&self, alias: &str) -> Result<Arc<KeyMaterial>, KeystoreError> {
        self.ensure_unlocked()?;
        self.keys
            .read()
            .get(alias)
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound(alias.to_string()))
    }
}

impl Default for SoftwareKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureKeyStore for SoftwareKeyStore {
    fn security_level(&self) -> SecurityLevel {
        self.level
    }

    fn create_key_pair(&self, alias: &str, spec: &KeySpec) -> Result<KeyHandle, KeystoreError> {
        self.ensure_unlocked()?;
        validate_alias(alias)?;
        spec.validate(self.level)?;

        let mut keys = self.keys.write();
        if keys.contains_key(alias) {
            return Err(KeystoreError::AlreadyExists(alias.to_string()));
        }
        let material = KeyMaterial::generate(alias, spec, self.level)?;
        debug!(alias, fingerprint = %material.public_key().fingerprint(), "created in-memory key");
        keys.insert(alias.to_string(), Arc::new(material));
        Ok(KeyHandle::new(alias))
    }

    fn get_handle(&self, alias: &str) -> Result<KeyHandle, KeystoreError> {
        self.material(alias).map(|_| KeyHandle::new(alias))
    }

    fn export_public_key(&self, handle: &KeyHandle) -> Result<PublicKeyBytes, KeystoreError> {
        Ok(self.material(handle.alias())?.public_key())
    }

    fn agree(
        &self,
        handle: &KeyHandle,
        peer: &PublicKeyBytes,
    ) -> Result<SharedSecret, KeystoreError> {
        self.material(handle.alias())?.agree(peer)
    }

    fn sign(&self, handle: &KeyHandle, message: &[u8]) -> Result<[u8; 64], KeystoreError> {
        self.material(handle.alias())?.sign(message)
    }

    fn signing_public_key(&self, handle: &KeyHandle) -> Result<[u8; 32], KeystoreError> {
        self.material(handle.alias())?.signing_public_key()
    }

    fn key_info(&self, handle: &KeyHandle) -> Result<KeyInfo, KeystoreError> {
        Ok(self.material(handle.alias())?.info().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_crypto::keys::agree_ephemeral;

    #[test]
    fn create_then_lookup() {
        let store = SoftwareKeyStore::new();
        assert!(store.is_empty());
        let handle = store.create_key_pair("id", &KeySpec::agreement(1).unwrap()).unwrap();
        assert_eq!(store.get_handle("id").unwrap(), handle);
        assert_eq!(store.len(), 1);

        let info = store.key_info(&handle).unwrap();
        assert_eq!(info.alias, "id");
        assert_eq!(info.security_level, SecurityLevel::Software);
    }

    #[test]
    fn duplicate_alias_rejected() {
        let store = SoftwareKeyStore::new();
        let handle = store.create_key_pair("id", &KeySpec::agreement(1).unwrap()).unwrap();
        let before = store.export_public_key(&handle).unwrap();

        assert_eq!(
            store.create_key_pair("id", &KeySpec::agreement(1).unwrap()),
            Err(KeystoreError::AlreadyExists("id".into()))
        );
        assert_eq!(store.export_public_key(&handle).unwrap(), before);
    }

    #[test]
    fn missing_alias() {
        let store = SoftwareKeyStore::new();
        assert_eq!(
            store.get_handle("nope"),
            Err(KeystoreError::NotFound("nope".into()))
        );
    }

    #[test]
    fn lockout_blocks_everything() {
        let store = SoftwareKeyStore::new();
        let handle = store.create_key_pair("id", &KeySpec::agreement(1).unwrap()).unwrap();
        store.set_locked(true);

        assert_eq!(store.get_handle("id"), Err(KeystoreError::Locked));
        assert_eq!(store.export_public_key(&handle), Err(KeystoreError::Locked));
        assert_eq!(
            store.create_key_pair("other", &KeySpec::agreement(1).unwrap()),
            Err(KeystoreError::Locked)
        );

        store.set_locked(false);
        assert!(store.get_handle("id").is_ok());
    }

    #[test]
    fn hardware_requirement() {
        let spec = KeySpec::agreement(1).unwrap().requiring(SecurityLevel::StrongBox);
        assert!(matches!(
            SoftwareKeyStore::new().create_key_pair("id", &spec),
            Err(KeystoreError::UnsupportedHardware(_))
        ));
        assert!(SoftwareKeyStore::with_security_level(SecurityLevel::StrongBox)
            .create_key_pair("id", &spec)
            .is_ok());
    }

    #[test]
    fn agreement_matches_sender_side() {
        let store = SoftwareKeyStore::new();
        let handle = store.create_key_pair("id", &KeySpec::agreement(1).unwrap()).unwrap();
        let pk = store.export_public_key(&handle).unwrap();

        let (eph_pub, sender) = agree_ephemeral(&pk).unwrap();
        let receiver = store.agree(&handle, &eph_pub).unwrap();
        assert_eq!(sender.as_bytes(), receiver.as_bytes());
    }
}
