//! Directory-backed key store.
//!
//! Layout: one `<alias>.json` record per key. Records are written to a
//! private temporary file first and linked into place without replacing
//! an existing record, so concurrent writers across processes cannot
//! clobber each other. Records are only readable by the owner on Unix.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bc_crypto::{PublicKeyBytes, SharedSecret};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::material::{KeyMaterial, StoredKey};
use super::{
    validate_alias, KeyHandle, KeyInfo, KeySpec, KeystoreError, SecureKeyStore, SecurityLevel,
};

pub struct FileKeyStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<KeyMaterial>>>,
}

impl FileKeyStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KeystoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }

        debug!(dir = %dir.display(), "opened file key store");
        Ok(Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{alias}.json"))
    }

    /// Commit a new record. Fails with `AlreadyExists` if another writer
    /// got there first, even one in a different process.
    fn write_new_record(&self, alias: &str, record: &StoredKey) -> Result<(), KeystoreError> {
        let json = Zeroizing::new(
            serde_json::to_vec_pretty(record)
                .map_err(|e| KeystoreError::Io(format!("serialize record: {e}")))?,
        );

        // Unique per writer and created 0600 on Unix.
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{alias}."))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;

        match temp.persist_noclobber(self.record_path(alias)) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(alias, "lost record creation race");
                Err(KeystoreError::AlreadyExists(alias.to_string()))
            }
            Err(e) => Err(e.error.into()),
        }
    }

    fn read_record(&self, alias: &str) -> Result<Option<KeyMaterial>, KeystoreError> {
        let path = self.record_path(alias);
        let contents = match fs::read(&path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: StoredKey = serde_json::from_slice(&contents)
            .map_err(|e| KeystoreError::Corrupted(format!("{alias}: {e}")))?;
        let material = KeyMaterial::from_record(&record).map_err(|e| {
            warn!(alias, error = %e, "rejecting key record");
            e
        })?;
        if material.info().alias != alias {
            return Err(KeystoreError::Corrupted(format!(
                "{alias}: record belongs to {}",
                material.info().alias
            )));
        }
        Ok(Some(material))
    }

    fn material(&self, alias: &str) -> Result<Arc<KeyMaterial>, KeystoreError> {
        validate_alias(alias)?;
        if let Some(m) = self.cache.read().get(alias) {
            return Ok(m.clone());
        }

        let mut cache = self.cache.write();
        if let Some(m) = cache.get(alias) {
            return Ok(m.clone());
        }
        let material = self
            .read_record(alias)?
            .ok_or_else(|| KeystoreError::NotFound(alias.to_string()))?;
        let material = Arc::new(material);
        cache.insert(alias.to_string(), material.clone());
        Ok(material)
    }
}

impl SecureKeyStore for FileKeyStore {
    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::Software
    }

    fn create_key_pair(&self, alias: &str, spec: &KeySpec) -> Result<KeyHandle, KeystoreError> {
        validate_alias(alias)?;
        spec.validate(self.security_level())?;

        let mut cache = self.cache.write();
        if cache.contains_key(alias) || self.record_path(alias).exists() {
            return Err(KeystoreError::AlreadyExists(alias.to_string()));
        }

        let material = KeyMaterial::generate(alias, spec, self.security_level())?;
        self.write_new_record(alias, &material.to_record())?;
        info!(alias, fingerprint = %material.public_key().fingerprint(), "persisted new key");

        cache.insert(alias.to_string(), Arc::new(material));
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
