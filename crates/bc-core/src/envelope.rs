//! Envelope encryption anchored on a key held in a [`SecureKeyStore`].
//!
//! Sealing only needs the recipient's public key and takes no lock.
//! Opening asks the store for the agreement under the alias lock and does
//! the symmetric work here.

use std::sync::Arc;

use bc_crypto::envelope::{open, seal};
use bc_crypto::{Envelope, MasterKey, PublicKeyBytes, Purpose, SharedSecret, Suite};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::{ConfigError, EnvelopeConfig};
use crate::errors::CoreError;
use crate::keystore::{KeyHandle, KeystoreError, SecureKeyStore};
use crate::locks::AliasLocks;

pub struct EnvelopeCrypto {
    store: Arc<dyn SecureKeyStore>,
    locks: Arc<AliasLocks>,
    suite: Suite,
    accepted: Vec<Suite>,
}

impl EnvelopeCrypto {
    pub fn new(
        store: Arc<dyn SecureKeyStore>,
        locks: Arc<AliasLocks>,
        config: &EnvelopeConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            store,
            locks,
            suite: config.seal_suite()?,
            accepted: config.accepted()?,
        })
    }

    pub fn suite(&self) -> Suite {
        self.suite
    }

    pub fn accepts(&self, suite: Suite) -> bool {
        self.accepted.contains(&suite)
    }

    /// Seal `plaintext` to a recipient's exported public key.
    pub fn encrypt(&self, recipient: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.seal_to(recipient, Purpose::Message, plaintext)
    }

    /// Open a message envelope addressed to `handle`.
    pub fn decrypt(&self, envelope: &[u8], handle: &KeyHandle) -> Result<Vec<u8>, CoreError> {
        self.open_with(envelope, handle, Purpose::Message)
    }

    /// Wrap a 32-byte master key. The length is checked before any
    /// cryptographic work.
    pub fn wrap_master_key(&self, master_key: &[u8], recipient: &[u8]) -> Result<Vec<u8>, CoreError> {
        let key = MasterKey::from_slice(master_key)?;
        self.seal_to(recipient, Purpose::MasterKey, key.as_bytes())
    }

    pub fn unwrap_master_key(
        &self,
        wrapped: &[u8],
        handle: &KeyHandle,
    ) -> Result<MasterKey, CoreError> {
        let plaintext = Zeroizing::new(self.open_with(wrapped, handle, Purpose::MasterKey)?);
        Ok(MasterKey::from_slice(&plaintext)?)
    }

    fn seal_to(
        &self,
        recipient: &[u8],
        purpose: Purpose,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CoreError> {
        let recipient = PublicKeyBytes::try_from(recipient)?;
        let envelope = seal(self.suite, purpose, &recipient, plaintext)?;
        debug!(
            purpose = purpose.label(),
            suite = %self.suite,
            recipient = %recipient.fingerprint(),
            len = envelope.encoded_len(),
            "sealed envelope"
        );
        Ok(envelope.to_bytes())
    }

    fn open_with(
        &self,
        bytes: &[u8],
        handle: &KeyHandle,
        purpose: Purpose,
    ) -> Result<Vec<u8>, CoreError> {
        let envelope = Envelope::from_bytes(bytes)?;
        if !self.accepts(envelope.suite) {
            return Err(CoreError::UnsupportedVersion(envelope.suite.byte()));
        }
        let ephemeral = envelope
            .ephemeral_key()
            .map_err(|_| self.auth_failure(handle, purpose))?;

        let (recipient_pub, shared) = self.agree(handle, &ephemeral, purpose)?;

        open(&envelope, purpose, &recipient_pub, &shared)
            .map_err(|_| self.auth_failure(handle, purpose))
    }

    fn agree(
        &self,
        handle: &KeyHandle,
        ephemeral: &PublicKeyBytes,
        purpose: Purpose,
    ) -> Result<(PublicKeyBytes, SharedSecret), CoreError> {
        self.locks.with_alias(handle.alias(), || {
            let recipient_pub = self.store.export_public_key(handle)?;
            match self.store.agree(handle, ephemeral) {
                Ok(shared) => Ok((recipient_pub, shared)),
                Err(KeystoreError::InvalidPeerKey(_)) => Err(self.auth_failure(handle, purpose)),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn auth_failure(&self, handle: &KeyHandle, purpose: Purpose) -> CoreError {
        warn!(alias = handle.alias(), purpose = purpose.label(), "envelope failed authentication");
        CoreError::AuthenticationFailed
    }
}
