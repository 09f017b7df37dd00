//! Private key material held by the software stores.

use bc_crypto::keys::agree_static;
use bc_crypto::utils::constant_time_compare_array;
use bc_crypto::{CryptoError, PublicKeyBytes, SharedSecret};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{KeyInfo, KeySpec, KeystoreError, SecurityLevel};

const RECORD_VERSION: u32 = 1;

fn random_seed() -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    let mut seed = Zeroizing::new([0u8; 32]);
    getrandom::getrandom(&mut *seed).map_err(|_| KeystoreError::EntropyUnavailable)?;
    Ok(seed)
}

fn decode_secret(field: &str, hex_str: &str) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    let bytes = Zeroizing::new(
        hex::decode(hex_str).map_err(|_| KeystoreError::Corrupted(format!("{field} is not hex")))?,
    );
    let mut out = Zeroizing::new([0u8; 32]);
    if bytes.len() != out.len() {
        return Err(KeystoreError::Corrupted(format!("{field} has wrong length")));
    }
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// One key pair plus its metadata. Secrets are wiped when this is dropped.
pub(crate) struct KeyMaterial {
    kex_secret: StaticSecret,
    sign_key: Option<SigningKey>,
    public_key: PublicKeyBytes,
    info: KeyInfo,
}

impl KeyMaterial {
    pub(crate) fn generate(
        alias: &str,
        spec: &KeySpec,
        level: SecurityLevel,
    ) -> Result<Self, KeystoreError> {
        let kex_secret = StaticSecret::from(*random_seed()?);
        let sign_key = if spec.usage.signing {
            Some(SigningKey::from_bytes(&*random_seed()?))
        } else {
            None
        };
        let public_key = PublicKeyBytes::from(&kex_secret);

        Ok(Self {
            kex_secret,
            sign_key,
            public_key,
            info: KeyInfo {
                alias: alias.to_string(),
                curve: spec.curve,
                created_at: Utc::now(),
                validity: spec.validity,
                usage: spec.usage,
                security_level: level,
            },
        })
    }

    pub(crate) fn public_key(&self) -> PublicKeyBytes {
        self.public_key
    }

    pub(crate) fn info(&self) -> &KeyInfo {
        &self.info
    }

    pub(crate) fn agree(&self, peer: &PublicKeyBytes) -> Result<SharedSecret, KeystoreError> {
        if !self.info.usage.key_agreement {
            return Err(KeystoreError::UsageNotPermitted {
                alias: self.info.alias.clone(),
                usage: "key agreement",
            });
        }
        self.info.validity.check(&self.info.alias, Utc::now())?;
        agree_static(&self.kex_secret, peer).map_err(|e| match e {
            CryptoError::InvalidPeerKey(detail) => KeystoreError::InvalidPeerKey(detail),
            other => KeystoreError::InvalidPeerKey(other.to_string()),
        })
    }

    fn signing_key(&self) -> Result<&SigningKey, KeystoreError> {
        self.sign_key.as_ref().ok_or_else(|| KeystoreError::UsageNotPermitted {
            alias: self.info.alias.clone(),
            usage: "signing",
        })
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Result<[u8; 64], KeystoreError> {
        let key = self.signing_key()?;
        self.info.validity.check(&self.info.alias, Utc::now())?;
        Ok(key.sign(message).to_bytes())
    }

    pub(crate) fn signing_public_key(&self) -> Result<[u8; 32], KeystoreError> {
        Ok(self.signing_key()?.verifying_key().to_bytes())
    }

    pub(crate) fn to_record(&self) -> StoredKey {
        StoredKey {
            version: RECORD_VERSION,
            info: self.info.clone(),
            public_key: self.public_key.to_hex(),
            kex_secret: hex::encode(self.kex_secret.as_bytes()),
            sign_seed: self.sign_key.as_ref().map(|k| hex::encode(k.to_bytes())),
        }
    }

    /// Rebuild from a persisted record. The stored public key must match
    /// the one derived from the private scalar.
    pub(crate) fn from_record(record: &StoredKey) -> Result<Self, KeystoreError> {
        if record.version != RECORD_VERSION {
            return Err(KeystoreError::Corrupted(format!(
                "unsupported record version {}",
                record.version
            )));
        }

        let kex_secret = StaticSecret::from(*decode_secret("kex_secret", &record.kex_secret)?);
        let derived = PublicKeyBytes::from(&kex_secret);
        let stored = PublicKeyBytes::from_hex(&record.public_key)
            .map_err(|_| KeystoreError::Corrupted("public_key is invalid".to_string()))?;
        if !constant_time_compare_array(derived.as_bytes(), stored.as_bytes()) {
            return Err(KeystoreError::Corrupted(
                "public key does not match private key".to_string(),
            ));
        }

        let sign_key = match (&record.sign_seed, record.info.usage.signing) {
            (Some(seed), true) => {
                let seed = decode_secret("sign_seed", seed)?;
                Some(SigningKey::from_bytes(&seed))
            }
            (None, false) => None,
            _ => {
                return Err(KeystoreError::Corrupted(
                    "signing key does not match usage flags".to_string(),
                ))
            }
        };

        Ok(Self {
            kex_secret,
            sign_key,
            public_key: derived,
            info: record.info.clone(),
        })
    }
}

/// On-disk form of a key. Secret fields are hex and wiped on drop.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct StoredKey {
    #[zeroize(skip)]
    version: u32,
    #[zeroize(skip)]
    info: KeyInfo,
    #[zeroize(skip)]
    public_key: String,
    kex_secret: String,
    sign_seed: Option<String>,
}
