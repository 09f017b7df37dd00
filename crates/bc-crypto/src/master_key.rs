//! Per-conversation symmetric master key.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

pub const MASTER_KEY_LEN: usize = 32;

/// A 32-byte symmetric key. Wiped on drop; `Debug` prints a placeholder.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_LEN]);

impl MasterKey {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        getrandom::getrandom(&mut bytes).map_err(|_| CryptoError::EntropyUnavailable)?;
        Ok(Self(bytes))
    }

    /// Copy a key out of `bytes`, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: MASTER_KEY_LEN,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; MASTER_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.0
    }
}

impl From<[u8; MASTER_KEY_LEN]> for MasterKey {
    fn from(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        crate::utils::constant_time_compare_array(&self.0, &other.0)
    }
}

impl Eq for MasterKey {}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}
