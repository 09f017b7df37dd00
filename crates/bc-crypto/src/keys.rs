//! Public-key encoding, key agreement results and signature verification.
//!
//! The identity export format is the raw 32-byte X25519 public key. Every
//! public key that enters the crate from outside goes through
//! [`PublicKeyBytes::try_from`], which rejects wrong lengths and the trivial
//! low-order encodings before any scalar multiplication happens.

use std::fmt;

use ed25519_dalek::{Signature, VerifyingKey};
use rand_core::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::hash::key_fingerprint;

/// Length of an exported X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// u = 0 and u = 1: both force an all-zero shared secret.
const LOW_ORDER_ENCODINGS: [[u8; PUBLIC_KEY_LEN]; 2] = [[0u8; PUBLIC_KEY_LEN], {
    let mut one = [0u8; PUBLIC_KEY_LEN];
    one[0] = 1;
    one
}];

/// A validated X25519 public key in its export encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyBytes([u8; PUBLIC_KEY_LEN]);

impl PublicKeyBytes {
    /// Parse a hex string (optionally `0x`-prefixed, surrounding
    /// whitespace ignored).
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(s)
            .map_err(|_| CryptoError::InvalidPeerKey("not valid hex".to_string()))?;
        Self::try_from(bytes.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// hex(sha256(key)), safe for logs.
    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.0)
    }

    pub(crate) fn to_x25519(self) -> X25519PublicKey {
        X25519PublicKey::from(self.0)
    }
}

impl TryFrom<&[u8]> for PublicKeyBytes {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPeerKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        Self::try_from(arr)
    }
}

impl TryFrom<[u8; PUBLIC_KEY_LEN]> for PublicKeyBytes {
    type Error = CryptoError;

    fn try_from(arr: [u8; PUBLIC_KEY_LEN]) -> Result<Self, Self::Error> {
        if LOW_ORDER_ENCODINGS.contains(&arr) {
            return Err(CryptoError::InvalidPeerKey("low-order point".to_string()));
        }
        Ok(Self(arr))
    }
}

impl From<&StaticSecret> for PublicKeyBytes {
    fn from(secret: &StaticSecret) -> Self {
        Self(X25519PublicKey::from(secret).to_bytes())
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyBytes({})", &self.to_hex()[..16])
    }
}

/// Output of an X25519 agreement, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Accept an agreement result only if it was contributory, i.e. the peer
    /// key was not a low-order point in disguise.
    pub fn from_agreement(shared: x25519_dalek::SharedSecret) -> Result<Self, CryptoError> {
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidPeerKey(
                "non-contributory key agreement".to_string(),
            ));
        }
        Ok(Self(shared.to_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// X25519 agreement with a long-lived secret. Used by key stores that hold
/// the scalar themselves.
pub fn agree_static(secret: &StaticSecret, peer: &PublicKeyBytes) -> Result<SharedSecret, CryptoError> {
    SharedSecret::from_agreement(secret.diffie_hellman(&peer.to_x25519()))
}

/// Generate a one-shot ephemeral key pair and immediately agree with `peer`.
///
/// The ephemeral secret is consumed by the agreement, so it cannot outlive
/// this call.
pub fn agree_ephemeral(peer: &PublicKeyBytes) -> Result<(PublicKeyBytes, SharedSecret), CryptoError> {
    let eph = EphemeralSecret::random_from_rng(OsRng);
    let eph_pub = PublicKeyBytes(X25519PublicKey::from(&eph).to_bytes());
    let shared = SharedSecret::from_agreement(eph.diffie_hellman(&peer.to_x25519()))?;
    Ok((eph_pub, shared))
}

/// Verify an Ed25519 signature produced by an identity's signing key.
pub fn verify_signature(
    pub_key: &[u8; 32],
    message: &[u8],
    signature: &[u8; SIGNATURE_LEN],
) -> Result<(), CryptoError> {
    let verifying_key = VerifyingKey::from_bytes(pub_key)
        .map_err(|_| CryptoError::InvalidPeerKey("invalid ed25519 key".to_string()))?;
    let sig = Signature::from_bytes(signature);
    verifying_key
        .verify_strict(message, &sig)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
