//! Hybrid envelope: ephemeral X25519 + HKDF-SHA256 + AEAD.
//!
//! Wire layout (all fixed-width fields, no length prefixes):
//!
//! ```text
//! offset  len  field
//! 0       1    suite / version byte
//! 1       32   ephemeral X25519 public key
//! 33      12   wire nonce
//! 45      n    ciphertext
//! 45+n    16   AEAD tag
//! ```
//!
//! Sealing needs only the recipient's public key. Opening needs the
//! shared secret computed by whoever holds the recipient's private key, so
//! this module never touches a long-lived private scalar.

use std::fmt;
use std::str::FromStr;

use aes_gcm::Aes256Gcm;
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::keys::{agree_ephemeral, PublicKeyBytes, SharedSecret, PUBLIC_KEY_LEN};
use crate::transcript::{tags, Transcript};
use crate::utils::xor_in_place;

pub const VERSION_LEN: usize = 1;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const HEADER_LEN: usize = VERSION_LEN + PUBLIC_KEY_LEN + NONCE_LEN;
/// Header plus tag, i.e. an envelope around an empty plaintext.
pub const MIN_ENVELOPE_LEN: usize = HEADER_LEN + TAG_LEN;

const KDF_INFO_PREFIX: &[u8] = b"bharatconnect/envelope/v1";
const AAD_DOMAIN: &str = "bharatconnect/envelope/aad/v1";

/// AEAD suite, carried on the wire as the version byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Suite {
    #[default]
    ChaCha20Poly1305 = 0x01,
    Aes256Gcm = 0x02,
}

impl Suite {
    pub const ALL: [Suite; 2] = [Suite::ChaCha20Poly1305, Suite::Aes256Gcm];

    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Suite::ChaCha20Poly1305 => "chacha20poly1305",
            Suite::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl TryFrom<u8> for Suite {
    type Error = CryptoError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0x01 => Ok(Suite::ChaCha20Poly1305),
            0x02 => Ok(Suite::Aes256Gcm),
            other => Err(CryptoError::UnsupportedVersion(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown suite name: {0}")]
pub struct ParseSuiteError(pub String);

impl FromStr for Suite {
    type Err = ParseSuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chacha20poly1305" | "chacha20-poly1305" => Ok(Suite::ChaCha20Poly1305),
            "aes-256-gcm" | "aes256gcm" => Ok(Suite::Aes256Gcm),
            _ => Err(ParseSuiteError(s.to_string())),
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an envelope carries. Bound into both the KDF and the AAD so an
/// envelope sealed for one purpose never opens under another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    Message,
    MasterKey,
}

impl Purpose {
    pub fn label(self) -> &'static str {
        match self {
            Purpose::Message => "message",
            Purpose::MasterKey => "master-key",
        }
    }
}

/// Parsed envelope. Constructed by [`seal`] or [`Envelope::from_bytes`].
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    pub suite: Suite,
    /// Raw ephemeral key as it appeared on the wire; validated when opened.
    pub ephemeral_public: [u8; PUBLIC_KEY_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Parse wire bytes. Checks, in order: non-empty, known version byte,
    /// minimum length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let (&version, rest) = bytes
            .split_first()
            .ok_or_else(|| CryptoError::MalformedEnvelope("empty input".to_string()))?;
        let suite = Suite::try_from(version)?;
        if bytes.len() < MIN_ENVELOPE_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "{} bytes, need at least {}",
                bytes.len(),
                MIN_ENVELOPE_LEN
            )));
        }

        let (eph, rest) = rest.split_at(PUBLIC_KEY_LEN);
        let (nonce, rest) = rest.split_at(NONCE_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        let mut env = Envelope {
            suite,
            ephemeral_public: [0u8; PUBLIC_KEY_LEN],
            nonce: [0u8; NONCE_LEN],
            ciphertext: ciphertext.to_vec(),
            tag: [0u8; TAG_LEN],
        };
        env.ephemeral_public.copy_from_slice(eph);
        env.nonce.copy_from_slice(nonce);
        env.tag.copy_from_slice(tag);
        Ok(env)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.suite.byte());
        out.extend_from_slice(&self.ephemeral_public);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    pub fn encoded_len(&self) -> usize {
        MIN_ENVELOPE_LEN + self.ciphertext.len()
    }

    /// The ephemeral key, validated the same way as any other peer key.
    pub fn ephemeral_key(&self) -> Result<PublicKeyBytes, CryptoError> {
        PublicKeyBytes::try_from(self.ephemeral_public)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("suite", &self.suite)
            .field("ephemeral_public", &hex::encode(self.ephemeral_public))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKeys {
    key: [u8; 32],
    nonce_seed: [u8; NONCE_LEN],
}

fn kdf_info(suite: Suite, purpose: Purpose, label: &[u8]) -> Vec<u8> {
    let mut info = Vec::with_capacity(KDF_INFO_PREFIX.len() + 1 + 16 + label.len());
    info.extend_from_slice(KDF_INFO_PREFIX);
    info.push(suite.byte());
    info.extend_from_slice(purpose.label().as_bytes());
    info.extend_from_slice(label);
    info
}

fn derive_keys(
    shared: &SharedSecret,
    suite: Suite,
    purpose: Purpose,
    eph_pub: &[u8; PUBLIC_KEY_LEN],
    recipient_pub: &PublicKeyBytes,
) -> Result<DerivedKeys, CryptoError> {
    let mut salt = [0u8; 2 * PUBLIC_KEY_LEN];
    salt[..PUBLIC_KEY_LEN].copy_from_slice(eph_pub);
    salt[PUBLIC_KEY_LEN..].copy_from_slice(recipient_pub.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
    let mut out = DerivedKeys {
        key: [0u8; 32],
        nonce_seed: [0u8; NONCE_LEN],
    };
    hk.expand(&kdf_info(suite, purpose, b"key"), &mut out.key)
        .map_err(|_| CryptoError::EncryptFailed)?;
    hk.expand(&kdf_info(suite, purpose, b"nonce"), &mut out.nonce_seed)
        .map_err(|_| CryptoError::EncryptFailed)?;
    Ok(out)
}

/// Associated data binding every header field of the envelope.
pub fn associated_data(
    suite: Suite,
    purpose: Purpose,
    eph_pub: &[u8; PUBLIC_KEY_LEN],
    recipient_pub: &PublicKeyBytes,
    nonce: &[u8; NONCE_LEN],
) -> Vec<u8> {
    let mut t = Transcript::new(AAD_DOMAIN);
    t.append_u8(tags::SUITE, suite.byte())
        .append_bytes(tags::PURPOSE, purpose.label().as_bytes())
        .append_bytes(tags::EPHEMERAL_KEY, eph_pub)
        .append_bytes(tags::RECIPIENT_KEY, recipient_pub.as_bytes())
        .append_bytes(tags::NONCE, nonce);
    t.into_bytes()
}

fn aead_seal(
    suite: Suite,
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    buf: &mut [u8],
) -> Result<[u8; TAG_LEN], CryptoError> {
    let tag = match suite {
        Suite::ChaCha20Poly1305 => ChaCha20Poly1305::new(GenericArray::from_slice(key))
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, buf),
        Suite::Aes256Gcm => Aes256Gcm::new(GenericArray::from_slice(key))
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, buf),
    }
    .map_err(|_| CryptoError::EncryptFailed)?;

    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(&tag);
    Ok(out)
}

fn aead_open(
    suite: Suite,
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    buf: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> Result<(), CryptoError> {
    match suite {
        Suite::ChaCha20Poly1305 => ChaCha20Poly1305::new(GenericArray::from_slice(key))
            .decrypt_in_place_detached(
                GenericArray::from_slice(nonce),
                aad,
                buf,
                GenericArray::from_slice(tag),
            ),
        Suite::Aes256Gcm => Aes256Gcm::new(GenericArray::from_slice(key)).decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            aad,
            buf,
            GenericArray::from_slice(tag),
        ),
    }
    .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Seal `plaintext` to `recipient` under a fresh ephemeral key.
///
/// Errors: `InvalidPeerKey` if the agreement is non-contributory,
/// `EntropyUnavailable` if the wire nonce cannot be drawn.
pub fn seal(
    suite: Suite,
    purpose: Purpose,
    recipient: &PublicKeyBytes,
    plaintext: &[u8],
) -> Result<Envelope, CryptoError> {
    let (eph_pub, shared) = agree_ephemeral(recipient)?;

    let mut nonce = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut nonce).map_err(|_| CryptoError::EntropyUnavailable)?;

    let eph_pub = *eph_pub.as_bytes();
    let keys = derive_keys(&shared, suite, purpose, &eph_pub, recipient)?;
    drop(shared);

    let mut aead_nonce = keys.nonce_seed;
    xor_in_place(&mut aead_nonce, &nonce);

    let aad = associated_data(suite, purpose, &eph_pub, recipient, &nonce);
    let mut ciphertext = plaintext.to_vec();
    let tag = aead_seal(suite, &keys.key, &aead_nonce, &aad, &mut ciphertext)?;
    aead_nonce.zeroize();

    Ok(Envelope {
        suite,
        ephemeral_public: eph_pub,
        nonce,
        ciphertext,
        tag,
    })
}

/// Open an envelope given the shared secret between the recipient's
/// private key and `envelope.ephemeral_public`.
///
/// Every failure is reported as `AuthenticationFailed`.
pub fn open(
    envelope: &Envelope,
    purpose: Purpose,
    recipient_pub: &PublicKeyBytes,
    shared: &SharedSecret,
) -> Result<Vec<u8>, CryptoError> {
    let keys = derive_keys(
        shared,
        envelope.suite,
        purpose,
        &envelope.ephemeral_public,
        recipient_pub,
    )
    .map_err(|_| CryptoError::AuthenticationFailed)?;

    let mut aead_nonce = keys.nonce_seed;
    xor_in_place(&mut aead_nonce, &envelope.nonce);

    let aad = associated_data(
        envelope.suite,
        purpose,
        &envelope.ephemeral_public,
        recipient_pub,
        &envelope.nonce,
    );
    let mut buf = envelope.ciphertext.clone();
    let result = aead_open(
        envelope.suite,
        &keys.key,
        &aead_nonce,
        &aad,
        &mut buf,
        &envelope.tag,
    );
    aead_nonce.zeroize();

    match result {
        Ok(()) => Ok(buf),
        Err(e) => {
            buf.zeroize();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::agree_static;
    use rand_core::OsRng;
    use x25519_dalek::StaticSecret;

    fn recipient() -> (StaticSecret, PublicKeyBytes) {
        let sk = StaticSecret::random_from_rng(OsRng);
        let pk = PublicKeyBytes::from(&sk);
        (sk, pk)
    }

    fn open_with(
        sk: &StaticSecret,
        pk: &PublicKeyBytes,
        env: &Envelope,
        purpose: Purpose,
    ) -> Result<Vec<u8>, CryptoError> {
        let eph = env.ephemeral_key().map_err(|_| CryptoError::AuthenticationFailed)?;
        let shared = agree_static(sk, &eph).map_err(|_| CryptoError::AuthenticationFailed)?;
        open(env, purpose, pk, &shared)
    }

    #[test]
    fn round_trip_both_suites() {
        let (sk, pk) = recipient();
        for suite in Suite::ALL {
            let env = seal(suite, Purpose::Message, &pk, b"hello").unwrap();
            assert_eq!(env.suite, suite);
            assert_eq!(env.encoded_len(), MIN_ENVELOPE_LEN + 5);

            let parsed = Envelope::from_bytes(&env.to_bytes()).unwrap();
            assert_eq!(parsed, env);
            assert_eq!(open_with(&sk, &pk, &parsed, Purpose::Message).unwrap(), b"hello");
        }
    }

    #[test]
    fn empty_plaintext_seals_to_minimum_length() {
        let (sk, pk) = recipient();
        let env = seal(Suite::default(), Purpose::Message, &pk, b"").unwrap();
        let bytes = env.to_bytes();
        assert_eq!(bytes.len(), MIN_ENVELOPE_LEN);
        let parsed = Envelope::from_bytes(&bytes).unwrap();
        assert!(open_with(&sk, &pk, &parsed, Purpose::Message).unwrap().is_empty());
    }

    #[test]
    fn fresh_ephemeral_and_nonce_per_seal() {
        let (_, pk) = recipient();
        let a = seal(Suite::default(), Purpose::Message, &pk, b"same").unwrap();
        let b = seal(Suite::default(), Purpose::Message, &pk, b"same").unwrap();
        assert_ne!(a.ephemeral_public, b.ephemeral_public);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn any_flipped_byte_fails_authentication() {
        let (sk, pk) = recipient();
        let bytes = seal(Suite::default(), Purpose::Message, &pk, b"attack at dawn")
            .unwrap()
            .to_bytes();

        // Skip the version byte: flipping it changes the error kind.
        for i in 1..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let env = Envelope::from_bytes(&tampered).unwrap();
            assert_eq!(
                open_with(&sk, &pk, &env, Purpose::Message),
                Err(CryptoError::AuthenticationFailed),
                "byte {i}"
            );
        }
    }

    #[test]
    fn suite_swap_fails_authentication() {
        let (sk, pk) = recipient();
        let mut env = seal(Suite::ChaCha20Poly1305, Purpose::Message, &pk, b"x").unwrap();
        env.suite = Suite::Aes256Gcm;
        assert_eq!(
            open_with(&sk, &pk, &env, Purpose::Message),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn purpose_is_bound() {
        let (sk, pk) = recipient();
        let env = seal(Suite::default(), Purpose::Message, &pk, &[1u8; 32]).unwrap();
        assert_eq!(
            open_with(&sk, &pk, &env, Purpose::MasterKey),
            Err(CryptoError::AuthenticationFailed)
        );

        let env = seal(Suite::default(), Purpose::MasterKey, &pk, &[1u8; 32]).unwrap();
        assert_eq!(
            open_with(&sk, &pk, &env, Purpose::Message),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn wrong_recipient_fails() {
        let (_, pk) = recipient();
        let (other_sk, other_pk) = recipient();
        let env = seal(Suite::default(), Purpose::Message, &pk, b"secret").unwrap();
        assert_eq!(
            open_with(&other_sk, &other_pk, &env, Purpose::Message),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn parse_order() {
        assert!(matches!(
            Envelope::from_bytes(&[]),
            Err(CryptoError::MalformedEnvelope(_))
        ));
        // Unknown version wins over short length.
        assert_eq!(
            Envelope::from_bytes(&[0x7F]),
            Err(CryptoError::UnsupportedVersion(0x7F))
        );
        assert_eq!(
            Envelope::from_bytes(&[0x00; 100]),
            Err(CryptoError::UnsupportedVersion(0x00))
        );
        let mut short = vec![0x01];
        short.extend_from_slice(&[0u8; MIN_ENVELOPE_LEN - 2]);
        assert!(matches!(
            Envelope::from_bytes(&short),
            Err(CryptoError::MalformedEnvelope(_))
        ));
        short.push(0);
        assert!(Envelope::from_bytes(&short).is_ok());
    }

    #[test]
    fn zero_ephemeral_key_is_rejected_on_open() {
        let mut bytes = vec![0x01];
        bytes.extend_from_slice(&[0u8; MIN_ENVELOPE_LEN - 1]);
        let env = Envelope::from_bytes(&bytes).unwrap();
        assert!(matches!(env.ephemeral_key(), Err(CryptoError::InvalidPeerKey(_))));
    }

    #[test]
    fn suite_names() {
        for suite in Suite::ALL {
            assert_eq!(suite.name().parse::<Suite>().unwrap(), suite);
            assert_eq!(Suite::try_from(suite.byte()).unwrap(), suite);
        }
        assert!("rot13".parse::<Suite>().is_err());
        assert_eq!(Suite::default().byte(), 0x01);
    }

    #[test]
    fn associated_data_binds_recipient() {
        let (_, a) = recipient();
        let (_, b) = recipient();
        let eph = [3u8; 32];
        let nonce = [4u8; 12];
        assert_ne!(
            associated_data(Suite::default(), Purpose::Message, &eph, &a, &nonce),
            associated_data(Suite::default(), Purpose::Message, &eph, &b, &nonce)
        );
    }
}
