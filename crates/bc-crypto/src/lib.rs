//! Cryptographic primitives for the BharatConnect identity core.
//!
//! Everything in this crate is pure: no key container, no I/O. Private-key
//! operations that must stay inside a secure store are performed by the
//! caller, which hands the resulting [`keys::SharedSecret`] back to
//! [`envelope::open`].
//!
//! ```text
//! recipient pub ──┐
//!                 ▼
//! ephemeral ── X25519 ── HKDF-SHA256(salt = eph_pub ‖ recipient_pub)
//!                              │
//!                              ▼
//!                  AEAD (suite byte) ── Envelope wire bytes
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod hash;
pub mod transcript;
pub mod keys;
pub mod master_key;

pub mod envelope;
pub mod utils;

#[cfg(test)]
mod proptests;

pub use error::CryptoError;
pub use envelope::{Envelope, Purpose, Suite};
pub use keys::{PublicKeyBytes, SharedSecret, PUBLIC_KEY_LEN};
pub use master_key::{MasterKey, MASTER_KEY_LEN};
