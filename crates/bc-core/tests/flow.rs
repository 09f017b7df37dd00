//! End-to-end flows through `CryptoService`.
//!
//! These tests cover:
//! - Identity provisioning and public key export
//! - Message encryption between two devices
//! - Master-key wrapping and unwrapping
//! - Persistence across restarts with the file store

use std::sync::Arc;

use bc_core::keystore::{FileKeyStore, SoftwareKeyStore};
use bc_core::{CoreConfig, CoreError, CryptoService, ErrorKind, IdentityState};
use bc_crypto::MasterKey;
use tempfile::TempDir;

fn device() -> (Arc<SoftwareKeyStore>, CryptoService) {
    let store = Arc::new(SoftwareKeyStore::new());
    let svc = CryptoService::new(store.clone(), &CoreConfig::default()).unwrap();
    (store, svc)
}

/// Generate identity, export, wrap a random master key to it, unwrap.
#[test]
fn master_key_scenario() {
    let (_, svc) = device();
    let pk = svc.generate_identity().unwrap();
    assert!((32..=65).contains(&pk.as_bytes().len()));

    let master = MasterKey::generate().unwrap();
    let wrapped = svc.wrap_key(pk.as_bytes(), master.as_bytes()).unwrap();
    let unwrapped = svc.unwrap_key(&wrapped).unwrap();
    assert_eq!(unwrapped.as_bytes(), master.as_bytes());
}

#[test]
fn generate_identity_is_idempotent() {
    let (_, svc) = device();
    assert_eq!(svc.state().unwrap(), IdentityState::Uninitialized);
    let first = svc.generate_identity().unwrap();
    let second = svc.generate_identity().unwrap();
    assert_eq!(first, second);
    assert_eq!(svc.public_key().unwrap(), first);
    assert_eq!(svc.state().unwrap(), IdentityState::Provisioned);
}

#[test]
fn provisioning_twice_is_a_usage_error() {
    let (_, svc) = device();
    let pk = svc.provision_identity().unwrap();
    assert_eq!(
        svc.provision_identity().unwrap_err().kind(),
        ErrorKind::AlreadyExists
    );
    assert_eq!(svc.public_key().unwrap(), pk);
}

#[test]
fn two_devices_exchange_messages() {
    let (_, alice) = device();
    let (_, bob) = device();
    let alice_pk = alice.generate_identity().unwrap();
    let bob_pk = bob.generate_identity().unwrap();

    let to_bob = alice.encrypt(bob_pk.as_bytes(), b"hi bob").unwrap();
    assert_eq!(bob.decrypt(&to_bob).unwrap(), b"hi bob");

    let to_alice = bob.encrypt(alice_pk.as_bytes(), b"hi alice").unwrap();
    assert_eq!(alice.decrypt(&to_alice).unwrap(), b"hi alice");

    // Alice cannot read what she sent to Bob.
    assert_eq!(alice.decrypt(&to_bob), Err(CoreError::AuthenticationFailed));
}

#[test]
fn tampering_is_detected() {
    let (_, svc) = device();
    let pk = svc.generate_identity().unwrap();
    let env = svc.encrypt(pk.as_bytes(), b"integrity matters").unwrap();

    for i in 1..env.len() {
        let mut tampered = env.clone();
        tampered[i] ^= 0x80;
        assert_eq!(
            svc.decrypt(&tampered),
            Err(CoreError::AuthenticationFailed),
            "byte {i}"
        );
    }
}

#[test]
fn envelopes_are_never_repeated() {
    let (_, svc) = device();
    let pk = svc.generate_identity().unwrap();
    let a = svc.encrypt(pk.as_bytes(), b"same").unwrap();
    let b = svc.encrypt(pk.as_bytes(), b"same").unwrap();
    assert_eq!(a[0], b[0]);
    assert_ne!(a[1..], b[1..]);
}

#[test]
fn malformed_envelopes() {
    let (_, svc) = device();
    svc.generate_identity().unwrap();

    assert_eq!(svc.decrypt(&[0x01; 10]).unwrap_err().kind(), ErrorKind::MalformedInput);
    let mut unknown = vec![0xFF];
    unknown.extend_from_slice(&[0u8; 80]);
    assert_eq!(svc.decrypt(&unknown), Err(CoreError::UnsupportedVersion(0xFF)));
}

#[test]
fn lockout_surfaces_as_keystore_locked() {
    let (store, svc) = device();
    let pk = svc.generate_identity().unwrap();
    let env = svc.encrypt(pk.as_bytes(), b"later").unwrap();

    store.set_locked(true);
    assert_eq!(svc.public_key().unwrap_err().kind(), ErrorKind::KeystoreLocked);
    assert_eq!(svc.decrypt(&env).unwrap_err().kind(), ErrorKind::KeystoreLocked);
    assert_eq!(
        svc.generate_identity().unwrap_err().to_reply().kind,
        ErrorKind::KeystoreLocked
    );

    store.set_locked(false);
    assert_eq!(svc.decrypt(&env).unwrap(), b"later");
}

#[test]
fn identity_survives_restart() {
    let dir = TempDir::new().unwrap();
    let (pk, wrapped, master) = {
        let store = Arc::new(FileKeyStore::open(dir.path()).unwrap());
        let svc = CryptoService::new(store, &CoreConfig::default()).unwrap();
        let pk = svc.generate_identity().unwrap();
        let master = MasterKey::generate().unwrap();
        let wrapped = svc.wrap_key(pk.as_bytes(), master.as_bytes()).unwrap();
        (pk, wrapped, master)
    };

    let store = Arc::new(FileKeyStore::open(dir.path()).unwrap());
    let svc = CryptoService::new(store, &CoreConfig::default()).unwrap();
    assert_eq!(svc.state().unwrap(), IdentityState::Provisioned);
    assert_eq!(svc.generate_identity().unwrap(), pk);
    assert_eq!(svc.unwrap_key(&wrapped).unwrap(), master);
}

#[test]
fn aes_gcm_suite_end_to_end() {
    let config = CoreConfig::from_toml("[envelope]\nsuite = \"aes-256-gcm\"").unwrap();
    let svc = CryptoService::new(Arc::new(SoftwareKeyStore::new()), &config).unwrap();
    let pk = svc.generate_identity().unwrap();
    let env = svc.encrypt(pk.as_bytes(), b"gcm").unwrap();
    assert_eq!(env[0], 0x02);
    assert_eq!(svc.decrypt(&env).unwrap(), b"gcm");
}
