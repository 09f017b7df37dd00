use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    let out = h.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// Display fingerprint of a public key: hex(sha256(pubkey_bytes)).
///
/// Used wherever a key has to show up in logs or UI; the raw key is never
/// logged.
pub fn key_fingerprint(pubkey_bytes: &[u8]) -> String {
    hex::encode(sha256(pubkey_bytes))
}
