//! Constant-time comparison helpers.
//!
//! Anything that compares key material or authenticators goes through these
//! instead of `==` on slices.

use constant_time_eq::constant_time_eq;

/// Compare two byte slices in constant time (for equal lengths).
///
/// ```rust
/// use bc_crypto::utils::constant_time_compare;
///
/// assert!(constant_time_compare(&[0u8; 32], &[0u8; 32]));
/// assert!(!constant_time_compare(&[0u8; 32], &[1u8; 32]));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}

/// Fixed-size variant of [`constant_time_compare`].
pub fn constant_time_compare_array<const N: usize>(a: &[u8; N], b: &[u8; N]) -> bool {
    constant_time_eq(a, b)
}

/// XOR `mask` into `target` byte by byte.
pub fn xor_in_place<const N: usize>(target: &mut [u8; N], mask: &[u8; N]) {
    for (t, m) in target.iter_mut().zip(mask.iter()) {
        *t ^= m;
    }
}
