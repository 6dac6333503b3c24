//! Constant-time operations for security.

use subtle::{Choice, ConstantTimeEq};

/// Compare two byte slices in constant time.
///
/// Every byte position up to the longer of the two inputs is visited and the
/// per-byte results are folded together, so the running time depends only on
/// the input lengths. A length mismatch is folded in the same way rather than
/// returning early.
///
/// # Arguments
/// * `a` - First byte slice
/// * `b` - Second byte slice
///
/// # Returns
/// true if slices are equal, false otherwise
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    let len_eq = (a.len() as u64).ct_eq(&(b.len() as u64));
    let max = a.len().max(b.len());

    let mut acc = Choice::from(1u8);
    for i in 0..max {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        acc &= x.ct_eq(&y);
    }

    (acc & len_eq).into()
}

/// Compare two strings in constant time.
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
