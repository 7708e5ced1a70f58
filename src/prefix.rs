//! Prefix scan bound derivation
//!
//! A prefix scan covers the half-open key range `[prefix, upper_bound)`,
//! where the upper bound is the prefix with its last byte incremented.
//! Trailing 0xFF bytes cannot be incremented and are dropped instead; an
//! empty or all-0xFF prefix has no finite upper bound.

/// Exclusive upper bound for keys starting with `prefix`.
///
/// Returns `None` when the range is unbounded above (empty prefix, or a
/// prefix consisting solely of 0xFF bytes).
pub fn upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(bound);
        }
        bound.pop();
    }
    None
}
