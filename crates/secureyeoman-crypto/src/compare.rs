//! Constant-time comparison.

use subtle::ConstantTimeEq;

/// Compare two byte slices in constant time.
///
/// Length is compared first; unequal lengths return `false` immediately,
/// which leaks only the length (already public for hashes, signatures, and
/// tokens).
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal() {
        assert!(constant_time_eq(b"secret", b"secret"));
    }

    #[test]
    fn test_unequal_same_length() {
        assert!(!constant_time_eq(b"secret", b"secreT"));
    }

    #[test]
    fn test_unequal_length() {
        assert!(!constant_time_eq(b"secret", b"secrets"));
    }

    #[test]
    fn test_empty() {
        assert!(constant_time_eq(b"", b""));
    }
}
