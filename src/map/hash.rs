//! Key projection and hashing for monitor maps.

use crate::identity::KeyMask;
use crate::value::Value;

/// Hashes the positions of `values` selected by `key`.
///
/// Positions past the end of `values` are skipped, so a short pattern hashes
/// like its prefix.
pub(crate) fn key_hash(key: KeyMask, values: &[Value]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    for position in key.positions() {
        if let Some(value) = values.get(position) {
            value.hash_into(&mut hasher);
        }
    }
    let digest = hasher.finalize();
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// True if `pattern` matches `concrete` at every position selected by `key`.
pub(crate) fn key_matches(key: KeyMask, pattern: &[Value], concrete: &[Value]) -> bool {
    key.positions().all(|position| {
        match (pattern.get(position), concrete.get(position)) {
            (Some(p), Some(c)) => p.matches(c),
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_ignores_positions_outside_key() {
        let key = KeyMask::from_positions([0]);
        let a = [Value::from("x"), Value::Int(1)];
        let b = [Value::from("x"), Value::Int(2)];
        let c = [Value::from("y"), Value::Int(1)];
        assert_eq!(key_hash(key, &a), key_hash(key, &b));
        assert_ne!(key_hash(key, &a), key_hash(key, &c));
    }

    #[test]
    fn test_empty_key_hashes_everything_alike() {
        let a = [Value::Int(1)];
        let b = [Value::Int(2)];
        assert_eq!(key_hash(KeyMask::NONE, &a), key_hash(KeyMask::NONE, &b));
        assert!(key_matches(KeyMask::NONE, &a, &b));
    }

    #[test]
    fn test_key_matches_with_wildcard_outside_key() {
        let key = KeyMask::from_positions([1]);
        let pattern = [Value::Null, Value::Int(5)];
        assert!(key_matches(key, &pattern, &[Value::Int(9), Value::Int(5)]));
        assert!(!key_matches(key, &pattern, &[Value::Int(9), Value::Int(6)]));
        assert!(!key_matches(key, &pattern, &[Value::Int(9)]));
    }
}
