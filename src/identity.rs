//! Monitor identities and identity key masks.
//!
//! An [`Identity`] is the ordered tuple of values that distinguishes one
//! monitor instance from another of the same type. In patterns, `Null`
//! positions are wildcards. A [`KeyMask`] selects the identity positions a
//! monitor map hashes on.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::value::{values_match, Value};

/// Ordered identity tuple of a monitor instance, or a pattern over one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Vec<Value>);

impl Identity {
    /// Wraps `values` in order.
    #[must_use]
    pub fn new(values: impl Into<Vec<Value>>) -> Self {
        Self(values.into())
    }

    /// Identity of a singleton monitor type.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// A pattern with every position wildcarded.
    #[must_use]
    pub fn wildcard(arity: usize) -> Self {
        Self(vec![Value::Null; arity])
    }

    /// The values in position order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Returns true if any position is a wildcard.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.0.iter().any(Value::is_wildcard)
    }

    /// Positions holding concrete values.
    #[must_use]
    pub fn concrete_mask(&self) -> KeyMask {
        KeyMask::concrete_positions(&self.0)
    }

    /// Wildcard-aware match with `self` as the pattern.
    #[must_use]
    pub fn matches(&self, concrete: &[Value]) -> bool {
        values_match(&self.0, concrete)
    }

    /// Unwraps the values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl Deref for Identity {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[Value]> for Identity {
    fn as_ref(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Identity {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl From<&[Value]> for Identity {
    fn from(values: &[Value]) -> Self {
        Self(values.to_vec())
    }
}

impl FromIterator<Value> for Identity {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// Set of identity positions, at most [`KeyMask::MAX_ARITY`] of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct KeyMask(u64);

impl KeyMask {
    /// Largest identity arity a mask can describe.
    pub const MAX_ARITY: usize = 64;

    /// The empty mask: every instance lands in the same bucket.
    pub const NONE: Self = Self(0);

    /// Mask of every position of an identity of `arity` values.
    #[must_use]
    pub const fn all(arity: usize) -> Self {
        if arity >= Self::MAX_ARITY {
            Self(u64::MAX)
        } else {
            Self((1_u64 << arity) - 1)
        }
    }

    /// Mask holding exactly `positions`.
    #[must_use]
    pub fn from_positions(positions: impl IntoIterator<Item = usize>) -> Self {
        let mut mask = Self::NONE;
        for position in positions {
            mask.insert(position);
        }
        mask
    }

    /// Positions of `values` that are not wildcards.
    #[must_use]
    pub fn concrete_positions(values: &[Value]) -> Self {
        Self::from_positions(
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_wildcard())
                .map(|(i, _)| i),
        )
    }

    /// Adds a position. Positions beyond [`KeyMask::MAX_ARITY`] are ignored.
    pub fn insert(&mut self, position: usize) {
        if position < Self::MAX_ARITY {
            self.0 |= 1 << position;
        }
    }

    /// Returns true if `position` is in the mask.
    #[must_use]
    pub const fn contains(self, position: usize) -> bool {
        position < Self::MAX_ARITY && self.0 & (1 << position) != 0
    }

    /// Returns true if every position of `self` is also in `other`.
    #[must_use]
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Positions in both masks.
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Returns true if no position is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of positions set.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates the positions in ascending order.
    pub fn positions(self) -> impl Iterator<Item = usize> {
        (0..Self::MAX_ARITY).filter(move |&i| self.contains(i))
    }
}

impl fmt::Display for KeyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        let positions: Vec<String> = self.positions().map(|p| p.to_string()).collect();
        write!(f, "{{{}}}", positions.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_pattern_detection() {
        let concrete = Identity::new(vec![Value::from("a"), Value::Int(1)]);
        let pattern = Identity::new(vec![Value::Null, Value::Int(1)]);
        assert!(!concrete.is_pattern());
        assert!(pattern.is_pattern());
        assert!(pattern.matches(&concrete));
        assert!(!concrete.matches(&pattern));
        assert_eq!(pattern.concrete_mask(), KeyMask::from_positions([1]));
    }

    #[test]
    fn test_identity_display() {
        let id = Identity::new(vec![Value::from("a"), Value::Null]);
        assert_eq!(id.to_string(), "(\"a\", *)");
        assert_eq!(Identity::empty().to_string(), "()");
    }

    #[test]
    fn test_key_mask_all() {
        assert_eq!(KeyMask::all(0), KeyMask::NONE);
        assert_eq!(KeyMask::all(3).count(), 3);
        assert_eq!(KeyMask::all(64).count(), 64);
        assert_eq!(KeyMask::all(70).count(), 64);
    }

    #[test]
    fn test_key_mask_subset() {
        let partial = KeyMask::from_positions([0, 2]);
        let all = KeyMask::all(3);
        assert!(partial.is_subset_of(all));
        assert!(!all.is_subset_of(partial));
        assert!(KeyMask::NONE.is_subset_of(partial));
        assert_eq!(partial.positions().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(partial.to_string(), "{0,2}");
    }

    #[test]
    fn test_key_mask_ignores_out_of_range() {
        let mut mask = KeyMask::NONE;
        mask.insert(64);
        assert!(mask.is_empty());
        assert!(!mask.contains(100));
    }
}
