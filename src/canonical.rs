//! Direction-independent keys for unordered entity pairs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::EntityId;

/// Key for an unordered pair of entities.
///
/// Both expected and actual paths are indexed by this key, so the direction a
/// path was discovered in never affects comparison.
///
/// # Examples
///
/// ```
/// use er_oracle::{CanonicalPairKey, EntityId};
///
/// let a = EntityId::new(40);
/// let b = EntityId::new(7);
/// assert_eq!(CanonicalPairKey::new(a, b), CanonicalPairKey::new(b, a));
/// assert_eq!(CanonicalPairKey::new(a, b).to_string(), "7:40");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalPairKey {
    low: EntityId,
    high: EntityId,
}

impl CanonicalPairKey {
    /// Builds the key for the unordered pair `{a, b}`.
    #[must_use]
    pub fn new(a: EntityId, b: EntityId) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// The numerically smaller endpoint.
    #[must_use]
    pub const fn low(&self) -> EntityId {
        self.low
    }

    /// The numerically larger endpoint.
    #[must_use]
    pub const fn high(&self) -> EntityId {
        self.high
    }

    /// Returns `chain` oriented so that it starts at the lower endpoint.
    ///
    /// Chains that do not start at the higher endpoint are returned unchanged,
    /// so a malformed chain still surfaces in the comparison that follows.
    #[must_use]
    pub fn orient(&self, chain: &[EntityId]) -> Vec<EntityId> {
        if self.low != self.high && chain.first() == Some(&self.high) {
            chain.iter().rev().copied().collect()
        } else {
            chain.to_vec()
        }
    }
}

impl fmt::Display for CanonicalPairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(raw: &[i64]) -> Vec<EntityId> {
        raw.iter().copied().map(EntityId::new).collect()
    }

    #[test]
    fn test_same_endpoint_pair() {
        let key = CanonicalPairKey::new(EntityId::new(5), EntityId::new(5));
        assert_eq!(key.low(), key.high());
        assert_eq!(key.to_string(), "5:5");
    }

    #[test]
    fn test_negative_ids_order_numerically() {
        let key = CanonicalPairKey::new(EntityId::new(3), EntityId::new(-9));
        assert_eq!(key.low(), EntityId::new(-9));
    }

    #[test]
    fn test_orient_reverses_high_first_chain() {
        let key = CanonicalPairKey::new(EntityId::new(9), EntityId::new(2));
        assert_eq!(key.orient(&ids(&[9, 4, 2])), ids(&[2, 4, 9]));
        assert_eq!(key.orient(&ids(&[2, 4, 9])), ids(&[2, 4, 9]));
    }

    #[test]
    fn test_orient_leaves_empty_chain() {
        let key = CanonicalPairKey::new(EntityId::new(1), EntityId::new(2));
        assert!(key.orient(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_key_is_symmetric(a in any::<i64>(), b in any::<i64>()) {
            let (a, b) = (EntityId::new(a), EntityId::new(b));
            prop_assert_eq!(CanonicalPairKey::new(a, b), CanonicalPairKey::new(b, a));
            prop_assert_eq!(CanonicalPairKey::new(a, b), CanonicalPairKey::new(a, b));
            prop_assert!(CanonicalPairKey::new(a, b).low() <= CanonicalPairKey::new(a, b).high());
        }
    }
}
