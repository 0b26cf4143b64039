//! This module defines [Characteristics],
//! the ordering guarantees a column declares about its content.

use std::fmt::{Debug, Display};

use crate::{
    error::{Error, Result},
    util::bitset::BitSet,
};

/// Number of defined characteristics
const NUM_CHARACTERISTICS: usize = 3;

/// Position of the flag stating that no entry is null
const NONNULL: usize = 0;
/// Position of the flag stating that entries are in ascending order
const SORTED: usize = 1;
/// Position of the flag stating that entries are in strictly ascending order
const DISTINCT: usize = 2;

/// Set of guarantees of a column.
///
/// The flags form a chain: DISTINCT implies SORTED, which implies NONNULL.
/// Every constructor closes the set under this chain,
/// so that a [Characteristics] value is always consistent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Characteristics(BitSet);

impl Characteristics {
    /// No guarantees.
    pub fn none() -> Self {
        Self(BitSet::empty())
    }

    /// The column contains no null entries.
    pub fn nonnull() -> Self {
        Self::new(true, false, false)
    }

    /// The column contains no null entries and is in ascending order.
    pub fn sorted() -> Self {
        Self::new(true, true, false)
    }

    /// The column contains no null entries and is in strictly ascending order.
    pub fn distinct() -> Self {
        Self(BitSet::full(NUM_CHARACTERISTICS))
    }

    /// Create a set from individual flags, adding all implied flags.
    pub fn new(nonnull: bool, sorted: bool, distinct: bool) -> Self {
        let mut bits = BitSet::empty();
        bits.set(DISTINCT, distinct);
        bits.set(SORTED, sorted || distinct);
        bits.set(NONNULL, nonnull || sorted || distinct);
        Self(bits)
    }

    /// Decode the bitmask used in the binary format.
    ///
    /// Unlike [Characteristics::new], this does not add implied flags:
    /// a bitmask that violates the implication chain or has unknown bits is rejected.
    pub fn from_bits(bits: u32) -> Result<Self> {
        let raw = BitSet::from_raw(bits);
        if !raw.is_subset(BitSet::full(NUM_CHARACTERISTICS)) {
            return Err(Error::invalid_argument(format!(
                "unknown characteristics in bitmask {bits:#b}"
            )));
        }

        let closed = Self::new(raw.get(NONNULL), raw.get(SORTED), raw.get(DISTINCT));
        if closed.0 != raw {
            return Err(Error::invalid_argument(format!(
                "characteristics {bits:#b} violate DISTINCT => SORTED => NONNULL"
            )));
        }

        Ok(closed)
    }

    /// The bitmask used in the binary format.
    pub fn bits(&self) -> u32 {
        self.0.raw()
    }

    /// Whether the column is guaranteed to not contain nulls.
    pub fn is_nonnull(&self) -> bool {
        self.0.get(NONNULL)
    }

    /// Whether the column is guaranteed to be in ascending order.
    pub fn is_sorted(&self) -> bool {
        self.0.get(SORTED)
    }

    /// Whether the column is guaranteed to be in strictly ascending order.
    pub fn is_distinct(&self) -> bool {
        self.0.get(DISTINCT)
    }

    /// This set with the NONNULL flag added.
    pub fn with_nonnull(self) -> Self {
        self.union(Self::nonnull())
    }

    /// Guarantees that hold for both sets.
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0.intersection(other.0))
    }

    /// Guarantees that hold for one of the sets.
    ///
    /// The union of closed sets is closed.
    pub fn union(self, other: Self) -> Self {
        Self(self.0.union(other.0))
    }

    /// Only the ordering related flags, SORTED and DISTINCT.
    pub fn ordering(self) -> Self {
        let mut bits = self.0;
        bits.set(NONNULL, false);
        Self(bits)
    }

    /// Whether every guarantee of `self` is also given by `other`.
    pub fn is_implied_by(&self, other: Self) -> bool {
        self.0.is_subset(other.0)
    }
}

impl Display for Characteristics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (self.is_nonnull(), "NONNULL"),
            (self.is_sorted(), "SORTED"),
            (self.is_distinct(), "DISTINCT"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect::<Vec<_>>();

        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

impl Debug for Characteristics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Characteristics({self})")
    }
}

#[cfg(test)]
mod test {
    use super::Characteristics;

    #[test]
    fn implications_are_closed() {
        let distinct = Characteristics::new(false, false, true);
        assert!(distinct.is_distinct());
        assert!(distinct.is_sorted());
        assert!(distinct.is_nonnull());
        assert_eq!(distinct, Characteristics::distinct());

        let sorted = Characteristics::new(false, true, false);
        assert!(sorted.is_nonnull());
        assert!(!sorted.is_distinct());
    }

    #[test]
    fn bitmask_round_trip() {
        assert_eq!(Characteristics::none().bits(), 0);
        assert_eq!(Characteristics::nonnull().bits(), 1);
        assert_eq!(Characteristics::sorted().bits(), 3);
        assert_eq!(Characteristics::distinct().bits(), 7);

        for bits in [0, 1, 3, 7] {
            assert_eq!(Characteristics::from_bits(bits).unwrap().bits(), bits);
        }
    }

    #[test]
    fn invalid_bitmasks_are_rejected() {
        // SORTED without NONNULL
        assert!(Characteristics::from_bits(2).is_err());
        // DISTINCT without SORTED
        assert!(Characteristics::from_bits(5).is_err());
        // unknown flag
        assert!(Characteristics::from_bits(8 | 7).is_err());
    }

    #[test]
    fn set_operations() {
        let sorted = Characteristics::sorted();
        let distinct = Characteristics::distinct();

        assert_eq!(sorted.intersection(distinct), sorted);
        assert_eq!(sorted.union(distinct), distinct);
        assert_eq!(Characteristics::none().with_nonnull(), Characteristics::nonnull());
        assert_eq!(distinct.ordering().bits(), 6);
        assert!(sorted.is_implied_by(distinct));
        assert!(!distinct.is_implied_by(sorted));
    }

    #[test]
    fn display() {
        assert_eq!(Characteristics::none().to_string(), "NONE");
        assert_eq!(
            Characteristics::distinct().to_string(),
            "NONNULL|SORTED|DISTINCT"
        );
    }
}
