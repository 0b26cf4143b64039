//! This module implements [BitSet], a small set of flags packed into one word.

/// Set of indices below 32, stored as the bits of a [u32].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct BitSet(u32);

impl BitSet {
    /// Largest number of elements a [BitSet] can hold
    pub(crate) const CAPACITY: usize = u32::BITS as usize;

    /// The set without elements.
    pub(crate) fn empty() -> Self {
        Self(0)
    }

    /// The set `0..count`, or all indices if `count` exceeds [BitSet::CAPACITY].
    pub(crate) fn full(count: usize) -> Self {
        if count >= Self::CAPACITY {
            Self(u32::MAX)
        } else {
            Self((1 << count) - 1)
        }
    }

    /// Interpret the bits of `raw` as a set.
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The bits of this set.
    pub(crate) fn raw(&self) -> u32 {
        self.0
    }

    /// Insert `index` if `value` is `true`, remove it otherwise.
    pub(crate) fn set(&mut self, index: usize, value: bool) {
        let mask = 1 << index;
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Whether `index` is an element.
    pub(crate) fn get(&self, index: usize) -> bool {
        self.0 >> index & 1 == 1
    }

    /// Elements of both sets.
    pub(crate) fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Elements of either set.
    pub(crate) fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every element of `self` is also in `other`.
    pub(crate) fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }
}

#[cfg(test)]
mod test {
    use super::BitSet;

    #[test]
    fn full_sets() {
        assert_eq!(BitSet::full(0), BitSet::empty());
        assert_eq!(BitSet::full(3).raw(), 0b111);
        assert_eq!(BitSet::full(BitSet::CAPACITY).raw(), u32::MAX);
    }

    #[test]
    fn set_and_get() {
        let mut bits = BitSet::empty();
        bits.set(3, true);
        bits.set(0, true);
        bits.set(5, true);
        bits.set(3, false);

        assert_eq!(bits.raw(), 0b100001);
        assert!(bits.get(0));
        assert!(!bits.get(3));
        assert!(!bits.get(31));
    }

    #[test]
    fn subsets() {
        let small = BitSet::from_raw(0b0101);
        let large = BitSet::from_raw(0b0111);

        assert!(small.is_subset(large));
        assert!(!large.is_subset(small));
        assert!(BitSet::empty().is_subset(small));
        assert_eq!(small.union(large), large);
        assert_eq!(small.intersection(BitSet::from_raw(0b1100)).raw(), 0b0100);
    }
}
