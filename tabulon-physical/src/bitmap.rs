//! This module defines the bit sets used for null markers and for filtering.
//!
//! Both are plain [bitvec] vectors over `u64` words, so that they can be
//! written to the binary format word by word.

use bitvec::{order::Lsb0, slice::BitSlice, vec::BitVec};

/// Growable bit set, one bit per position.
pub type Bitmap = BitVec<u64, Lsb0>;

/// Borrowed view of a [Bitmap].
pub type BitmapSlice = BitSlice<u64, Lsb0>;

/// Create a [Bitmap] of length `len` where no bit is set.
pub fn zeroed(len: usize) -> Bitmap {
    Bitmap::repeat(false, len)
}

/// Number of set bits, i.e. the size of the result of filtering with `bits`.
pub fn cardinality(bits: &BitmapSlice) -> usize {
    bits.count_ones()
}

/// Number of set bits strictly before `index`.
pub fn rank(bits: &BitmapSlice, index: usize) -> usize {
    bits[..index].count_ones()
}

/// Position of the first set bit at or after `from`.
pub fn next_set(bits: &BitmapSlice, from: usize) -> Option<usize> {
    if from >= bits.len() {
        return None;
    }
    bits[from..].first_one().map(|offset| from + offset)
}

/// Position of the last set bit strictly before `before`.
pub fn previous_set(bits: &BitmapSlice, before: usize) -> Option<usize> {
    bits[..before.min(bits.len())].last_one()
}

/// The backing words of `bits`, with bits beyond its length cleared.
pub fn to_words(bits: &BitmapSlice) -> Vec<u64> {
    let mut owned = Bitmap::with_capacity(bits.len());
    owned.extend_from_bitslice(bits);
    owned.set_uninitialized(false);
    owned.into_vec()
}

/// Rebuild a [Bitmap] of length `len` from its backing words.
///
/// Returns `None` if `words` does not hold exactly enough bits for `len`.
pub fn from_words(words: Vec<u64>, len: usize) -> Option<Bitmap> {
    if words.len() != len.div_ceil(64) {
        return None;
    }

    let mut bits = Bitmap::from_vec(words);
    bits.truncate(len);
    Some(bits)
}

#[cfg(test)]
mod test {
    use bitvec::{bitvec, order::Lsb0};

    use super::{cardinality, from_words, next_set, previous_set, rank, to_words, zeroed};

    #[test]
    fn rank_and_neighbours() {
        let bits = bitvec![u64, Lsb0; 0, 1, 1, 0, 0, 1, 0];

        assert_eq!(cardinality(&bits), 3);
        assert_eq!(rank(&bits, 0), 0);
        assert_eq!(rank(&bits, 3), 2);
        assert_eq!(rank(&bits, 7), 3);

        assert_eq!(next_set(&bits, 0), Some(1));
        assert_eq!(next_set(&bits, 3), Some(5));
        assert_eq!(next_set(&bits, 6), None);
        assert_eq!(next_set(&bits, 10), None);

        assert_eq!(previous_set(&bits, 7), Some(5));
        assert_eq!(previous_set(&bits, 5), Some(2));
        assert_eq!(previous_set(&bits, 1), None);
    }

    #[test]
    fn words_round_trip() {
        let mut bits = zeroed(70);
        bits.set(0, true);
        bits.set(64, true);
        bits.set(69, true);

        let words = to_words(&bits);
        assert_eq!(words, vec![1, 1 | (1 << 5)]);
        assert_eq!(from_words(words, 70), Some(bits));
    }

    #[test]
    fn words_of_subslice() {
        let bits = bitvec![u64, Lsb0; 1, 1, 0, 1];
        assert_eq!(to_words(&bits[1..]), vec![0b101]);
    }

    #[test]
    fn wrong_word_count_is_rejected() {
        assert_eq!(from_words(vec![0, 0], 10), None);
        assert_eq!(from_words(vec![], 0), Some(zeroed(0)));
    }
}
