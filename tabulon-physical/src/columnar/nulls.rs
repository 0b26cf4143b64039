//! This module defines the null bitmap of nullable columns
//! and the translation between logical and physical positions.

use std::{fmt::Debug, sync::Arc};

use once_cell::sync::OnceCell;

use crate::{
    bitmap::{self, Bitmap, BitmapSlice},
    management::{bytesized::size_inner_vec_flat, ByteSized},
};

use super::{characteristics::Characteristics, storage::Storage};

/// Number of positions between two entries of the checkpoint table
const CHECKPOINT_INTERVAL: usize = 512;

/// Null markers over the logical positions of a nullable column.
///
/// Non-null values are stored packed, so the physical position of a logical
/// position is the logical position minus the nulls before it. The number of
/// nulls before every multiple of [CHECKPOINT_INTERVAL] is computed on first use.
#[derive(Clone)]
pub(crate) struct NullMap {
    /// Set bits mark nulls
    bits: Arc<Bitmap>,
    checkpoints: Arc<OnceCell<Vec<usize>>>,
}

impl NullMap {
    pub(crate) fn new(bits: Bitmap) -> Self {
        Self {
            bits: Arc::new(bits),
            checkpoints: Arc::new(OnceCell::new()),
        }
    }

    /// Number of logical positions.
    pub(crate) fn len(&self) -> usize {
        self.bits.len()
    }

    pub(crate) fn bits(&self) -> &BitmapSlice {
        &self.bits
    }

    pub(crate) fn is_null(&self, logical: usize) -> bool {
        self.bits[logical]
    }

    fn checkpoints(&self) -> &[usize] {
        self.checkpoints.get_or_init(|| {
            log::trace!("computing null checkpoints for {} positions", self.len());

            let mut checkpoints = Vec::with_capacity(self.len() / CHECKPOINT_INTERVAL + 1);
            let mut nulls = 0;
            checkpoints.push(0);
            for block in self.bits.chunks(CHECKPOINT_INTERVAL) {
                nulls += block.count_ones();
                checkpoints.push(nulls);
            }
            checkpoints
        })
    }

    /// Number of nulls strictly before `logical`.
    pub(crate) fn nulls_before(&self, logical: usize) -> usize {
        let block = logical / CHECKPOINT_INTERVAL;
        let start = block * CHECKPOINT_INTERVAL;
        self.checkpoints()[block] + bitmap::rank(&self.bits[start..], logical - start)
    }

    /// Number of nulls in the logical positions `from..to`.
    pub(crate) fn null_count(&self, from: usize, to: usize) -> usize {
        self.nulls_before(to) - self.nulls_before(from)
    }

    /// Physical position of the first non-null value at or after `logical`.
    pub(crate) fn non_null_index(&self, logical: usize) -> usize {
        logical - self.nulls_before(logical)
    }

    /// Logical position of the value stored at `physical`.
    pub(crate) fn null_index(&self, physical: usize) -> Option<usize> {
        let checkpoints = self.checkpoints();
        let non_nulls_before = |block: usize| block * CHECKPOINT_INTERVAL - checkpoints[block];

        // Last block that starts with at most `physical` non-null values before it
        let (mut low, mut high) = (0, checkpoints.len() - 1);
        while low < high {
            let middle = low + (high - low) / 2;
            if non_nulls_before(middle) <= physical {
                low = middle + 1;
            } else {
                high = middle;
            }
        }
        let block = low.checked_sub(1)?;

        let start = block * CHECKPOINT_INTERVAL;
        self.bits[start..]
            .iter_zeros()
            .nth(physical - non_nulls_before(block))
            .map(|offset| start + offset)
    }
}

impl Debug for NullMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullMap")
            .field("len", &self.len())
            .field("nulls", &bitmap::cardinality(&self.bits))
            .finish()
    }
}

impl ByteSized for NullMap {
    fn size_bytes(&self) -> u64 {
        let checkpoints = self
            .checkpoints
            .get()
            .map_or(0, |checkpoints| size_inner_vec_flat(checkpoints));
        size_of::<Self>() as u64 + self.bits.size_bytes() + checkpoints
    }
}

/// Packed non-null values together with the null markers of all logical positions.
#[derive(Debug, Clone)]
pub(crate) struct NullableStore<S: Storage> {
    pub(crate) values: S,
    pub(crate) nulls: NullMap,
    /// Ordering guarantees of the packed values
    pub(crate) packed: Characteristics,
}

impl<S: Storage> NullableStore<S> {
    pub(crate) fn new(values: S, nulls: NullMap, packed: Characteristics) -> Self {
        debug_assert_eq!(values.len() + bitmap::cardinality(nulls.bits()), nulls.len());

        Self {
            values,
            nulls,
            packed,
        }
    }
}

impl<S: Storage> ByteSized for NullableStore<S> {
    fn size_bytes(&self) -> u64 {
        self.values.size_bytes() + self.nulls.size_bytes()
    }
}

#[cfg(test)]
mod test {
    use bitvec::{bitvec, order::Lsb0};
    use quickcheck_macros::quickcheck;
    use test_log::test;

    use crate::bitmap::Bitmap;

    use super::NullMap;

    #[test]
    fn translates_positions() {
        let nulls = NullMap::new(bitvec![u64, Lsb0; 1, 0, 0, 1, 1, 0]);

        assert_eq!(nulls.nulls_before(0), 0);
        assert_eq!(nulls.nulls_before(3), 1);
        assert_eq!(nulls.nulls_before(6), 3);
        assert_eq!(nulls.null_count(1, 5), 2);

        assert_eq!(nulls.non_null_index(1), 0);
        assert_eq!(nulls.non_null_index(2), 1);
        assert_eq!(nulls.non_null_index(5), 2);

        assert_eq!(nulls.null_index(0), Some(1));
        assert_eq!(nulls.null_index(2), Some(5));
        assert_eq!(nulls.null_index(3), None);
    }

    #[test]
    fn spans_several_blocks() {
        let mut bits = Bitmap::repeat(false, 2000);
        for position in (0..2000).step_by(3) {
            bits.set(position, true);
        }
        let nulls = NullMap::new(bits);

        assert_eq!(nulls.nulls_before(1500), 500);
        assert_eq!(nulls.non_null_index(1501), 1000);
        assert_eq!(nulls.null_index(1000), Some(1501));
        assert_eq!(nulls.null_index(0), Some(1));
    }

    #[quickcheck]
    fn null_index_inverts_non_null_index(flags: Vec<bool>) -> bool {
        let bits = flags.iter().copied().collect::<Bitmap>();
        let nulls = NullMap::new(bits);

        flags.iter().enumerate().all(|(logical, &null)| {
            null || nulls.null_index(nulls.non_null_index(logical)) == Some(logical)
        })
    }
}
