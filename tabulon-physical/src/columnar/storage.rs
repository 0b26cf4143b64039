//! This module defines the [Storage] trait for packed stores without nulls,
//! together with its implementations for each physical layout.

pub mod composite;
pub mod dictionary;
pub mod fixed;
pub mod varlen;

use std::{cmp::Ordering, fmt::Debug, ops::Range};

use crate::{
    bitmap::BitmapSlice,
    buffer::ByteOrder,
    columnar::builder::BuilderOptions,
    datatypes::ElementType,
    error::Result,
    management::ByteSized,
    util::heapsort::SortPermutation,
};

pub use composite::{CompositeStaging, CompositeStore};
pub use dictionary::{CodeWidth, Codes, DictStaging, DictStore, Dictionary};
pub use fixed::{FixedStaging, FixedStore};
pub use varlen::{VarStaging, VarStore};

/// Immutable sequence of non-null values of one element type.
///
/// Stores are shared between columns, so every operation that changes
/// the content returns a new store. Ranges passed to the operations
/// refer to positions of this store and must be in bounds.
pub trait Storage: Debug + Clone + Send + Sync + ByteSized + 'static {
    /// Type of the values in this store
    type Item: Clone + Debug + PartialEq + Send + Sync + 'static;
    /// Builder producing stores of this type
    type Staging: StorageBuilder<Store = Self>;

    /// Corresponding [ElementType]
    const ELEMENT_TYPE: ElementType;

    /// Create a store without content.
    fn empty(order: ByteOrder) -> Self;

    /// Number of values in this store.
    fn len(&self) -> usize;

    /// Return `true` if this store contains no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte order of the multi-byte values in this store.
    fn byte_order(&self) -> ByteOrder;

    /// Return the value at the given position.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    fn get(&self, index: usize) -> Self::Item;

    /// Total order on values of this store.
    fn compare_values(left: &Self::Item, right: &Self::Item) -> Ordering;

    /// Compare the values at positions `i` and `j`.
    fn compare_at(&self, i: usize, j: usize) -> Ordering;

    /// Compare the value at `index` with `value`.
    fn compare_to(&self, index: usize, value: &Self::Item) -> Ordering;

    /// Compare the value at `index` with the value at `other_index` of another store.
    fn compare_across(&self, index: usize, other: &Self, other_index: usize) -> Ordering {
        self.compare_to(index, &other.get(other_index))
    }

    /// Return a view of the positions in `range` that shares the underlying bytes.
    fn slice(&self, range: Range<usize>) -> Self;

    /// Return `true` if all bytes of this store live on the heap.
    fn is_heap(&self) -> bool;

    /// Copy memory mapped parts of this store into fresh heap buffers.
    fn to_heap(&self) -> Self;

    /// Copy the values in `range` into a new store that shares nothing with this one.
    fn copy_range(&self, range: Range<usize>) -> Self {
        let mut staging = Self::Staging::derived(self, range.len());
        for index in range {
            staging.push_from(self, index);
        }
        staging.freeze()
    }

    /// Copy the positions of `range` whose bit in `keep` is set.
    ///
    /// `keep` covers exactly `range` and has `cardinality` set bits.
    fn filter_range(&self, range: Range<usize>, keep: &BitmapSlice, cardinality: usize) -> Self {
        debug_assert_eq!(keep.len(), range.len());

        let mut staging = Self::Staging::derived(self, cardinality);
        for offset in keep.iter_ones() {
            staging.push_from(self, range.start + offset);
        }
        staging.freeze()
    }

    /// Copy the values at the given positions, in the given order.
    fn gather(&self, indices: &[usize]) -> Self {
        let mut staging = Self::Staging::derived(self, indices.len());
        for &index in indices {
            staging.push_from(self, index);
        }
        staging.freeze()
    }

    /// Concatenate the values in `range` with the values in `other_range` of `other`.
    fn concat(&self, range: Range<usize>, other: &Self, other_range: Range<usize>) -> Result<Self> {
        let mut staging = Self::Staging::derived(self, range.len() + other_range.len());
        for index in range {
            staging.push_from(self, index);
        }
        for index in other_range {
            staging.push_from(other, index);
        }
        Ok(staging.freeze())
    }

    /// Return the values in `range` in ascending order.
    fn sorted(&self, range: Range<usize>) -> Self {
        let order = SortPermutation::sorted(range, |a, b| self.compare_at(a, b));
        self.gather(&order)
    }

    /// Remove consecutive duplicates from the values in `range`.
    ///
    /// On sorted input, the result is strictly ascending.
    fn deduplicate(&self, range: Range<usize>) -> Self {
        let mut staging = Self::Staging::derived(self, range.len());
        let mut previous: Option<usize> = None;
        for index in range {
            if previous.is_none_or(|previous| self.compare_at(previous, index) != Ordering::Equal) {
                staging.push_from(self, index);
            }
            previous = Some(index);
        }
        staging.freeze()
    }
}

/// Growable store used by builders and transformations.
pub trait StorageBuilder: Debug + Clone + Send + Sync {
    /// Store type produced by this builder
    type Store: Storage<Staging = Self>;

    /// Create an empty builder.
    fn new(options: &BuilderOptions) -> Self;

    /// Create an empty builder that writes values the way `source` stores them.
    ///
    /// Values copied with [StorageBuilder::push_from] from `source`
    /// (or from stores sharing its dictionary) always fit.
    fn derived(source: &Self::Store, capacity: usize) -> Self;

    /// Number of values pushed so far.
    fn len(&self) -> usize;

    /// Return `true` if no value has been pushed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make room for `additional` more values.
    fn reserve(&mut self, additional: usize);

    /// Append a value.
    fn push(&mut self, value: &<Self::Store as Storage>::Item) -> Result<()>;

    /// Append the value at `index` of `source` without decoding it where possible.
    fn push_from(&mut self, source: &Self::Store, index: usize);

    /// Compare the last pushed value with `value`.
    ///
    /// Returns `None` if nothing has been pushed.
    fn compare_last(&self, value: &<Self::Store as Storage>::Item) -> Option<Ordering>;

    /// Return a store containing the values pushed so far.
    ///
    /// Later pushes do not affect the returned store.
    fn freeze(&self) -> Self::Store;
}
