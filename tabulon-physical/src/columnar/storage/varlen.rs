//! This module defines [VarStore],
//! a packed store of byte strings of arbitrary length.

use std::{cmp::Ordering, marker::PhantomData, ops::Range};

use crate::{
    buffer::{ByteOrder, SharedBuffer, StagingBuffer},
    columnar::builder::BuilderOptions,
    datatypes::{ElementType, VarWidth},
    error::{Error, Result},
    management::ByteSized,
};

use super::{
    fixed::{FixedStaging, FixedStore},
    Storage, StorageBuilder,
};

/// Store of `n` values described by `n + 1` pointers into a byte blob.
///
/// Value `i` spans the bytes `pointers[i]..pointers[i + 1]` of `data`.
/// Pointers are absolute positions in `data`,
/// so that a view only narrows the pointer array.
#[derive(Debug, Clone)]
pub struct VarStore<T> {
    pointers: FixedStore<i64>,
    data: SharedBuffer,
    _marker: PhantomData<T>,
}

impl<T: VarWidth> VarStore<T> {
    /// Assemble a store from a pointer array and a blob.
    ///
    /// Pointers must be non-decreasing, start at a non-negative position,
    /// end inside the blob, and delimit valid encodings of `T`.
    pub fn from_parts(pointers: FixedStore<i64>, data: SharedBuffer) -> Result<Self> {
        if pointers.is_empty() {
            return Err(Error::invalid_argument("pointer array must not be empty"));
        }

        let mut previous = pointers.value(0);
        if previous < 0 {
            return Err(Error::invalid_argument(format!(
                "pointer {previous} is negative"
            )));
        }
        for pointer in pointers.values().skip(1) {
            if pointer < previous || pointer as u64 > data.len() as u64 {
                return Err(Error::invalid_argument(format!(
                    "pointer {pointer} after {previous} is out of order or exceeds {} bytes",
                    data.len()
                )));
            }
            if !T::is_valid(&data.bytes()[previous as usize..pointer as usize]) {
                return Err(Error::invalid_argument(format!(
                    "bytes {previous}..{pointer} do not encode a {}",
                    T::ELEMENT_TYPE
                )));
            }
            previous = pointer;
        }

        Ok(Self {
            pointers,
            data,
            _marker: PhantomData,
        })
    }

    /// Create a store holding the given values.
    pub fn from_values(values: &[T], order: ByteOrder) -> Self {
        let mut staging = VarStaging::with_order(order, values.len());
        for value in values {
            staging.push_bytes(value.as_bytes());
        }
        staging.freeze_values()
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.pointers.len() - 1
    }

    /// Return `true` if this store contains no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pointer array.
    pub fn pointers(&self) -> &FixedStore<i64> {
        &self.pointers
    }

    /// The blob the pointers refer to.
    pub fn data(&self) -> &SharedBuffer {
        &self.data
    }

    fn pointer(&self, index: usize) -> usize {
        // Validated in the constructors
        self.pointers.value(index) as usize
    }

    /// The encoding of the value at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn bytes_at(&self, index: usize) -> &[u8] {
        &self.data.bytes()[self.pointer(index)..self.pointer(index + 1)]
    }

    /// Iterate over the encodings of all values.
    pub fn iter_bytes(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len()).map(|index| self.bytes_at(index))
    }

    /// Return `true` if the pointers start at zero and cover the whole blob.
    pub fn is_compact(&self) -> bool {
        self.pointer(0) == 0 && self.pointer(self.len()) == self.data.len()
    }

    /// This store with pointers rebased to zero and the blob trimmed to the values.
    pub fn compacted(&self) -> Self {
        if self.is_compact() {
            self.clone()
        } else {
            self.copy_values(0..self.len())
        }
    }

    fn copy_values(&self, range: Range<usize>) -> Self {
        let base = self.pointer(range.start);
        let end = self.pointer(range.end);

        let mut pointers = FixedStaging::<i64>::with_order(self.pointers.order(), range.len() + 1);
        for index in range.start..=range.end {
            pointers.push_value((self.pointer(index) - base) as i64);
        }

        Self {
            pointers: pointers.freeze_values(),
            data: SharedBuffer::from_vec(self.data.bytes()[base..end].to_vec(), self.data.order()),
            _marker: PhantomData,
        }
    }
}

impl<T> ByteSized for VarStore<T> {
    fn size_bytes(&self) -> u64 {
        self.pointers.size_bytes() + self.data.size_bytes()
    }
}

/// Builder for a [VarStore].
#[derive(Debug, Clone)]
pub struct VarStaging<T> {
    pointers: FixedStaging<i64>,
    data: StagingBuffer,
    _marker: PhantomData<T>,
}

impl<T: VarWidth> VarStaging<T> {
    /// Create an empty builder.
    ///
    /// `order` is the byte order of the pointer array.
    pub fn with_order(order: ByteOrder, capacity: usize) -> Self {
        let mut pointers = FixedStaging::with_order(order, capacity + 1);
        pointers.push_value(0);

        Self {
            pointers,
            data: StagingBuffer::new(order),
            _marker: PhantomData,
        }
    }

    /// Number of values pushed so far.
    pub fn len(&self) -> usize {
        self.pointers.len() - 1
    }

    /// Return `true` if no value has been pushed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make room for `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.pointers.reserve(additional);
    }

    /// Append the encoding of a value.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.pointers.push_value(self.data.len() as i64);
    }

    /// The encoding of the value pushed at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn bytes_at(&self, index: usize) -> &[u8] {
        let start = self.pointers.value_at(index) as usize;
        let end = self.pointers.value_at(index + 1) as usize;
        &self.data.bytes()[start..end]
    }

    /// The encoding of the last pushed value.
    pub fn last_bytes(&self) -> Option<&[u8]> {
        self.len().checked_sub(1).map(|last| self.bytes_at(last))
    }

    /// Store containing the values pushed so far.
    pub fn freeze_values(&self) -> VarStore<T> {
        VarStore {
            pointers: self.pointers.freeze_values(),
            data: self.data.freeze(),
            _marker: PhantomData,
        }
    }
}

impl<T: VarWidth> Storage for VarStore<T> {
    type Item = T;
    type Staging = VarStaging<T>;

    const ELEMENT_TYPE: ElementType = T::ELEMENT_TYPE;

    fn empty(order: ByteOrder) -> Self {
        VarStaging::with_order(order, 0).freeze_values()
    }

    fn len(&self) -> usize {
        VarStore::len(self)
    }

    fn byte_order(&self) -> ByteOrder {
        self.pointers.order()
    }

    fn get(&self, index: usize) -> T {
        T::from_bytes(self.bytes_at(index))
    }

    fn compare_values(left: &T, right: &T) -> Ordering {
        left.as_bytes().cmp(right.as_bytes())
    }

    fn compare_at(&self, i: usize, j: usize) -> Ordering {
        self.bytes_at(i).cmp(self.bytes_at(j))
    }

    fn compare_to(&self, index: usize, value: &T) -> Ordering {
        self.bytes_at(index).cmp(value.as_bytes())
    }

    fn compare_across(&self, index: usize, other: &Self, other_index: usize) -> Ordering {
        self.bytes_at(index).cmp(other.bytes_at(other_index))
    }

    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            pointers: self.pointers.view(range.start..range.end + 1),
            data: self.data.clone(),
            _marker: PhantomData,
        }
    }

    fn is_heap(&self) -> bool {
        self.pointers.is_heap() && self.data.is_heap()
    }

    fn to_heap(&self) -> Self {
        if self.is_heap() {
            self.clone()
        } else {
            log::trace!("copying {} mapped values to the heap", self.len());
            self.copy_values(0..self.len())
        }
    }

    fn copy_range(&self, range: Range<usize>) -> Self {
        self.copy_values(range)
    }
}

impl<T: VarWidth> StorageBuilder for VarStaging<T> {
    type Store = VarStore<T>;

    fn new(options: &BuilderOptions) -> Self {
        Self::with_order(options.byte_order, options.initial_capacity)
    }

    fn derived(source: &VarStore<T>, capacity: usize) -> Self {
        Self::with_order(source.byte_order(), capacity)
    }

    fn len(&self) -> usize {
        VarStaging::len(self)
    }

    fn reserve(&mut self, additional: usize) {
        VarStaging::reserve(self, additional)
    }

    fn push(&mut self, value: &T) -> Result<()> {
        self.push_bytes(value.as_bytes());
        Ok(())
    }

    fn push_from(&mut self, source: &VarStore<T>, index: usize) {
        self.push_bytes(source.bytes_at(index))
    }

    fn compare_last(&self, value: &T) -> Option<Ordering> {
        self.last_bytes().map(|last| last.cmp(value.as_bytes()))
    }

    fn freeze(&self) -> VarStore<T> {
        self.freeze_values()
    }
}

#[cfg(test)]
mod test {
    use bitvec::{bitvec, order::Lsb0};
    use test_log::test;

    use crate::{
        buffer::{ByteOrder, SharedBuffer},
        columnar::storage::{fixed::FixedStore, Storage, StorageBuilder},
    };

    use super::{VarStaging, VarStore};

    fn strings(values: &[&str]) -> VarStore<String> {
        let owned = values.iter().map(|value| value.to_string()).collect::<Vec<_>>();
        VarStore::from_values(&owned, ByteOrder::Big)
    }

    fn contents(store: &VarStore<String>) -> Vec<String> {
        (0..store.len()).map(|index| store.get(index)).collect()
    }

    #[test]
    fn views_keep_absolute_pointers() {
        let store = strings(&["alpha", "", "gamma", "delta"]);
        let view = store.slice(1..3);
        assert_eq!(contents(&view), vec!["", "gamma"]);
        assert!(!view.is_compact());

        let compact = view.compacted();
        assert!(compact.is_compact());
        assert_eq!(compact.pointers().values().collect::<Vec<_>>(), vec![0, 0, 5]);
        assert_eq!(compact.data().bytes(), b"gamma");
    }

    #[test]
    fn filter_copies_only_retained_bytes() {
        let store = strings(&["a", "bb", "ccc", "dddd"]);
        let keep = bitvec![u64, Lsb0; 0, 1, 0, 1];
        let filtered = store.filter_range(0..4, &keep, 2);

        assert_eq!(contents(&filtered), vec!["bb", "dddd"]);
        assert_eq!(filtered.data().bytes(), b"bbdddd");
    }

    #[test]
    fn deduplicate_sorted() {
        let store = strings(&["a", "a", "b"]);
        let distinct = store.deduplicate(0..3);
        assert_eq!(contents(&distinct), vec!["a", "b"]);
    }

    #[test]
    fn sort_and_concat() {
        let store = strings(&["pear", "apple", "fig"]);
        let sorted = store.sorted(0..3);
        assert_eq!(contents(&sorted), vec!["apple", "fig", "pear"]);

        let joined = sorted.concat(1..3, &store, 0..1).unwrap();
        assert_eq!(contents(&joined), vec!["fig", "pear", "pear"]);
    }

    #[test]
    fn invalid_parts_are_rejected() {
        let data = SharedBuffer::from_vec(b"abc".to_vec(), ByteOrder::Big);

        let decreasing = FixedStore::<i64>::from_values(&[0, 2, 1], ByteOrder::Big);
        assert!(VarStore::<Vec<u8>>::from_parts(decreasing, data.clone()).is_err());

        let too_long = FixedStore::<i64>::from_values(&[0, 4], ByteOrder::Big);
        assert!(VarStore::<Vec<u8>>::from_parts(too_long, data.clone()).is_err());

        let invalid_utf8 = SharedBuffer::from_vec(vec![0xff], ByteOrder::Big);
        let pointers = FixedStore::<i64>::from_values(&[0, 1], ByteOrder::Big);
        assert!(VarStore::<String>::from_parts(pointers.clone(), invalid_utf8.clone()).is_err());
        assert!(VarStore::<Vec<u8>>::from_parts(pointers, invalid_utf8).is_ok());
    }

    #[test]
    fn staging_snapshots_are_independent() {
        let mut staging = VarStaging::<Vec<u8>>::with_order(ByteOrder::Little, 0);
        staging.push(&vec![1, 2]).unwrap();
        let first = staging.freeze();
        staging.push(&vec![3]).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(staging.freeze().get(1), vec![3]);
        assert_eq!(staging.last_bytes(), Some(&[3u8][..]));
    }
}
