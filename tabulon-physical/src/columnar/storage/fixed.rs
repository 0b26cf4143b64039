//! This module defines [FixedStore],
//! a packed store of values that all occupy the same number of bytes.

use std::{borrow::Cow, cmp::Ordering, fmt::Debug, marker::PhantomData, ops::Range};

use crate::{
    buffer::{ByteOrder, SharedBuffer, StagingBuffer},
    columnar::builder::BuilderOptions,
    datatypes::{ElementType, FixedWidth, Primitive},
    error::{Error, Result},
    management::ByteSized,
    util::heapsort::{heap_sort, HeapSortable},
};

use super::{Storage, StorageBuilder};

/// Store where value `i` occupies bytes `i * WIDTH .. (i + 1) * WIDTH` of one buffer.
#[derive(Debug, Clone)]
pub struct FixedStore<T> {
    buffer: SharedBuffer,
    _marker: PhantomData<T>,
}

impl<T: FixedWidth> FixedStore<T> {
    /// Interpret the bytes of `buffer` as values of type `T`.
    pub fn from_buffer(buffer: SharedBuffer) -> Result<Self> {
        if buffer.len() % T::WIDTH != 0 {
            return Err(Error::invalid_argument(format!(
                "buffer of {} bytes does not hold values of width {}",
                buffer.len(),
                T::WIDTH
            )));
        }

        Ok(Self {
            buffer,
            _marker: PhantomData,
        })
    }

    /// Create a store holding the given values.
    pub fn from_values(values: &[T], order: ByteOrder) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * T::WIDTH);
        for &value in values {
            value.encode(&mut bytes, order);
        }

        Self {
            buffer: SharedBuffer::from_vec(bytes, order),
            _marker: PhantomData,
        }
    }

    /// Create a store without content.
    pub fn empty(order: ByteOrder) -> Self {
        Self {
            buffer: SharedBuffer::empty(order),
            _marker: PhantomData,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.buffer.len() / T::WIDTH
    }

    /// Return `true` if this store contains no values.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// Byte order of the values.
    pub fn order(&self) -> ByteOrder {
        self.buffer.order()
    }

    /// The encoded bytes of the value at `index`.
    pub(crate) fn raw(&self, index: usize) -> &[u8] {
        &self.buffer.bytes()[index * T::WIDTH..(index + 1) * T::WIDTH]
    }

    /// Return the value at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn value(&self, index: usize) -> T {
        T::decode(self.raw(index), self.order())
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.buffer
            .bytes()
            .chunks_exact(T::WIDTH)
            .map(|chunk| T::decode(chunk, self.order()))
    }

    /// View of the values in `range` without copying.
    pub fn view(&self, range: Range<usize>) -> Self {
        Self {
            buffer: self.buffer.slice(range.start * T::WIDTH..range.end * T::WIDTH),
            _marker: PhantomData,
        }
    }

    /// Copy the values in `range` into a fresh buffer.
    pub fn copy_values(&self, range: Range<usize>) -> Self {
        let bytes = self.buffer.bytes()[range.start * T::WIDTH..range.end * T::WIDTH].to_vec();
        Self {
            buffer: SharedBuffer::from_vec(bytes, self.order()),
            _marker: PhantomData,
        }
    }

    /// All bytes of this store, encoded in the given order.
    ///
    /// Borrows the buffer if it already uses that order.
    pub fn encoded(&self, order: ByteOrder) -> Cow<'_, [u8]> {
        if order == self.order() || T::WIDTH == 1 {
            return Cow::Borrowed(self.buffer.bytes());
        }

        let mut bytes = Vec::with_capacity(self.buffer.len());
        for value in self.values() {
            value.encode(&mut bytes, order);
        }
        Cow::Owned(bytes)
    }

    /// Copy the values in `range` and sort them with an in-place heap sort.
    pub(crate) fn sort_values(&self, range: Range<usize>) -> Self {
        let mut scratch = FixedScratch::<T> {
            bytes: self.buffer.bytes()[range.start * T::WIDTH..range.end * T::WIDTH].to_vec(),
            order: self.order(),
            _marker: PhantomData,
        };
        let len = range.len();
        heap_sort(&mut scratch, 0..len);

        log::trace!("sorted {len} values of width {}", T::WIDTH);

        Self {
            buffer: SharedBuffer::from_vec(scratch.bytes, self.order()),
            _marker: PhantomData,
        }
    }

    pub(crate) fn is_heap(&self) -> bool {
        self.buffer.is_heap()
    }

    pub(crate) fn to_heap(&self) -> Self {
        if self.is_heap() {
            return self.clone();
        }

        log::trace!("copying {} mapped bytes to the heap", self.buffer.len());
        Self {
            buffer: self.buffer.to_heap(),
            _marker: PhantomData,
        }
    }
}

impl<T> ByteSized for FixedStore<T> {
    fn size_bytes(&self) -> u64 {
        self.buffer.size_bytes()
    }
}

/// Owned copy of fixed-width values that [heap_sort] can reorder by swapping byte chunks.
struct FixedScratch<T> {
    bytes: Vec<u8>,
    order: ByteOrder,
    _marker: PhantomData<T>,
}

impl<T: FixedWidth> FixedScratch<T> {
    fn value(&self, index: usize) -> T {
        T::decode(&self.bytes[index * T::WIDTH..], self.order)
    }
}

impl<T: FixedWidth> HeapSortable for FixedScratch<T> {
    fn compare_at(&self, i: usize, j: usize) -> Ordering {
        self.value(i).compare(&self.value(j))
    }

    fn swap(&mut self, i: usize, j: usize) {
        swap_chunks(&mut self.bytes, T::WIDTH, i, j);
    }
}

/// Exchange the `width`-byte chunks at positions `i` and `j`.
pub(super) fn swap_chunks(bytes: &mut [u8], width: usize, i: usize, j: usize) {
    if i == j {
        return;
    }
    let (low, high) = (i.min(j), i.max(j));
    let (head, tail) = bytes.split_at_mut(high * width);
    head[low * width..(low + 1) * width].swap_with_slice(&mut tail[..width]);
}

/// Builder for a [FixedStore].
#[derive(Debug, Clone)]
pub struct FixedStaging<T> {
    buffer: StagingBuffer,
    _marker: PhantomData<T>,
}

impl<T: FixedWidth> FixedStaging<T> {
    /// Create an empty builder writing values in the given order.
    pub fn with_order(order: ByteOrder, capacity: usize) -> Self {
        let mut buffer = StagingBuffer::new(order);
        buffer.reserve(capacity * T::WIDTH);

        Self {
            buffer,
            _marker: PhantomData,
        }
    }

    /// Number of values pushed so far.
    pub fn len(&self) -> usize {
        self.buffer.len() / T::WIDTH
    }

    /// Return `true` if no value has been pushed.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Byte order used for writing.
    pub fn order(&self) -> ByteOrder {
        self.buffer.order()
    }

    /// Make room for `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.buffer.reserve(additional.saturating_mul(T::WIDTH));
    }

    /// Append a value.
    pub fn push_value(&mut self, value: T) {
        let order = self.order();
        value.encode(self.buffer.writable(T::WIDTH), order);
    }

    /// Append the value at `index` of `source`.
    pub fn push_value_from(&mut self, source: &FixedStore<T>, index: usize) {
        if source.order() == self.order() {
            self.buffer.extend_from_slice(source.raw(index));
        } else {
            self.push_value(source.value(index));
        }
    }

    /// The value pushed at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn value_at(&self, index: usize) -> T {
        T::decode(
            &self.buffer.bytes()[index * T::WIDTH..(index + 1) * T::WIDTH],
            self.order(),
        )
    }

    /// The last pushed value.
    pub fn last_value(&self) -> Option<T> {
        let len = self.buffer.len();
        (len >= T::WIDTH).then(|| T::decode(&self.buffer.bytes()[len - T::WIDTH..], self.order()))
    }

    /// Store containing the values pushed so far.
    pub fn freeze_values(&self) -> FixedStore<T> {
        FixedStore {
            buffer: self.buffer.freeze(),
            _marker: PhantomData,
        }
    }
}

impl<T: Primitive> Storage for FixedStore<T> {
    type Item = T;
    type Staging = FixedStaging<T>;

    const ELEMENT_TYPE: ElementType = T::ELEMENT_TYPE;

    fn empty(order: ByteOrder) -> Self {
        FixedStore::empty(order)
    }

    fn len(&self) -> usize {
        FixedStore::len(self)
    }

    fn byte_order(&self) -> ByteOrder {
        self.order()
    }

    fn get(&self, index: usize) -> T {
        self.value(index)
    }

    fn compare_values(left: &T, right: &T) -> Ordering {
        left.compare(right)
    }

    fn compare_at(&self, i: usize, j: usize) -> Ordering {
        self.value(i).compare(&self.value(j))
    }

    fn compare_to(&self, index: usize, value: &T) -> Ordering {
        self.value(index).compare(value)
    }

    fn slice(&self, range: Range<usize>) -> Self {
        self.view(range)
    }

    fn is_heap(&self) -> bool {
        FixedStore::is_heap(self)
    }

    fn to_heap(&self) -> Self {
        FixedStore::to_heap(self)
    }

    fn copy_range(&self, range: Range<usize>) -> Self {
        self.copy_values(range)
    }

    fn sorted(&self, range: Range<usize>) -> Self {
        self.sort_values(range)
    }
}

impl<T: Primitive> StorageBuilder for FixedStaging<T> {
    type Store = FixedStore<T>;

    fn new(options: &BuilderOptions) -> Self {
        Self::with_order(options.byte_order, options.initial_capacity)
    }

    fn derived(source: &FixedStore<T>, capacity: usize) -> Self {
        Self::with_order(source.order(), capacity)
    }

    fn len(&self) -> usize {
        FixedStaging::len(self)
    }

    fn reserve(&mut self, additional: usize) {
        FixedStaging::reserve(self, additional)
    }

    fn push(&mut self, value: &T) -> Result<()> {
        self.push_value(*value);
        Ok(())
    }

    fn push_from(&mut self, source: &FixedStore<T>, index: usize) {
        self.push_value_from(source, index)
    }

    fn compare_last(&self, value: &T) -> Option<Ordering> {
        self.last_value().map(|last| last.compare(value))
    }

    fn freeze(&self) -> FixedStore<T> {
        self.freeze_values()
    }
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use bitvec::{bitvec, order::Lsb0};
    use quickcheck_macros::quickcheck;
    use test_log::test;

    use crate::{
        buffer::{ByteOrder, SharedBuffer},
        columnar::storage::{Storage, StorageBuilder},
    };

    use super::{swap_chunks, FixedStaging, FixedStore};

    #[test]
    fn decode_honors_byte_order() {
        let big = FixedStore::<i32>::from_buffer(SharedBuffer::from_vec(
            vec![0, 0, 1, 0, 0, 0, 0, 7],
            ByteOrder::Big,
        ))
        .unwrap();
        assert_eq!(big.len(), 2);
        assert_eq!(big.get(0), 256);
        assert_eq!(big.get(1), 7);

        let little = FixedStore::<i16>::from_values(&[1, -2], ByteOrder::Little);
        assert_eq!(little.buffer().bytes(), &[1, 0, 0xfe, 0xff]);
        assert_eq!(little.encoded(ByteOrder::Big).as_ref(), &[0, 1, 0xff, 0xfe]);
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        let buffer = SharedBuffer::from_vec(vec![0; 7], ByteOrder::Big);
        assert!(FixedStore::<i64>::from_buffer(buffer).is_err());
    }

    #[test]
    fn views_share_and_copies_detach() {
        let store = FixedStore::<i64>::from_values(&[5, 6, 7, 8], ByteOrder::Big);
        let view = store.slice(1..3);
        assert_eq!(view.values().collect::<Vec<_>>(), vec![6, 7]);

        let copy = store.copy_range(2..4);
        assert_eq!(copy.values().collect::<Vec<_>>(), vec![7, 8]);
        assert_eq!(copy.buffer().len(), 16);
    }

    #[test]
    fn filter_and_gather() {
        let store = FixedStore::<i32>::from_values(&[10, 11, 12, 13, 14], ByteOrder::Big);

        let keep = bitvec![u64, Lsb0; 1, 0, 1];
        let filtered = store.filter_range(1..4, &keep, 2);
        assert_eq!(filtered.values().collect::<Vec<_>>(), vec![11, 13]);

        let gathered = store.gather(&[4, 0, 4]);
        assert_eq!(gathered.values().collect::<Vec<_>>(), vec![14, 10, 14]);
    }

    #[test]
    fn concat_reencodes_mismatching_order() {
        let big = FixedStore::<i32>::from_values(&[1, 2], ByteOrder::Big);
        let little = FixedStore::<i32>::from_values(&[3, 4], ByteOrder::Little);

        let joined = big.concat(0..2, &little, 0..2).unwrap();
        assert_eq!(joined.order(), ByteOrder::Big);
        assert_eq!(joined.values().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn sort_and_deduplicate() {
        let store =
            FixedStore::<f64>::from_values(&[3.5, -1.0, 3.5, 0.0, -1.0], ByteOrder::Little);
        let sorted = store.sorted(0..5);
        assert_eq!(
            sorted.values().collect::<Vec<_>>(),
            vec![-1.0, -1.0, 0.0, 3.5, 3.5]
        );

        let distinct = sorted.deduplicate(0..5);
        assert_eq!(distinct.values().collect::<Vec<_>>(), vec![-1.0, 0.0, 3.5]);
    }

    #[test]
    fn staging_compares_last_value() {
        let store = FixedStore::<i8>::empty(ByteOrder::Big);
        let mut staging = FixedStaging::<i8>::derived(&store, 0);
        assert_eq!(staging.compare_last(&1), None);

        staging.push(&4).unwrap();
        assert_eq!(staging.compare_last(&4), Some(Ordering::Equal));
        assert_eq!(staging.compare_last(&9), Some(Ordering::Less));

        let first = staging.freeze();
        staging.push(&5).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(staging.freeze().len(), 2);
    }

    #[test]
    fn chunks_are_swapped() {
        let mut bytes = vec![1, 2, 3, 4, 5, 6];
        swap_chunks(&mut bytes, 2, 2, 0);
        assert_eq!(bytes, vec![5, 6, 3, 4, 1, 2]);
        swap_chunks(&mut bytes, 2, 1, 1);
        assert_eq!(bytes, vec![5, 6, 3, 4, 1, 2]);
    }

    #[quickcheck]
    fn heap_sort_matches_std(values: Vec<i32>) -> bool {
        let store = FixedStore::<i32>::from_values(&values, ByteOrder::Little);
        let mut expected = values.clone();
        expected.sort();
        store.sorted(0..values.len()).values().collect::<Vec<_>>() == expected
    }
}
