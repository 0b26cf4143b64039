//! This module defines the byte buffers that back every column.
//!
//! A [SharedBuffer] is an immutable window into heap memory or into a memory
//! mapped file. Cloning and slicing never copy the underlying bytes, so any
//! number of column views can alias the same backing store. Builders write
//! into a [StagingBuffer], which hands out [SharedBuffer]s of its current
//! prefix and copies itself on the next write if such a snapshot is still alive.

use std::{fmt::Debug, ops::Range, sync::Arc};

use memmap2::Mmap;

use crate::{management::ByteSized, util::growth::grow_capacity};

/// Order in which the bytes of multi-byte values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most significant byte first
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

impl ByteOrder {
    /// Byte order of the machine this code runs on.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Marker byte used in the binary format.
    pub fn marker(self) -> u8 {
        match self {
            ByteOrder::Big => b'B',
            ByteOrder::Little => b'L',
        }
    }

    /// Decode a marker byte of the binary format.
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'B' => Some(ByteOrder::Big),
            b'L' => Some(ByteOrder::Little),
            _ => None,
        }
    }
}

/// Storage that keeps the bytes of a [SharedBuffer] alive.
#[derive(Clone)]
enum Backing {
    Heap(Arc<Vec<u8>>),
    Mapped(Arc<Mmap>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Heap(data) => data.as_slice(),
            Backing::Mapped(map) => &map[..],
        }
    }
}

/// Immutable, cheaply clonable window of bytes with an associated [ByteOrder].
#[derive(Clone)]
pub struct SharedBuffer {
    backing: Backing,
    range: Range<usize>,
    order: ByteOrder,
}

impl SharedBuffer {
    /// Create a buffer owning the given bytes.
    pub fn from_vec(data: Vec<u8>, order: ByteOrder) -> Self {
        let range = 0..data.len();
        Self {
            backing: Backing::Heap(Arc::new(data)),
            range,
            order,
        }
    }

    /// Create a buffer without content.
    pub fn empty(order: ByteOrder) -> Self {
        Self::from_vec(Vec::new(), order)
    }

    /// Create a buffer that views `range` of a memory mapped file.
    ///
    /// # Panics
    /// Panics if `range` exceeds the mapping.
    pub fn mapped(map: Arc<Mmap>, range: Range<usize>, order: ByteOrder) -> Self {
        assert!(
            range.start <= range.end && range.end <= map.len(),
            "mapped range exceeds the file"
        );

        Self {
            backing: Backing::Mapped(map),
            range,
            order,
        }
    }

    pub(crate) fn from_shared(data: Arc<Vec<u8>>, range: Range<usize>, order: ByteOrder) -> Self {
        debug_assert!(range.end <= data.len());

        Self {
            backing: Backing::Heap(data),
            range,
            order,
        }
    }

    /// Number of bytes in this buffer.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Return `true` if this buffer contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Byte order of the values in this buffer.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// The bytes of this buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.backing.bytes()[self.range.clone()]
    }

    /// Return a view of the bytes in `range` (relative to this buffer) without copying.
    ///
    /// # Panics
    /// Panics if `range` is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Self {
        assert!(
            range.start <= range.end && range.end <= self.len(),
            "slice {range:?} out of bounds for buffer of length {}",
            self.len()
        );

        Self {
            backing: self.backing.clone(),
            range: self.range.start + range.start..self.range.start + range.end,
            order: self.order,
        }
    }

    /// Return `true` if the bytes live on the heap rather than in a memory mapped file.
    pub fn is_heap(&self) -> bool {
        matches!(self.backing, Backing::Heap(_))
    }

    /// Copy the bytes of this buffer into a fresh heap allocation.
    pub fn to_heap(&self) -> Self {
        Self::from_vec(self.bytes().to_vec(), self.order)
    }
}

impl Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .field("order", &self.order)
            .field("heap", &self.is_heap())
            .finish()
    }
}

impl ByteSized for SharedBuffer {
    fn size_bytes(&self) -> u64 {
        // Only the viewed part is attributed to this buffer
        size_of::<Self>() as u64 + self.len() as u64
    }
}

/// Growable byte buffer used by builders.
///
/// [StagingBuffer::freeze] returns a [SharedBuffer] over the bytes written so far.
/// Later writes leave frozen buffers untouched.
#[derive(Debug, Clone)]
pub struct StagingBuffer {
    data: Arc<Vec<u8>>,
    order: ByteOrder,
}

impl StagingBuffer {
    /// Create an empty buffer writing values in the given [ByteOrder].
    pub fn new(order: ByteOrder) -> Self {
        Self {
            data: Arc::new(Vec::new()),
            order,
        }
    }

    /// Byte order used when writing values.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes that can be held without reallocating.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// The bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Make sure that at least `additional` more bytes fit without reallocating.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.len().saturating_add(additional);
        let data = Arc::make_mut(&mut self.data);
        if required > data.capacity() {
            let new_capacity = grow_capacity(data.capacity(), required);
            log::trace!(
                "growing staging buffer from {} to {new_capacity} bytes",
                data.capacity()
            );
            data.reserve_exact(new_capacity - data.len());
        }
    }

    /// Return the underlying vector for appending `additional` bytes.
    ///
    /// Copies the content first if a frozen snapshot still refers to it.
    pub(crate) fn writable(&mut self, additional: usize) -> &mut Vec<u8> {
        self.reserve(additional);
        Arc::make_mut(&mut self.data)
    }

    /// Append raw bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.writable(bytes.len()).extend_from_slice(bytes);
    }

    /// Snapshot of the bytes written so far.
    pub fn freeze(&self) -> SharedBuffer {
        SharedBuffer::from_shared(self.data.clone(), 0..self.data.len(), self.order)
    }
}

#[cfg(test)]
mod test {
    use super::{ByteOrder, SharedBuffer, StagingBuffer};

    #[test]
    fn markers() {
        assert_eq!(ByteOrder::from_marker(b'B'), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_marker(b'L'), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::from_marker(b'X'), None);
        assert_eq!(ByteOrder::Little.marker(), b'L');
    }

    #[test]
    fn slices_share_bytes() {
        let buffer = SharedBuffer::from_vec(vec![1, 2, 3, 4, 5], ByteOrder::Big);
        let slice = buffer.slice(1..4);
        assert_eq!(slice.bytes(), &[2, 3, 4]);

        let nested = slice.slice(1..3);
        assert_eq!(nested.bytes(), &[3, 4]);
        assert!(nested.is_heap());
    }

    #[test]
    #[should_panic]
    fn slice_out_of_bounds() {
        let buffer = SharedBuffer::from_vec(vec![1, 2, 3], ByteOrder::Big);
        let _ = buffer.slice(2..5);
    }

    #[test]
    fn frozen_snapshot_is_not_affected_by_later_writes() {
        let mut staging = StagingBuffer::new(ByteOrder::Little);
        staging.extend_from_slice(&[1, 2]);
        let first = staging.freeze();

        staging.extend_from_slice(&[3]);
        let second = staging.freeze();

        assert_eq!(first.bytes(), &[1, 2]);
        assert_eq!(second.bytes(), &[1, 2, 3]);
        assert_eq!(second.order(), ByteOrder::Little);
    }

    #[test]
    fn reserve_grows_geometrically() {
        let mut staging = StagingBuffer::new(ByteOrder::Big);
        staging.reserve(10);
        assert!(staging.capacity() >= 10);

        staging.extend_from_slice(&[0; 10]);
        staging.reserve(1);
        assert!(staging.capacity() >= 16);
    }
}
