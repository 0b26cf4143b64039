//! This module defines the trait [ByteSized],
//! reporting how much memory a column and its parts hold.

use std::{mem::size_of, sync::Arc};

use crate::bitmap::Bitmap;

/// Objects that are able calculate their current approximate size in bytes.
///
/// Shared parts, such as a buffer referenced by several columns,
/// are counted once for every object referring to them.
/// Sizes are `u64` so that summing overestimations cannot overflow.
pub trait ByteSized {
    /// Return the number of bytes this object consumes
    fn size_bytes(&self) -> u64;
}

impl<T: ByteSized> ByteSized for Arc<T> {
    fn size_bytes(&self) -> u64 {
        size_of::<Self>() as u64 + T::size_bytes(self)
    }
}

impl ByteSized for Bitmap {
    fn size_bytes(&self) -> u64 {
        size_of::<Self>() as u64 + (self.capacity().div_ceil(u64::BITS as usize) * 8) as u64
    }
}

/// Bytes reserved by the hash table of a lookup map, counting keys and values by their
/// direct size only.
///
/// Control bytes and empty buckets are not visible, so this relies on the reported capacity.
pub(crate) fn size_inner_hashmap_flat<K, V>(object: &hashbrown::HashMap<K, V>) -> u64 {
    object.capacity() as u64 * size_of::<(K, V)>() as u64
}

/// Bytes reserved by a vector, counting its elements by their direct size only.
pub(crate) fn size_inner_vec_flat<T>(object: &Vec<T>) -> u64 {
    object.capacity() as u64 * size_of::<T>() as u64
}
