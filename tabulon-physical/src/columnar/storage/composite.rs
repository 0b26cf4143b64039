//! This module defines [CompositeStore],
//! which stores each value as two aligned fixed-width components.

use std::{cmp::Ordering, ops::Range};

use crate::{
    buffer::ByteOrder,
    columnar::builder::BuilderOptions,
    datatypes::{Composite, ElementType, FixedWidth},
    error::{Error, Result},
    management::ByteSized,
    util::heapsort::{heap_sort, HeapSortable},
};

use super::{
    fixed::{swap_chunks, FixedStaging, FixedStore},
    Storage, StorageBuilder,
};

/// Store of [Composite] values, split into two index aligned [FixedStore]s.
#[derive(Debug, Clone)]
pub struct CompositeStore<T: Composite> {
    first: FixedStore<T::First>,
    second: FixedStore<T::Second>,
}

impl<T: Composite> CompositeStore<T> {
    /// Combine two component stores of equal length.
    pub fn from_parts(first: FixedStore<T::First>, second: FixedStore<T::Second>) -> Result<Self> {
        if first.len() != second.len() {
            return Err(Error::invalid_argument(format!(
                "components of {} have different lengths {} and {}",
                T::ELEMENT_TYPE,
                first.len(),
                second.len()
            )));
        }

        Ok(Self { first, second })
    }

    /// Create a store holding the given values.
    pub fn from_values(values: &[T], order: ByteOrder) -> Self {
        let mut staging = CompositeStaging::<T>::with_order(order, values.len());
        for &value in values {
            staging.push_value(value);
        }
        staging.freeze_values()
    }

    /// Store of the first components.
    pub fn first(&self) -> &FixedStore<T::First> {
        &self.first
    }

    /// Store of the second components.
    pub fn second(&self) -> &FixedStore<T::Second> {
        &self.second
    }

    fn value(&self, index: usize) -> T {
        T::join(self.first.value(index), self.second.value(index))
    }
}

impl<T: Composite> ByteSized for CompositeStore<T> {
    fn size_bytes(&self) -> u64 {
        self.first.size_bytes() + self.second.size_bytes()
    }
}

/// Owned copies of both components that [heap_sort] can reorder in lockstep.
struct CompositeScratch<T: Composite> {
    first: Vec<u8>,
    second: Vec<u8>,
    order: ByteOrder,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Composite> CompositeScratch<T> {
    fn value(&self, index: usize) -> T {
        let first = T::First::decode(&self.first[index * T::First::WIDTH..], self.order);
        let second = T::Second::decode(&self.second[index * T::Second::WIDTH..], self.order);
        T::join(first, second)
    }
}

impl<T: Composite> HeapSortable for CompositeScratch<T> {
    fn compare_at(&self, i: usize, j: usize) -> Ordering {
        self.value(i).compare(&self.value(j))
    }

    fn swap(&mut self, i: usize, j: usize) {
        swap_chunks(&mut self.first, T::First::WIDTH, i, j);
        swap_chunks(&mut self.second, T::Second::WIDTH, i, j);
    }
}

/// Builder for a [CompositeStore].
#[derive(Debug, Clone)]
pub struct CompositeStaging<T: Composite> {
    first: FixedStaging<T::First>,
    second: FixedStaging<T::Second>,
}

impl<T: Composite> CompositeStaging<T> {
    /// Create an empty builder writing both components in the given order.
    pub fn with_order(order: ByteOrder, capacity: usize) -> Self {
        Self {
            first: FixedStaging::with_order(order, capacity),
            second: FixedStaging::with_order(order, capacity),
        }
    }

    /// Append a value.
    pub fn push_value(&mut self, value: T) {
        let (first, second) = value.split();
        self.first.push_value(first);
        self.second.push_value(second);
    }

    /// Store containing the values pushed so far.
    pub fn freeze_values(&self) -> CompositeStore<T> {
        CompositeStore {
            first: self.first.freeze_values(),
            second: self.second.freeze_values(),
        }
    }
}

impl<T: Composite> Storage for CompositeStore<T> {
    type Item = T;
    type Staging = CompositeStaging<T>;

    const ELEMENT_TYPE: ElementType = T::ELEMENT_TYPE;

    fn empty(order: ByteOrder) -> Self {
        Self {
            first: FixedStore::empty(order),
            second: FixedStore::empty(order),
        }
    }

    fn len(&self) -> usize {
        self.first.len()
    }

    fn byte_order(&self) -> ByteOrder {
        self.first.order()
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
        Self {
            first: self.first.view(range.clone()),
            second: self.second.view(range),
        }
    }

    fn is_heap(&self) -> bool {
        self.first.is_heap() && self.second.is_heap()
    }

    fn to_heap(&self) -> Self {
        Self {
            first: self.first.to_heap(),
            second: self.second.to_heap(),
        }
    }

    fn copy_range(&self, range: Range<usize>) -> Self {
        Self {
            first: self.first.copy_values(range.clone()),
            second: self.second.copy_values(range),
        }
    }

    fn sorted(&self, range: Range<usize>) -> Self {
        let order = self.byte_order();
        let mut scratch = CompositeScratch::<T> {
            first: self.first.encoded(order)
                [range.start * T::First::WIDTH..range.end * T::First::WIDTH]
                .to_vec(),
            second: self.second.encoded(order)
                [range.start * T::Second::WIDTH..range.end * T::Second::WIDTH]
                .to_vec(),
            order,
            _marker: std::marker::PhantomData,
        };
        heap_sort(&mut scratch, 0..range.len());

        let mut staging = CompositeStaging::with_order(order, range.len());
        for index in 0..range.len() {
            staging.push_value(scratch.value(index));
        }
        staging.freeze_values()
    }
}

impl<T: Composite> StorageBuilder for CompositeStaging<T> {
    type Store = CompositeStore<T>;

    fn new(options: &BuilderOptions) -> Self {
        Self::with_order(options.byte_order, options.initial_capacity)
    }

    fn derived(source: &CompositeStore<T>, capacity: usize) -> Self {
        Self::with_order(source.byte_order(), capacity)
    }

    fn len(&self) -> usize {
        self.first.len()
    }

    fn reserve(&mut self, additional: usize) {
        self.first.reserve(additional);
        self.second.reserve(additional);
    }

    fn push(&mut self, value: &T) -> Result<()> {
        self.push_value(*value);
        Ok(())
    }

    fn push_from(&mut self, source: &CompositeStore<T>, index: usize) {
        self.first.push_value_from(&source.first, index);
        self.second.push_value_from(&source.second, index);
    }

    fn compare_last(&self, value: &T) -> Option<Ordering> {
        let first = self.first.last_value()?;
        let second = self.second.last_value()?;
        Some(T::join(first, second).compare(value))
    }

    fn freeze(&self) -> CompositeStore<T> {
        self.freeze_values()
    }
}
