//! This module defines [Column],
//! an immutable window into a shared store of values of one element type.

use std::{cmp::Ordering, fmt::Debug, mem::size_of, ops::Range};

use itertools::Itertools;

use crate::{
    bitmap::{self, Bitmap, BitmapSlice},
    buffer::ByteOrder,
    datatypes::{ElementType, Id128, Instant},
    error::{Error, Result},
    management::ByteSized,
};

use super::{
    builder::{Builder, BuilderOptions, ColumnBuilder},
    characteristics::Characteristics,
    nulls::{NullMap, NullableStore},
    storage::{CompositeStore, DictStore, FixedStore, Storage, VarStore},
};

/// Column of [bool] values
pub type BooleanColumn = Column<FixedStore<bool>>;
/// Column of [i8] values
pub type ByteColumn = Column<FixedStore<i8>>;
/// Column of [i16] values
pub type ShortColumn = Column<FixedStore<i16>>;
/// Column of [i32] values
pub type IntColumn = Column<FixedStore<i32>>;
/// Column of [i64] values
pub type LongColumn = Column<FixedStore<i64>>;
/// Column of [f32] values
pub type FloatColumn = Column<FixedStore<f32>>;
/// Column of [f64] values
pub type DoubleColumn = Column<FixedStore<f64>>;
/// Column of UTF-8 strings
pub type StringColumn = Column<VarStore<String>>;
/// Column of byte arrays
pub type BytesColumn = Column<VarStore<Vec<u8>>>;
/// Column of dictionary encoded strings
pub type DictStringColumn = Column<DictStore>;
/// Column of [Id128] values
pub type Id128Column = Column<CompositeStore<Id128>>;
/// Column of [Instant] values
pub type InstantColumn = Column<CompositeStore<Instant>>;

/// Physical representation of a column.
///
/// A nullable representation is only used if the viewed positions contain a null.
#[derive(Debug, Clone)]
enum Repr<S: Storage> {
    NonNull(S),
    Nullable(NullableStore<S>),
}

/// Immutable sequence of values of one element type, some of which may be null.
///
/// A column is a window `offset..offset + len` into a shared store.
/// Cloning and narrowing a column never copies values.
#[derive(Clone)]
pub struct Column<S: Storage> {
    repr: Repr<S>,
    /// First position of the store (or of the null bitmap) that is part of this column
    offset: usize,
    size: usize,
    characteristics: Characteristics,
}

impl<S: Storage> Column<S> {
    /// Create a column containing all values of `store`.
    pub fn from_store(store: S) -> Self {
        Self {
            size: store.len(),
            repr: Repr::NonNull(store),
            offset: 0,
            characteristics: Characteristics::nonnull(),
        }
    }

    /// Create a column from packed non-null values and a bitmap marking the nulls.
    ///
    /// Returns an error if the number of unset bits differs from the number of values.
    pub fn from_nullable(values: S, nulls: Bitmap) -> Result<Self> {
        Self::from_nullable_ordered(values, nulls, Characteristics::nonnull())
    }

    /// Like [Column::from_nullable], where the packed values are known to satisfy `packed`.
    pub(crate) fn from_nullable_ordered(
        values: S,
        nulls: Bitmap,
        packed: Characteristics,
    ) -> Result<Self> {
        let null_count = bitmap::cardinality(&nulls);
        if values.len() + null_count != nulls.len() {
            return Err(Error::invalid_argument(format!(
                "{} values and {null_count} nulls do not fill {} positions",
                values.len(),
                nulls.len()
            )));
        }

        if null_count == 0 {
            return Ok(Self::from_store(values).with_declared(packed));
        }

        Ok(Self {
            size: nulls.len(),
            repr: Repr::Nullable(NullableStore::new(values, NullMap::new(nulls), packed)),
            offset: 0,
            characteristics: Characteristics::none(),
        })
    }

    /// Create a column without entries.
    pub fn empty() -> Self {
        Self::empty_with_order(ByteOrder::default())
    }

    fn empty_with_order(order: ByteOrder) -> Self {
        Self::from_store(S::empty(order)).with_declared(Characteristics::distinct())
    }

    fn empty_like(&self) -> Self {
        Self::empty_with_order(self.values().byte_order())
    }

    /// Create a column from non-null values, checking the given guarantees on the fly.
    pub fn from_values<I>(values: I, characteristics: Characteristics) -> Result<Self>
    where
        I: IntoIterator<Item = S::Item>,
    {
        let mut builder = Builder::<S>::with_characteristics(characteristics);
        builder.add_all(values)?;
        builder.build()
    }

    /// Create a column from values and nulls.
    pub fn from_options<I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<S::Item>>,
    {
        let mut builder = Builder::<S>::new(BuilderOptions::default());
        builder.add_all_options(values)?;
        builder.build()
    }

    /// Add guarantees that have already been established.
    pub(crate) fn with_declared(mut self, characteristics: Characteristics) -> Self {
        if matches!(self.repr, Repr::NonNull(_)) {
            self.characteristics = characteristics.with_nonnull();

            #[cfg(feature = "check_column_sorting")]
            debug_assert!(
                self.verify_characteristics().is_ok(),
                "column does not satisfy {characteristics}"
            );
        }
        self
    }

    /// Return this column declaring the given guarantees, after checking them.
    ///
    /// A column without nulls is always NONNULL, a column with nulls accepts
    /// no guarantees.
    pub fn with_characteristics(self, characteristics: Characteristics) -> Result<Self> {
        if characteristics != Characteristics::none() && self.is_nullable() {
            return Err(Error::invalid_argument(format!(
                "column with {} nulls cannot be declared {characteristics}",
                self.null_count()
            )));
        }

        let column = match self.repr {
            Repr::NonNull(_) => Self {
                characteristics: characteristics.with_nonnull(),
                ..self
            },
            Repr::Nullable(_) => self,
        };
        column.verify_characteristics()?;

        Ok(column)
    }

    /// Number of entries, including nulls.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Return `true` if this column has no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Position of the first entry of this column in its backing store.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Guarantees of this column.
    pub fn characteristics(&self) -> Characteristics {
        self.characteristics
    }

    /// Element type of this column.
    pub fn element_type(&self) -> ElementType {
        S::ELEMENT_TYPE
    }

    /// Return `true` if this column contains at least one null.
    pub fn is_nullable(&self) -> bool {
        matches!(self.repr, Repr::Nullable(_))
    }

    /// Number of nulls in this column.
    pub fn null_count(&self) -> usize {
        match &self.repr {
            Repr::NonNull(_) => 0,
            Repr::Nullable(nullable) => nullable
                .nulls
                .null_count(self.offset, self.offset + self.size),
        }
    }

    /// Return `true` if every entry is null. This holds for empty columns.
    pub fn is_all_null(&self) -> bool {
        self.null_count() == self.size
    }

    /// The store holding the non-null values.
    pub(crate) fn values(&self) -> &S {
        match &self.repr {
            Repr::NonNull(store) => store,
            Repr::Nullable(nullable) => &nullable.values,
        }
    }

    /// Ordering guarantees of the non-null values, ignoring nulls.
    pub(crate) fn packed_characteristics(&self) -> Characteristics {
        match &self.repr {
            Repr::NonNull(_) => self.characteristics,
            Repr::Nullable(nullable) => nullable.packed,
        }
    }

    /// Positions of [Column::values] that hold the non-null values of this column.
    pub(crate) fn physical_range(&self) -> Range<usize> {
        match &self.repr {
            Repr::NonNull(_) => self.offset..self.offset + self.size,
            Repr::Nullable(nullable) => {
                nullable.nulls.non_null_index(self.offset)
                    ..nullable.nulls.non_null_index(self.offset + self.size)
            }
        }
    }

    /// Position in [Column::values] of the entry at `index`, or `None` if it is null.
    pub(crate) fn physical_position(&self, index: usize) -> Option<usize> {
        let position = self.offset + index;
        match &self.repr {
            Repr::NonNull(_) => Some(position),
            Repr::Nullable(nullable) => (!nullable.nulls.is_null(position))
                .then(|| nullable.nulls.non_null_index(position)),
        }
    }

    /// Entry of this column at the given physical position, if it is part of this column.
    pub(crate) fn logical_position(&self, physical: usize) -> Option<usize> {
        let logical = match &self.repr {
            Repr::NonNull(_) => physical,
            Repr::Nullable(nullable) => nullable.nulls.null_index(physical)?,
        };
        (self.offset..self.offset + self.size)
            .contains(&logical)
            .then(|| logical - self.offset)
    }

    /// Physical positions of all entries, `None` for nulls.
    pub(crate) fn positions(&self) -> Positions<'_> {
        let logical = self.offset..self.offset + self.size;
        match &self.repr {
            Repr::NonNull(_) => Positions {
                nulls: None,
                physical: self.offset,
                logical,
            },
            Repr::Nullable(nullable) => Positions {
                nulls: Some(nullable.nulls.bits()),
                physical: nullable.nulls.non_null_index(self.offset),
                logical,
            },
        }
    }

    /// Null markers of the entries of this column.
    pub(crate) fn null_bits(&self) -> Bitmap {
        match &self.repr {
            Repr::NonNull(_) => bitmap::zeroed(self.size),
            Repr::Nullable(nullable) => {
                nullable.nulls.bits()[self.offset..self.offset + self.size].to_bitvec()
            }
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.size {
            return Err(Error::invalid_argument(format!(
                "index {index} out of bounds for column of length {}",
                self.size
            )));
        }
        Ok(())
    }

    /// Return `true` if the entry at `index` is null.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn is_null(&self, index: usize) -> bool {
        assert!(index < self.size, "index {index} out of bounds");
        self.physical_position(index).is_none()
    }

    /// Return the entry at `index`, or `None` if it is null.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn get(&self, index: usize) -> Option<S::Item> {
        assert!(
            index < self.size,
            "index {index} out of bounds for column of length {}",
            self.size
        );
        self.physical_position(index)
            .map(|position| self.values().get(position))
    }

    /// Return the entry at `index`, or `None` if it is null.
    ///
    /// Returns an error if `index` is out of bounds.
    pub fn try_get(&self, index: usize) -> Result<Option<S::Item>> {
        self.check_index(index)?;
        Ok(self.get(index))
    }

    /// Iterate over all entries, with `None` for nulls.
    pub fn iter(&self) -> ColumnIter<'_, S> {
        ColumnIter {
            values: self.values(),
            positions: self.positions(),
        }
    }

    /// Iterate over the non-null values.
    pub fn non_null_iter(&self) -> impl Iterator<Item = S::Item> + '_ {
        self.physical_range()
            .map(|position| self.values().get(position))
    }

    /// Return the entries `from..to` as a column sharing this column's store.
    ///
    /// Returns an error unless `from <= to <= len`.
    pub fn sub_column(&self, from: usize, to: usize) -> Result<Self> {
        if from > to || to > self.size {
            return Err(Error::invalid_argument(format!(
                "range {from}..{to} out of bounds for column of length {}",
                self.size
            )));
        }

        Ok(self.view(from, to))
    }

    /// Narrow this column to the entries `from..to`, which must be in bounds.
    pub(crate) fn view(&self, from: usize, to: usize) -> Self {
        if from == 0 && to == self.size {
            return self.clone();
        }
        if from == to {
            return self.empty_like();
        }

        match &self.repr {
            Repr::NonNull(_) => Self {
                repr: self.repr.clone(),
                offset: self.offset + from,
                size: to - from,
                characteristics: self.characteristics,
            },
            Repr::Nullable(nullable) => {
                let (start, end) = (self.offset + from, self.offset + to);
                if nullable.nulls.null_count(start, end) == 0 {
                    let range =
                        nullable.nulls.non_null_index(start)..nullable.nulls.non_null_index(end);
                    Self::from_store(nullable.values.slice(range)).with_declared(nullable.packed)
                } else {
                    Self {
                        repr: self.repr.clone(),
                        offset: start,
                        size: to - from,
                        characteristics: self.characteristics,
                    }
                }
            }
        }
    }

    /// The first `count` entries, or all if there are fewer.
    pub fn head(&self, count: usize) -> Self {
        self.view(0, count.min(self.size))
    }

    /// The last `count` entries, or all if there are fewer.
    pub fn tail(&self, count: usize) -> Self {
        self.view(self.size - count.min(self.size), self.size)
    }

    /// Return this column with offset zero, still sharing the store of non-null values.
    pub fn slice(&self) -> Self {
        self.rebuild(|store, range| store.slice(range))
    }

    /// Return a copy of this column that shares nothing with this one.
    pub fn copy(&self) -> Self {
        self.rebuild(|store, range| store.copy_range(range))
    }

    /// Return `true` if no part of this column lives in a memory mapped file.
    pub fn is_heap(&self) -> bool {
        self.values().is_heap()
    }

    /// Return this column with memory mapped parts copied to the heap.
    pub fn to_heap(&self) -> Self {
        if self.is_heap() {
            return self.clone();
        }

        log::trace!(
            "materializing mapped {} column of length {}",
            S::ELEMENT_TYPE,
            self.size
        );
        self.rebuild(|store, range| store.slice(range).to_heap())
    }

    fn rebuild(&self, values: impl FnOnce(&S, Range<usize>) -> S) -> Self {
        let store = values(self.values(), self.physical_range());
        match &self.repr {
            Repr::NonNull(_) => Self {
                size: store.len(),
                repr: Repr::NonNull(store),
                offset: 0,
                characteristics: self.characteristics,
            },
            Repr::Nullable(nullable) => Self {
                repr: Repr::Nullable(NullableStore::new(
                    store,
                    NullMap::new(self.null_bits()),
                    nullable.packed,
                )),
                offset: 0,
                size: self.size,
                characteristics: self.characteristics,
            },
        }
    }

    /// Keep the entries whose bit in `keep` is set.
    ///
    /// `keep` must have one bit per entry, `cardinality` of which are set.
    pub fn apply_filter(&self, keep: &BitmapSlice, cardinality: usize) -> Result<Self> {
        if keep.len() != self.size {
            return Err(Error::invalid_argument(format!(
                "filter of length {} applied to column of length {}",
                keep.len(),
                self.size
            )));
        }
        if bitmap::cardinality(keep) != cardinality {
            return Err(Error::invalid_argument(format!(
                "filter has {} set bits, expected {cardinality}",
                bitmap::cardinality(keep)
            )));
        }

        if cardinality == 0 {
            return Ok(self.empty_like());
        }
        if cardinality == self.size {
            return Ok(self.clone());
        }

        match &self.repr {
            Repr::NonNull(store) => Ok(Self {
                repr: Repr::NonNull(store.filter_range(self.physical_range(), keep, cardinality)),
                offset: 0,
                size: cardinality,
                characteristics: self.characteristics,
            }),
            Repr::Nullable(nullable) => {
                let physical = self.physical_range();
                let mut physical_keep = bitmap::zeroed(physical.len());
                let mut nulls = Bitmap::with_capacity(cardinality);
                let mut kept = 0;

                for (position, keep) in self.positions().zip(keep.iter().by_vals()) {
                    if !keep {
                        continue;
                    }
                    match position {
                        Some(position) => {
                            physical_keep.set(position - physical.start, true);
                            nulls.push(false);
                            kept += 1;
                        }
                        None => nulls.push(true),
                    }
                }

                let values = nullable.values.filter_range(physical, &physical_keep, kept);
                Self::from_nullable_ordered(values, nulls, nullable.packed)
            }
        }
    }

    /// Keep the non-null values that satisfy `predicate`, and nulls if `keep_nulls` is set.
    pub fn filter<P>(&self, predicate: P, keep_nulls: bool) -> Result<Self>
    where
        P: Fn(&S::Item) -> bool,
    {
        let keep = self
            .iter()
            .map(|value| value.as_ref().map_or(keep_nulls, &predicate))
            .collect::<Bitmap>();
        let cardinality = bitmap::cardinality(&keep);

        log::trace!("filter keeps {cardinality} of {} entries", self.size);
        self.apply_filter(&keep, cardinality)
    }

    /// Collect the entries at the given positions, in the given order.
    ///
    /// The result declares no ordering guarantees.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        for &index in indices {
            self.check_index(index)?;
        }

        self.gather(indices.iter().map(|&index| Some(index)), indices.len())
    }

    /// Collect the entries at the given positions, with a null for every `None`.
    pub fn select_optional(&self, indices: &[Option<usize>]) -> Result<Self> {
        for &index in indices.iter().flatten() {
            self.check_index(index)?;
        }

        self.gather(indices.iter().copied(), indices.len())
    }

    fn gather(&self, indices: impl Iterator<Item = Option<usize>>, count: usize) -> Result<Self> {
        let mut physical = Vec::with_capacity(count);
        let mut nulls = Bitmap::with_capacity(count);

        for index in indices {
            match index.and_then(|index| self.physical_position(index)) {
                Some(position) => {
                    physical.push(position);
                    nulls.push(false);
                }
                None => nulls.push(true),
            }
        }

        let values = self.values().gather(&physical);
        Self::from_nullable_ordered(values, nulls, Characteristics::nonnull())
    }

    /// Return the entries of this column followed by the entries of `tail`.
    ///
    /// Both columns must declare the same SORTED and DISTINCT guarantees,
    /// and the result must satisfy them across the boundary.
    pub fn append(&self, tail: &Self) -> Result<Self> {
        if tail.is_empty() {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(tail.clone());
        }

        let (head_order, tail_order) = (
            self.characteristics.ordering(),
            tail.characteristics.ordering(),
        );
        if head_order != tail_order {
            return Err(Error::invalid_argument(format!(
                "cannot append a {} column to a {} column",
                tail.characteristics, self.characteristics
            )));
        }

        if head_order.is_sorted() {
            let last = self.offset + self.size - 1;
            let boundary = self
                .values()
                .compare_across(last, tail.values(), tail.offset);
            let valid = if head_order.is_distinct() {
                boundary == Ordering::Less
            } else {
                boundary != Ordering::Greater
            };
            if !valid {
                return Err(Error::invalid_argument(format!(
                    "appending breaks {}: last value {:?} and first value {:?}",
                    self.characteristics,
                    self.get(self.size - 1),
                    tail.get(0)
                )));
            }
        }

        let values =
            self.values()
                .concat(self.physical_range(), tail.values(), tail.physical_range())?;

        match (&self.repr, &tail.repr) {
            (Repr::NonNull(_), Repr::NonNull(_)) => Ok(Self::from_store(values)
                .with_declared(self.characteristics.intersection(tail.characteristics))),
            _ => {
                let mut nulls = self.null_bits();
                nulls.extend_from_bitslice(&tail.null_bits());
                Self::from_nullable_ordered(values, nulls, Characteristics::nonnull())
            }
        }
    }

    fn non_null_store(&self, operation: &str) -> Result<&S> {
        match &self.repr {
            Repr::NonNull(store) => Ok(store),
            Repr::Nullable(_) => Err(Error::unsupported(format!(
                "{operation} of a column with {} nulls",
                self.null_count()
            ))),
        }
    }

    /// Return the entries of this column in ascending order.
    ///
    /// Returns an error if the column contains nulls.
    pub fn to_sorted(&self) -> Result<Self> {
        let store = self.non_null_store("sorting")?;
        if self.characteristics.is_sorted() {
            return Ok(self.clone());
        }

        Ok(Self::from_store(store.sorted(self.physical_range()))
            .with_declared(Characteristics::sorted()))
    }

    /// Return the distinct entries of this column in ascending order.
    ///
    /// Returns an error if the column contains nulls.
    pub fn to_distinct(&self) -> Result<Self> {
        self.non_null_store("deduplication")?;
        if self.characteristics.is_distinct() {
            return Ok(self.clone());
        }

        let sorted = self.to_sorted()?;
        let store = sorted.non_null_store("deduplication")?;
        Ok(Self::from_store(store.deduplicate(sorted.physical_range()))
            .with_declared(Characteristics::distinct()))
    }

    /// Check that the content satisfies the declared guarantees.
    pub fn verify_characteristics(&self) -> Result<()> {
        if self.characteristics.is_nonnull() && self.null_count() > 0 {
            return Err(Error::invalid_argument(format!(
                "column declared {} contains {} nulls",
                self.characteristics,
                self.null_count()
            )));
        }

        if self.characteristics.is_sorted() {
            let distinct = self.characteristics.is_distinct();
            let violation = self.physical_range().tuple_windows().find(|&(left, right)| {
                match self.values().compare_at(left, right) {
                    Ordering::Less => false,
                    Ordering::Equal => distinct,
                    Ordering::Greater => true,
                }
            });

            if let Some((left, _)) = violation {
                let index = left - self.offset;
                return Err(Error::invalid_argument(format!(
                    "entries {index} and {} violate {}",
                    index + 1,
                    self.characteristics
                )));
            }
        }

        Ok(())
    }
}

impl<S: Storage> Default for Column<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: Storage> PartialEq for Column<S> {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self
                .positions()
                .zip(other.positions())
                .all(|positions| match positions {
                    (None, None) => true,
                    (Some(left), Some(right)) => {
                        self.values().compare_across(left, other.values(), right)
                            == Ordering::Equal
                    }
                    _ => false,
                })
    }
}

impl<S: Storage> Debug for Column<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("element_type", &S::ELEMENT_TYPE)
            .field("len", &self.size)
            .field("characteristics", &self.characteristics)
            .field("nulls", &self.null_count())
            .finish()
    }
}

impl<S: Storage> ByteSized for Column<S> {
    fn size_bytes(&self) -> u64 {
        let repr = match &self.repr {
            Repr::NonNull(store) => store.size_bytes(),
            Repr::Nullable(nullable) => nullable.size_bytes(),
        };
        size_of::<Self>() as u64 + repr
    }
}

/// Physical positions of the entries of a column, `None` for nulls.
#[derive(Debug, Clone)]
pub(crate) struct Positions<'a> {
    nulls: Option<&'a BitmapSlice>,
    logical: Range<usize>,
    physical: usize,
}

impl Iterator for Positions<'_> {
    type Item = Option<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let logical = self.logical.next()?;
        if self.nulls.is_some_and(|nulls| nulls[logical]) {
            return Some(None);
        }

        let physical = self.physical;
        self.physical += 1;
        Some(Some(physical))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.logical.size_hint()
    }
}

impl ExactSizeIterator for Positions<'_> {}

/// Iterator over the entries of a [Column].
#[derive(Debug)]
pub struct ColumnIter<'a, S: Storage> {
    values: &'a S,
    positions: Positions<'a>,
}

impl<S: Storage> Iterator for ColumnIter<'_, S> {
    type Item = Option<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        self.positions
            .next()
            .map(|position| position.map(|position| self.values.get(position)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<S: Storage> ExactSizeIterator for ColumnIter<'_, S> {}

#[cfg(test)]
mod test {
    use bitvec::{bitvec, order::Lsb0};
    use quickcheck_macros::quickcheck;
    use test_log::test;

    use crate::{
        bitmap::Bitmap,
        buffer::ByteOrder,
        columnar::{characteristics::Characteristics, storage::FixedStore},
        error::Error,
    };

    use super::{Column, IntColumn, LongColumn, StringColumn};

    fn ints(values: &[i32]) -> IntColumn {
        Column::from_store(FixedStore::from_values(values, ByteOrder::Big))
    }

    fn nullable(values: &[Option<i32>]) -> IntColumn {
        Column::from_options(values.iter().copied()).unwrap()
    }

    fn strings(values: &[&str], characteristics: Characteristics) -> StringColumn {
        Column::from_values(values.iter().map(|value| value.to_string()), characteristics)
            .unwrap()
    }

    #[test]
    fn sub_column_identity_and_empty() {
        let column = ints(&[1, 2, 3]);
        assert_eq!(column.sub_column(0, 3).unwrap(), column);

        let empty = column.sub_column(2, 2).unwrap();
        assert!(empty.is_empty());
        assert!(empty.characteristics().is_distinct());

        assert!(matches!(
            column.sub_column(2, 4),
            Err(Error::InvalidArgument(_))
        ));
        assert!(column.sub_column(2, 1).is_err());
    }

    #[test]
    fn views_share_storage() {
        let column = ints(&[5, 6, 7, 8, 9]);
        let view = column.sub_column(1, 4).unwrap().sub_column(1, 3).unwrap();

        assert_eq!(view.offset(), 2);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![Some(7), Some(8)]);

        let sliced = view.slice();
        assert_eq!(sliced.offset(), 0);
        assert_eq!(sliced, view);

        let copied = view.copy();
        assert_eq!(copied, view);
        assert_eq!(column.head(2), ints(&[5, 6]));
        assert_eq!(column.tail(10), column);
    }

    #[test]
    fn nullable_views() {
        let column = nullable(&[Some(1), None, Some(3), Some(4), None]);
        assert!(column.is_nullable());
        assert_eq!(column.null_count(), 2);
        assert_eq!(column.get(2), Some(3));
        assert!(column.is_null(4));

        // a view without nulls uses the packed values directly
        let dense = column.sub_column(2, 4).unwrap();
        assert!(!dense.is_nullable());
        assert!(dense.characteristics().is_nonnull());
        assert_eq!(dense, ints(&[3, 4]));

        let sparse = column.sub_column(1, 3).unwrap();
        assert_eq!(sparse.iter().collect::<Vec<_>>(), vec![None, Some(3)]);
        assert_eq!(sparse.slice().iter().collect::<Vec<_>>(), vec![None, Some(3)]);
    }

    #[test]
    fn try_get_out_of_bounds() {
        let column = ints(&[1]);
        assert_eq!(column.try_get(0).unwrap(), Some(1));
        assert!(column.try_get(1).unwrap_err().is_invalid_argument());
    }

    #[test]
    #[should_panic]
    fn get_out_of_bounds_panics() {
        ints(&[1]).get(3);
    }

    #[test]
    fn apply_filter_keeps_order() {
        let column = strings(&["a", "b", "c", "d"], Characteristics::distinct());

        let filtered = column
            .apply_filter(&bitvec![u64, Lsb0; 1, 0, 1, 1], 3)
            .unwrap();
        assert_eq!(filtered, strings(&["a", "c", "d"], Characteristics::none()));
        assert!(filtered.characteristics().is_distinct());

        let none = column.apply_filter(&Bitmap::repeat(false, 4), 0).unwrap();
        assert!(none.is_empty());

        let all = column.apply_filter(&Bitmap::repeat(true, 4), 4).unwrap();
        assert_eq!(all, column);

        assert!(column.apply_filter(&Bitmap::repeat(true, 3), 3).is_err());
        assert!(column.apply_filter(&Bitmap::repeat(true, 4), 2).is_err());
    }

    #[test]
    fn filter_with_nulls() {
        let column = nullable(&[Some(1), None, Some(2), Some(3), None]);

        let odd = column.filter(|value| value % 2 == 1, true).unwrap();
        assert_eq!(odd.iter().collect::<Vec<_>>(), vec![Some(1), None, Some(3), None]);

        let without_nulls = column.filter(|value| *value > 1, false).unwrap();
        assert!(!without_nulls.is_nullable());
        assert_eq!(without_nulls, ints(&[2, 3]));
    }

    #[test]
    fn select_positions() {
        let column = ints(&[10, 20, 30]).with_characteristics(Characteristics::distinct()).unwrap();

        let selected = column.select(&[2, 0, 2]).unwrap();
        assert_eq!(selected, ints(&[30, 10, 30]));
        assert_eq!(selected.characteristics(), Characteristics::nonnull());

        let padded = column.select_optional(&[Some(1), None]).unwrap();
        assert_eq!(padded.iter().collect::<Vec<_>>(), vec![Some(20), None]);
        assert_eq!(padded.characteristics(), Characteristics::none());

        assert!(column.select(&[3]).is_err());
    }

    #[test]
    fn append_checks_boundary() {
        let sorted = |values: &[i32]| ints(values).with_characteristics(Characteristics::sorted()).unwrap();
        let distinct =
            |values: &[i32]| ints(values).with_characteristics(Characteristics::distinct()).unwrap();

        let joined = sorted(&[1, 2]).append(&sorted(&[2, 3])).unwrap();
        assert_eq!(joined, ints(&[1, 2, 2, 3]));
        assert!(joined.characteristics().is_sorted());

        assert!(distinct(&[1, 2]).append(&distinct(&[2, 3])).is_err());
        assert!(distinct(&[1, 2]).append(&sorted(&[3])).is_err());
        assert!(sorted(&[5]).append(&sorted(&[4])).is_err());

        let empty = IntColumn::empty();
        assert_eq!(ints(&[3, 1]).append(&empty).unwrap(), ints(&[3, 1]));
        assert_eq!(empty.append(&ints(&[3, 1])).unwrap(), ints(&[3, 1]));
    }

    #[test]
    fn append_nullable() {
        let joined = nullable(&[Some(1), None])
            .append(&ints(&[2, 3]))
            .unwrap();
        assert_eq!(
            joined.iter().collect::<Vec<_>>(),
            vec![Some(1), None, Some(2), Some(3)]
        );
    }

    #[test]
    fn sort_and_deduplicate() {
        let column = strings(&["a", "c", "a", "b"], Characteristics::none());
        let sorted = column.to_sorted().unwrap();
        assert_eq!(sorted, strings(&["a", "a", "b", "c"], Characteristics::none()));
        assert!(sorted.characteristics().is_sorted());

        let distinct = strings(&["a", "a", "b"], Characteristics::sorted())
            .to_distinct()
            .unwrap();
        assert_eq!(distinct, strings(&["a", "b"], Characteristics::none()));
        assert!(distinct.characteristics().is_distinct());

        let with_nulls = nullable(&[Some(1), None]);
        assert!(matches!(
            with_nulls.to_sorted(),
            Err(Error::UnsupportedOperation(_))
        ));
        assert!(with_nulls.to_distinct().is_err());
    }

    #[test]
    fn equality_is_logical() {
        let nulls = nullable(&[None, Some(1), Some(2)]);
        let view = nulls.sub_column(1, 3).unwrap();
        assert_eq!(view, ints(&[1, 2]));

        assert_eq!(nullable(&[None, None]), nullable(&[None, None]));
        assert_ne!(nullable(&[None, Some(1)]), nullable(&[Some(1), None]));
        assert_ne!(ints(&[1]), ints(&[1, 1]));
    }

    #[test]
    fn declared_characteristics_are_verified() {
        assert!(ints(&[2, 1])
            .with_characteristics(Characteristics::sorted())
            .is_err());
        assert!(ints(&[1, 1])
            .with_characteristics(Characteristics::distinct())
            .is_err());
        assert!(nullable(&[Some(1), None])
            .with_characteristics(Characteristics::nonnull())
            .is_err());
    }

    #[test]
    fn nullable_columns_reject_ordering_requests() {
        let column = nullable(&[Some(1), None, Some(3)]);

        for request in [
            Characteristics::sorted().ordering(),
            Characteristics::distinct().ordering(),
        ] {
            assert!(!request.is_nonnull());
            assert!(matches!(
                column.clone().with_characteristics(request),
                Err(Error::InvalidArgument(_))
            ));
        }

        let unchanged = column.clone().with_characteristics(Characteristics::none()).unwrap();
        assert_eq!(unchanged, column);
        assert_eq!(unchanged.characteristics(), Characteristics::none());
    }

    #[quickcheck]
    fn filter_preserves_order(values: Vec<i64>, flags: Vec<bool>) -> bool {
        let column = LongColumn::from_values(values.iter().copied(), Characteristics::none()).unwrap();
        let keep = (0..values.len())
            .map(|index| flags.get(index).copied().unwrap_or(true))
            .collect::<Bitmap>();
        let cardinality = keep.count_ones();

        let expected = values
            .iter()
            .zip(keep.iter().by_vals())
            .filter_map(|(value, keep)| keep.then_some(*value))
            .collect::<Vec<_>>();

        column
            .apply_filter(&keep, cardinality)
            .map(|filtered| filtered.non_null_iter().collect::<Vec<_>>() == expected)
            .unwrap_or(false)
    }

    #[quickcheck]
    fn append_is_associative(a: Vec<i32>, b: Vec<Option<i32>>, c: Vec<i32>) -> bool {
        let (a, b, c) = (
            IntColumn::from_values(a, Characteristics::none()).unwrap(),
            IntColumn::from_options(b).unwrap(),
            IntColumn::from_values(c, Characteristics::none()).unwrap(),
        );

        let left = a.append(&b).and_then(|ab| ab.append(&c));
        let right = b.append(&c).and_then(|bc| a.append(&bc));
        matches!((left, right), (Ok(left), Ok(right)) if left == right)
    }
}
