//! This module defines the incremental builder protocol for columns.

use std::{cmp::Ordering, fmt::Debug};

use crate::{
    bitmap::{self, Bitmap},
    buffer::ByteOrder,
    error::{Error, Result},
};

use super::{
    characteristics::Characteristics,
    column::Column,
    storage::{CodeWidth, Storage, StorageBuilder},
};

/// When the declared [Characteristics] of a builder are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Validation {
    /// Every added value is compared with the previous one.
    #[default]
    OnRecord,
    /// The content is scanned once when the column is built.
    OnBuild,
}

/// Configuration of a [Builder].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Guarantees the built column will declare
    pub characteristics: Characteristics,
    /// When the guarantees are checked
    pub validation: Validation,
    /// Number of values to reserve space for upfront
    pub initial_capacity: usize,
    /// Byte order of multi-byte values in the built stores
    pub byte_order: ByteOrder,
    /// Widest code a dictionary encoded column may use
    pub dictionary_width: CodeWidth,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            characteristics: Characteristics::none(),
            validation: Validation::default(),
            initial_capacity: 16,
            byte_order: ByteOrder::default(),
            dictionary_width: CodeWidth::default(),
        }
    }
}

impl BuilderOptions {
    /// Default options declaring the given guarantees.
    pub fn with_characteristics(characteristics: Characteristics) -> Self {
        Self {
            characteristics,
            ..Default::default()
        }
    }
}

/// Common interface of builders, which collect values and produce immutable columns.
///
/// Operations return the builder so that calls can be chained with `?`.
pub trait ColumnBuilder {
    /// Type of the values that are added
    type Item;
    /// Type of the built column
    type Output;

    /// Add a value or a null.
    fn add(&mut self, value: Option<Self::Item>) -> Result<&mut Self>;

    /// Add a value.
    fn add_non_null(&mut self, value: Self::Item) -> Result<&mut Self> {
        self.add(Some(value))
    }

    /// Add a null.
    fn add_null(&mut self) -> Result<&mut Self> {
        self.add(None)
    }

    /// Add `count` nulls.
    fn add_nulls(&mut self, count: usize) -> Result<&mut Self> {
        for _ in 0..count {
            self.add(None)?;
        }
        Ok(self)
    }

    /// Add all values of an iterator.
    fn add_all<I>(&mut self, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Self::Item>,
    {
        for value in values {
            self.add(Some(value))?;
        }
        Ok(self)
    }

    /// Add all values or nulls of an iterator.
    fn add_all_options<I>(&mut self, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Option<Self::Item>>,
    {
        for value in values {
            self.add(value)?;
        }
        Ok(self)
    }

    /// Make room for `capacity` values in total.
    fn ensure_capacity(&mut self, capacity: usize) -> &mut Self;

    /// Number of values and nulls added so far.
    fn len(&self) -> usize;

    /// Return `true` if nothing has been added.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return a column with the current content.
    ///
    /// The builder stays usable, later additions do not affect the returned column.
    fn build(&self) -> Result<Self::Output>;
}

/// Builder for a [Column] over the store `S`.
#[derive(Debug, Clone)]
pub struct Builder<S: Storage> {
    staging: S::Staging,
    /// One bit per added entry, set for nulls. Only allocated once a null was added.
    nulls: Option<Bitmap>,
    size: usize,
    /// Ordering of the non-null values, tracked for the nullable representation
    packed: Characteristics,
    options: BuilderOptions,
}

impl<S: Storage> Builder<S> {
    /// Create a builder with the given options.
    pub fn new(options: BuilderOptions) -> Self {
        Self {
            staging: S::Staging::new(&options),
            nulls: None,
            size: 0,
            packed: Characteristics::distinct(),
            options,
        }
    }

    /// Create a builder declaring the given guarantees, with default options otherwise.
    pub fn with_characteristics(characteristics: Characteristics) -> Self {
        Self::new(BuilderOptions::with_characteristics(characteristics))
    }

    /// The options of this builder.
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    fn check_record(&self, value: &S::Item) -> Result<()> {
        let declared = self.options.characteristics;
        if !declared.is_sorted() {
            return Ok(());
        }

        match self.staging.compare_last(value) {
            Some(Ordering::Greater) => Err(Error::invalid_argument(format!(
                "{value:?} is smaller than its predecessor in a column declared {declared}"
            ))),
            Some(Ordering::Equal) if declared.is_distinct() => Err(Error::invalid_argument(
                format!("{value:?} repeats its predecessor in a column declared {declared}"),
            )),
            _ => Ok(()),
        }
    }

    fn track_packed(&mut self, value: &S::Item) {
        self.packed = match self.staging.compare_last(value) {
            Some(Ordering::Greater) => self.packed.intersection(Characteristics::nonnull()),
            Some(Ordering::Equal) => self.packed.intersection(Characteristics::sorted()),
            _ => self.packed,
        };
    }

    fn null_count(&self) -> usize {
        self.nulls.as_deref().map_or(0, bitmap::cardinality)
    }
}

impl<S: Storage> ColumnBuilder for Builder<S> {
    type Item = S::Item;
    type Output = Column<S>;

    fn add(&mut self, value: Option<S::Item>) -> Result<&mut Self> {
        match value {
            Some(value) => {
                if self.options.validation == Validation::OnRecord {
                    self.check_record(&value)?;
                }
                self.track_packed(&value);
                self.staging.push(&value)?;

                if let Some(nulls) = &mut self.nulls {
                    nulls.push(false);
                }
            }
            None => {
                if self.options.validation == Validation::OnRecord
                    && self.options.characteristics.is_nonnull()
                {
                    return Err(Error::invalid_argument(format!(
                        "null added to a column declared {}",
                        self.options.characteristics
                    )));
                }

                let size = self.size;
                self.nulls
                    .get_or_insert_with(|| bitmap::zeroed(size))
                    .push(true);
            }
        }

        self.size += 1;
        Ok(self)
    }

    fn ensure_capacity(&mut self, capacity: usize) -> &mut Self {
        let additional = capacity.saturating_sub(self.size);
        self.staging.reserve(additional);
        if let Some(nulls) = &mut self.nulls {
            nulls.reserve(additional);
        }
        self
    }

    fn len(&self) -> usize {
        self.size
    }

    fn build(&self) -> Result<Column<S>> {
        let declared = self.options.characteristics;
        let values = self.staging.freeze();

        if self.null_count() > 0 {
            if declared.is_nonnull() {
                return Err(Error::invalid_argument(format!(
                    "{} nulls added to a column declared {declared}",
                    self.null_count()
                )));
            }

            let nulls = self.nulls.clone().unwrap_or_default();
            log::trace!(
                "building nullable {} column with {} entries",
                S::ELEMENT_TYPE,
                self.size
            );
            return Column::from_nullable_ordered(values, nulls, self.packed);
        }

        let column = Column::from_store(values).with_declared(declared);
        if self.options.validation == Validation::OnBuild {
            column.verify_characteristics()?;
        }

        Ok(column)
    }
}

#[cfg(test)]
mod test {
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;
    use test_log::test;

    use crate::{
        columnar::{
            characteristics::Characteristics,
            column::{IntColumn, StringColumn},
            storage::FixedStore,
        },
        error::Error,
    };

    use super::{Builder, BuilderOptions, ColumnBuilder, Validation};

    #[test]
    fn sorted_accepts_duplicates() {
        let mut builder = Builder::<FixedStore<i32>>::with_characteristics(Characteristics::sorted());
        builder.add_all([1, 1, 2]).unwrap();

        let column: IntColumn = builder.build().unwrap();
        assert!(column.characteristics().is_sorted());
        assert!(!column.characteristics().is_distinct());
        assert_eq!(column.len(), 3);
    }

    #[test]
    fn distinct_rejects_repetition_on_record() {
        let mut builder =
            Builder::<FixedStore<i32>>::with_characteristics(Characteristics::distinct());
        builder.add_non_null(1).unwrap();
        let result = builder.add_non_null(1);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        // the rejected value was not recorded
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn on_build_defers_validation() {
        let options = BuilderOptions {
            characteristics: Characteristics::sorted(),
            validation: Validation::OnBuild,
            ..Default::default()
        };
        let mut builder = Builder::<FixedStore<i32>>::new(options);
        builder.add_all([3, 1]).unwrap();
        assert!(builder.build().is_err());

        let mut builder = Builder::<FixedStore<i32>>::new(options);
        builder.add_all([1, 3]).unwrap().add_null().unwrap();
        assert!(builder.build().is_err());
    }

    #[test]
    fn nulls_are_rejected_for_nonnull_columns() {
        let mut builder = Builder::<FixedStore<i32>>::with_characteristics(Characteristics::nonnull());
        assert!(builder.add_null().is_err());
    }

    #[test]
    fn nulls_produce_nullable_column() {
        let mut builder = Builder::<FixedStore<i32>>::new(BuilderOptions::default());
        builder
            .add_non_null(4)
            .unwrap()
            .add_nulls(2)
            .unwrap()
            .add_non_null(5)
            .unwrap();

        let column = builder.build().unwrap();
        assert!(column.is_nullable());
        assert_eq!(column.null_count(), 2);
        assert_eq!(
            column.iter().collect::<Vec<_>>(),
            vec![Some(4), None, None, Some(5)]
        );
    }

    #[test]
    fn repeated_builds_are_independent() {
        let mut builder = Builder::<crate::columnar::storage::VarStore<String>>::new(
            BuilderOptions::default(),
        );
        builder.add_non_null("a".to_string()).unwrap();
        let first: StringColumn = builder.build().unwrap();

        builder.add_null().unwrap().add_non_null("b".to_string()).unwrap();
        let second = builder.build().unwrap();

        assert_eq!(first.len(), 1);
        assert!(!first.is_nullable());
        assert_eq!(second.len(), 3);
        assert_eq!(second.get(2), Some("b".to_string()));
        assert_eq!(first.get(0), Some("a".to_string()));
    }

    #[test]
    fn randomized_sorted_input() {
        let mut rng = Pcg64::seed_from_u64(7);
        let mut values = (0..1000).map(|_| rng.gen_range(-50..50)).collect::<Vec<i64>>();
        values.sort();

        let mut builder = Builder::<FixedStore<i64>>::new(BuilderOptions {
            characteristics: Characteristics::sorted(),
            initial_capacity: 1,
            ..Default::default()
        });
        builder.ensure_capacity(10);
        builder.add_all(values.iter().copied()).unwrap();

        let column = builder.build().unwrap();
        assert_eq!(column.non_null_iter().collect::<Vec<_>>(), values);
        assert!(column.verify_characteristics().is_ok());
    }
}
