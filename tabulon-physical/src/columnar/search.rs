//! This module implements value lookups on columns:
//! binary search with honing on sorted columns,
//! linear scans otherwise, and range queries on distinct columns.

use std::{cmp::Ordering, ops::Range};

use crate::error::{Error, Result};

use super::{column::Column, storage::Storage};

/// Which entry a search reports if the value occurs several times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Hone {
    /// Any matching entry
    #[default]
    Any,
    /// The first matching entry
    First,
    /// The last matching entry
    Last,
}

/// Result of searching a value in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchOutcome {
    /// The value was found at the given index.
    Found(usize),
    /// The value is not present.
    NotFound {
        /// Index at which the value would have to be inserted to keep the column sorted
        insertion_point: usize,
    },
}

impl SearchOutcome {
    /// Index of the match, if any.
    pub fn found(self) -> Option<usize> {
        match self {
            SearchOutcome::Found(index) => Some(index),
            SearchOutcome::NotFound { .. } => None,
        }
    }

    /// Return `true` if the value was found.
    pub fn is_found(self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }

    /// Index of the match, or the insertion point.
    pub fn insertion_point(self) -> usize {
        match self {
            SearchOutcome::Found(index) => index,
            SearchOutcome::NotFound { insertion_point } => insertion_point,
        }
    }

    /// Signed encoding of this outcome:
    /// the index if found, `-(insertion_point) - 1` otherwise.
    pub fn code(self) -> i64 {
        match self {
            SearchOutcome::Found(index) => index as i64,
            SearchOutcome::NotFound { insertion_point } => -(insertion_point as i64) - 1,
        }
    }

    /// Inverse of [SearchOutcome::code].
    pub fn from_code(code: i64) -> Self {
        if code >= 0 {
            SearchOutcome::Found(code as usize)
        } else {
            SearchOutcome::NotFound {
                insertion_point: (-(code + 1)) as usize,
            }
        }
    }

    /// `Ok(index)` if found, `Err(insertion_point)` otherwise,
    /// like [slice::binary_search].
    pub fn into_result(self) -> std::result::Result<usize, usize> {
        match self {
            SearchOutcome::Found(index) => Ok(index),
            SearchOutcome::NotFound { insertion_point } => Err(insertion_point),
        }
    }
}

/// Binary search for `value` among the sorted positions `range` of `store`.
///
/// Returns the physical position of some match, or the insertion point.
fn bisect<S: Storage>(
    store: &S,
    range: Range<usize>,
    value: &S::Item,
) -> std::result::Result<usize, usize> {
    let (mut low, mut high) = (range.start, range.end);
    while low < high {
        let middle = low + (high - low) / 2;
        match store.compare_to(middle, value) {
            Ordering::Less => low = middle + 1,
            Ordering::Greater => high = middle,
            Ordering::Equal => return Ok(middle),
        }
    }
    Err(low)
}

/// Move the match at `hit` to the first match in `range`,
/// probing at doubling distances until the start of the run is bracketed.
fn hone_first<S: Storage>(store: &S, range: Range<usize>, value: &S::Item, hit: usize) -> usize {
    let mut known = hit;
    let mut step = 1;
    let lower = loop {
        if known - range.start < step {
            break range.start;
        }
        let probe = known - step;
        if store.compare_to(probe, value) == Ordering::Equal {
            known = probe;
            step *= 2;
        } else {
            break probe + 1;
        }
    };

    let (mut low, mut high) = (lower, known);
    while low < high {
        let middle = low + (high - low) / 2;
        if store.compare_to(middle, value) == Ordering::Less {
            low = middle + 1;
        } else {
            high = middle;
        }
    }
    low
}

/// Move the match at `hit` to the last match in `range`.
fn hone_last<S: Storage>(store: &S, range: Range<usize>, value: &S::Item, hit: usize) -> usize {
    let mut known = hit;
    let mut step = 1;
    let upper = loop {
        if range.end - 1 - known < step {
            break range.end;
        }
        let probe = known + step;
        if store.compare_to(probe, value) == Ordering::Equal {
            known = probe;
            step *= 2;
        } else {
            break probe;
        }
    };

    // first position after `known` holding a greater value
    let (mut low, mut high) = (known + 1, upper);
    while low < high {
        let middle = low + (high - low) / 2;
        if store.compare_to(middle, value) == Ordering::Greater {
            high = middle;
        } else {
            low = middle + 1;
        }
    }
    low - 1
}

impl<S: Storage> Column<S> {
    fn require_sorted(&self, operation: &str) -> Result<()> {
        if !self.characteristics().is_sorted() {
            return Err(Error::unsupported(format!(
                "{operation} on a column declared {}",
                self.characteristics()
            )));
        }
        Ok(())
    }

    fn require_distinct(&self, operation: &str) -> Result<()> {
        if !self.characteristics().is_distinct() {
            return Err(Error::unsupported(format!(
                "{operation} on a column declared {}",
                self.characteristics()
            )));
        }
        Ok(())
    }

    /// Search a sorted column, honing to the requested match.
    fn search_sorted(&self, value: &S::Item, hone: Hone) -> SearchOutcome {
        let range = self.physical_range();
        let store = self.values();
        let offset = range.start;

        match bisect(store, range.clone(), value) {
            Ok(hit) => {
                let hit = if self.characteristics().is_distinct() {
                    hit
                } else {
                    match hone {
                        Hone::Any => hit,
                        Hone::First => hone_first(store, range, value, hit),
                        Hone::Last => hone_last(store, range, value, hit),
                    }
                };
                SearchOutcome::Found(hit - offset)
            }
            Err(insertion_point) => SearchOutcome::NotFound {
                insertion_point: insertion_point - offset,
            },
        }
    }

    /// Physical position of a non-null value equal to `value`.
    ///
    /// Searches the packed values of this view,
    /// using binary search if they are known to be sorted.
    fn find_physical(&self, value: &S::Item, hone: Hone) -> Option<usize> {
        let range = self.physical_range();
        let store = self.values();
        let packed = self.packed_characteristics();

        if packed.is_sorted() {
            let hit = bisect(store, range.clone(), value).ok()?;
            return Some(match hone {
                Hone::Any => hit,
                _ if packed.is_distinct() => hit,
                Hone::First => hone_first(store, range, value, hit),
                Hone::Last => hone_last(store, range, value, hit),
            });
        }

        let equal = |&position: &usize| store.compare_to(position, value) == Ordering::Equal;
        match hone {
            Hone::Any | Hone::First => range.clone().find(equal),
            Hone::Last => range.clone().rev().find(equal),
        }
    }

    /// Binary search for `value` in a sorted column.
    ///
    /// Returns an error if the column is not declared SORTED.
    pub fn binary_search(&self, value: &S::Item) -> Result<SearchOutcome> {
        self.require_sorted("binary search")?;
        Ok(self.search_sorted(value, Hone::Any))
    }

    /// Search for `value`.
    ///
    /// Sorted columns are searched by bisection,
    /// others are scanned and report the column length as insertion point.
    pub fn search(&self, value: &S::Item, hone: Hone) -> SearchOutcome {
        if self.characteristics().is_sorted() {
            return self.search_sorted(value, hone);
        }

        match self
            .find_physical(value, hone)
            .and_then(|position| self.logical_position(position))
        {
            Some(index) => SearchOutcome::Found(index),
            None => SearchOutcome::NotFound {
                insertion_point: self.len(),
            },
        }
    }

    /// Index of the first entry equal to `value`.
    pub fn index_of(&self, value: &S::Item) -> Option<usize> {
        self.find_physical(value, Hone::First)
            .and_then(|position| self.logical_position(position))
    }

    /// Index of the last entry equal to `value`.
    pub fn last_index_of(&self, value: &S::Item) -> Option<usize> {
        self.find_physical(value, Hone::Last)
            .and_then(|position| self.logical_position(position))
    }

    /// Return `true` if some entry equals `value`.
    pub fn contains(&self, value: &S::Item) -> bool {
        self.find_physical(value, Hone::Any)
            .and_then(|position| self.logical_position(position))
            .is_some()
    }

    /// The first non-null value.
    pub fn first(&self) -> Option<S::Item> {
        let range = self.physical_range();
        (!range.is_empty()).then(|| self.values().get(range.start))
    }

    /// The last non-null value.
    pub fn last(&self) -> Option<S::Item> {
        let range = self.physical_range();
        (!range.is_empty()).then(|| self.values().get(range.end - 1))
    }

    fn value_at(&self, index: Option<usize>) -> Option<S::Item> {
        index
            .filter(|&index| index < self.len())
            .and_then(|index| self.get(index))
    }

    /// The greatest value strictly smaller than `value`.
    ///
    /// Returns an error unless the column is DISTINCT.
    pub fn lower(&self, value: &S::Item) -> Result<Option<S::Item>> {
        self.require_distinct("lower")?;
        let index = self.search_sorted(value, Hone::Any).insertion_point();
        Ok(self.value_at(index.checked_sub(1)))
    }

    /// The greatest value smaller than or equal to `value`.
    ///
    /// Returns an error unless the column is DISTINCT.
    pub fn floor(&self, value: &S::Item) -> Result<Option<S::Item>> {
        self.require_distinct("floor")?;
        let index = match self.search_sorted(value, Hone::Any) {
            SearchOutcome::Found(index) => Some(index),
            SearchOutcome::NotFound { insertion_point } => insertion_point.checked_sub(1),
        };
        Ok(self.value_at(index))
    }

    /// The smallest value greater than or equal to `value`.
    ///
    /// Returns an error unless the column is DISTINCT.
    pub fn ceiling(&self, value: &S::Item) -> Result<Option<S::Item>> {
        self.require_distinct("ceiling")?;
        let index = self.search_sorted(value, Hone::Any).insertion_point();
        Ok(self.value_at(Some(index)))
    }

    /// The smallest value strictly greater than `value`.
    ///
    /// Returns an error unless the column is DISTINCT.
    pub fn higher(&self, value: &S::Item) -> Result<Option<S::Item>> {
        self.require_distinct("higher")?;
        let index = match self.search_sorted(value, Hone::Any) {
            SearchOutcome::Found(index) => index + 1,
            SearchOutcome::NotFound { insertion_point } => insertion_point,
        };
        Ok(self.value_at(Some(index)))
    }

    /// The entries between `from` and `to`, each bound included if requested.
    ///
    /// Returns an error unless the column is DISTINCT.
    pub fn sub_column_by_value(
        &self,
        from: &S::Item,
        from_inclusive: bool,
        to: &S::Item,
        to_inclusive: bool,
    ) -> Result<Self> {
        self.require_distinct("range query")?;

        let start = match self.search_sorted(from, Hone::Any) {
            SearchOutcome::Found(index) if !from_inclusive => index + 1,
            outcome => outcome.insertion_point(),
        };
        let end = match self.search_sorted(to, Hone::Any) {
            SearchOutcome::Found(index) if to_inclusive => index + 1,
            outcome => outcome.insertion_point(),
        };

        Ok(self.view(start, end.max(start)))
    }
}
