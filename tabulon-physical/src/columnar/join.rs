//! This module implements merge joins of a column with a sorted column.

use std::{cmp::Ordering, ops::Range};

use crate::{
    bitmap::{self, Bitmap, BitmapSlice},
    error::{Error, Result},
};

use super::{column::Column, storage::Storage};

/// Matches between a DISTINCT left column and an arbitrary right column.
///
/// Every right entry matches at most one left entry.
#[derive(Debug, Clone)]
pub struct OneToManyJoin {
    /// Matching left index for every kept right entry, in right order
    left_rows: Vec<usize>,
    /// Marks the right entries that have a match
    right_keep: Bitmap,
    cardinality: usize,
}

impl OneToManyJoin {
    /// For every matching right entry, the index of its partner in the left column.
    pub fn left_rows(&self) -> &[usize] {
        &self.left_rows
    }

    /// One bit per right entry, set if it has a partner.
    pub fn right_keep(&self) -> &BitmapSlice {
        &self.right_keep
    }

    /// Indices of the right entries that have a partner.
    pub fn right_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.right_keep.iter_ones()
    }

    /// Number of matches.
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Gather the left partner of every match from a column aligned with the left input.
    pub fn apply_left<S: Storage>(&self, column: &Column<S>) -> Result<Column<S>> {
        column.select(&self.left_rows)
    }

    /// Keep the matching entries of a column aligned with the right input.
    pub fn apply_right<S: Storage>(&self, column: &Column<S>) -> Result<Column<S>> {
        column.apply_filter(&self.right_keep, self.cardinality)
    }
}

/// Matches between two DISTINCT columns.
#[derive(Debug, Clone)]
pub struct SortedIntersection {
    left_keep: Bitmap,
    right_keep: Bitmap,
    cardinality: usize,
}

impl SortedIntersection {
    /// One bit per left entry, set if the value also occurs on the right.
    pub fn left_keep(&self) -> &BitmapSlice {
        &self.left_keep
    }

    /// One bit per right entry, set if the value also occurs on the left.
    pub fn right_keep(&self) -> &BitmapSlice {
        &self.right_keep
    }

    /// Number of common values.
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Keep the entries of a column aligned with the left input.
    pub fn apply_left<S: Storage>(&self, column: &Column<S>) -> Result<Column<S>> {
        column.apply_filter(&self.left_keep, self.cardinality)
    }

    /// Keep the entries of a column aligned with the right input.
    pub fn apply_right<S: Storage>(&self, column: &Column<S>) -> Result<Column<S>> {
        column.apply_filter(&self.right_keep, self.cardinality)
    }
}

/// Row pairs of a left outer join.
///
/// Matches come first, ordered by their right row,
/// followed by the left rows without a partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftOuterJoin {
    rows: Vec<(usize, Option<usize>)>,
}

impl LeftOuterJoin {
    /// All pairs of left row and matching right row, if any.
    pub fn rows(&self) -> &[(usize, Option<usize>)] {
        &self.rows
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Return `true` if there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Left row of every pair.
    pub fn left_indices(&self) -> Vec<usize> {
        self.rows.iter().map(|(left, _)| *left).collect()
    }

    /// Right row of every pair, `None` for unmatched left rows.
    pub fn right_indices(&self) -> Vec<Option<usize>> {
        self.rows.iter().map(|(_, right)| *right).collect()
    }

    /// Gather a column aligned with the left input.
    pub fn apply_left<S: Storage>(&self, column: &Column<S>) -> Result<Column<S>> {
        column.select(&self.left_indices())
    }

    /// Gather a column aligned with the right input, padding with nulls.
    pub fn apply_right<S: Storage>(&self, column: &Column<S>) -> Result<Column<S>> {
        column.select_optional(&self.right_indices())
    }
}

fn require_distinct<S: Storage>(column: &Column<S>, side: &str) -> Result<()> {
    if !column.characteristics().is_distinct() {
        return Err(Error::unsupported(format!(
            "merge join needs a DISTINCT {side} column, found {}",
            column.characteristics()
        )));
    }
    Ok(())
}

/// First position in `range` for which `is_before` does not hold,
/// where `is_before` holds for `range.start`.
///
/// Probes at doubling distances before bisecting.
fn gallop(range: Range<usize>, is_before: impl Fn(usize) -> bool) -> usize {
    let mut known = range.start;
    let mut step = 1;
    let mut bound = range.end;
    while known + step < range.end {
        let probe = known + step;
        if is_before(probe) {
            known = probe;
            step *= 2;
        } else {
            bound = probe;
            break;
        }
    }

    let (mut low, mut high) = (known + 1, bound);
    while low < high {
        let middle = low + (high - low) / 2;
        if is_before(middle) {
            low = middle + 1;
        } else {
            high = middle;
        }
    }
    low
}

/// Match every entry of `right` with the equal entry of the DISTINCT column `left`.
///
/// Nulls on the right never match.
pub fn intersect_left_sorted<S: Storage>(
    left: &Column<S>,
    right: &Column<S>,
) -> Result<OneToManyJoin> {
    require_distinct(left, "left")?;

    let left_range = left.physical_range();
    let (left_store, right_store) = (left.values(), right.values());

    let mut left_rows = Vec::new();
    let mut right_keep = bitmap::zeroed(right.len());

    for (row, position) in right.positions().enumerate() {
        let Some(position) = position else {
            continue;
        };

        let (mut low, mut high) = (left_range.start, left_range.end);
        while low < high {
            let middle = low + (high - low) / 2;
            match left_store.compare_across(middle, right_store, position) {
                Ordering::Less => low = middle + 1,
                Ordering::Greater => high = middle,
                Ordering::Equal => {
                    left_rows.push(middle - left_range.start);
                    right_keep.set(row, true);
                    break;
                }
            }
        }
    }

    let cardinality = left_rows.len();
    log::debug!(
        "one-to-many join of {} and {} entries: {cardinality} matches",
        left.len(),
        right.len()
    );

    Ok(OneToManyJoin {
        left_rows,
        right_keep,
        cardinality,
    })
}

/// Find the values common to two DISTINCT columns.
pub fn intersect_both_sorted<S: Storage>(
    left: &Column<S>,
    right: &Column<S>,
) -> Result<SortedIntersection> {
    require_distinct(left, "left")?;
    require_distinct(right, "right")?;

    let (left_range, right_range) = (left.physical_range(), right.physical_range());
    let (left_store, right_store) = (left.values(), right.values());

    let mut left_keep = bitmap::zeroed(left.len());
    let mut right_keep = bitmap::zeroed(right.len());
    let mut cardinality = 0;

    let (mut i, mut j) = (left_range.start, right_range.start);
    while i < left_range.end && j < right_range.end {
        match left_store.compare_across(i, right_store, j) {
            Ordering::Equal => {
                left_keep.set(i - left_range.start, true);
                right_keep.set(j - right_range.start, true);
                cardinality += 1;
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                i = gallop(i..left_range.end, |k| {
                    left_store.compare_across(k, right_store, j) == Ordering::Less
                });
            }
            Ordering::Greater => {
                j = gallop(j..right_range.end, |k| {
                    right_store.compare_across(k, left_store, i) == Ordering::Less
                });
            }
        }
    }

    log::debug!(
        "intersection of {} and {} entries: {cardinality} matches",
        left.len(),
        right.len()
    );

    Ok(SortedIntersection {
        left_keep,
        right_keep,
        cardinality,
    })
}

/// Pair every right entry with its partner in the DISTINCT column `left`,
/// and keep the left entries without partner.
pub fn left_outer_join<S: Storage>(left: &Column<S>, right: &Column<S>) -> Result<LeftOuterJoin> {
    let join = intersect_left_sorted(left, right)?;

    let mut matched = bitmap::zeroed(left.len());
    let mut rows = Vec::with_capacity(join.cardinality() + left.len());
    for (&left_row, right_row) in join.left_rows().iter().zip(join.right_rows()) {
        matched.set(left_row, true);
        rows.push((left_row, Some(right_row)));
    }
    rows.extend(matched.iter_zeros().map(|left_row| (left_row, None)));

    log::debug!(
        "left outer join: {} matches, {} rows without partner",
        join.cardinality(),
        rows.len() - join.cardinality()
    );

    Ok(LeftOuterJoin { rows })
}

#[cfg(test)]
mod test {
    use quickcheck_macros::quickcheck;
    use test_log::test;

    use crate::{
        columnar::{
            characteristics::Characteristics,
            column::{IntColumn, StringColumn},
        },
        error::Error,
    };

    use super::{intersect_both_sorted, intersect_left_sorted, left_outer_join};

    fn column(values: &[i32], characteristics: Characteristics) -> IntColumn {
        IntColumn::from_values(values.iter().copied(), characteristics).unwrap()
    }

    #[test]
    fn one_to_many() {
        let left = column(&[1, 3, 5, 7], Characteristics::distinct());
        let right = column(&[3, 3, 5, 9], Characteristics::sorted());

        let join = intersect_left_sorted(&left, &right).unwrap();
        assert_eq!(join.left_rows(), &[1, 1, 2]);
        assert_eq!(
            join.right_keep().iter().by_vals().collect::<Vec<_>>(),
            vec![true, true, true, false]
        );
        assert_eq!(join.cardinality(), 3);

        assert_eq!(
            join.apply_left(&left).unwrap(),
            column(&[3, 3, 5], Characteristics::none())
        );
        assert_eq!(
            join.apply_right(&right).unwrap(),
            column(&[3, 3, 5], Characteristics::none())
        );
    }

    #[test]
    fn right_nulls_never_match() {
        let left = column(&[1, 2], Characteristics::distinct());
        let right = IntColumn::from_options([None, Some(2), None, Some(1)]).unwrap();

        let join = intersect_left_sorted(&left, &right).unwrap();
        assert_eq!(join.left_rows(), &[1, 0]);
        assert_eq!(join.right_rows().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn left_must_be_distinct() {
        let left = column(&[1, 1], Characteristics::sorted());
        let right = column(&[1], Characteristics::distinct());
        assert!(matches!(
            intersect_left_sorted(&left, &right),
            Err(Error::UnsupportedOperation(_))
        ));
        assert!(intersect_both_sorted(&right, &left).is_err());
    }

    #[test]
    fn both_sorted_on_views() {
        let left = column(&[0, 2, 4, 6, 8, 10, 12], Characteristics::distinct())
            .sub_column(1, 7)
            .unwrap();
        let right = column(&[1, 4, 5, 6, 12, 13], Characteristics::distinct());

        let intersection = intersect_both_sorted(&left, &right).unwrap();
        assert_eq!(intersection.cardinality(), 3);
        assert_eq!(
            intersection.apply_left(&left).unwrap(),
            column(&[4, 6, 12], Characteristics::none())
        );
        assert_eq!(
            intersection.apply_right(&right).unwrap(),
            column(&[4, 6, 12], Characteristics::none())
        );
    }

    #[test]
    fn outer_join_pads_with_nulls() {
        let left = StringColumn::from_values(
            ["a", "b", "c"].map(String::from),
            Characteristics::distinct(),
        )
        .unwrap();
        let right =
            StringColumn::from_values(["c", "a", "c"].map(String::from), Characteristics::none())
                .unwrap();

        let join = left_outer_join(&left, &right).unwrap();
        assert_eq!(
            join.rows(),
            &[(2, Some(0)), (0, Some(1)), (2, Some(2)), (1, None)]
        );

        let padded = join.apply_right(&right).unwrap();
        assert_eq!(padded.null_count(), 1);
        assert_eq!(padded.get(3), None);
        assert_eq!(join.apply_left(&left).unwrap().get(3), Some("b".to_string()));
    }

    #[quickcheck]
    fn intersection_matches_sets(mut left: Vec<i16>, mut right: Vec<i16>) -> bool {
        for values in [&mut left, &mut right] {
            values.sort();
            values.dedup();
        }
        let expected = left.iter().filter(|value| right.contains(value)).count();

        let to_column = |values: &[i16]| {
            IntColumn::from_values(values.iter().map(|&v| i32::from(v)), Characteristics::distinct())
                .unwrap()
        };
        let intersection = intersect_both_sorted(&to_column(&left), &to_column(&right)).unwrap();

        intersection.cardinality() == expected
    }
}
