//! In-place heap sort over anything that can compare and swap positions.

use std::{cmp::Ordering, ops::Range};

/// Positional access needed by [heap_sort].
///
/// Implemented by staging areas of fixed-width payloads,
/// which can be reordered without knowing their element type.
pub(crate) trait HeapSortable {
    /// Compare the elements at positions `i` and `j`.
    fn compare_at(&self, i: usize, j: usize) -> Ordering;

    /// Exchange the elements at positions `i` and `j`.
    fn swap(&mut self, i: usize, j: usize);
}

/// Sorts the positions in `range` of `data` in ascending order.
///
/// Builds a max-heap over the range and then repeatedly moves the root
/// behind the unsorted prefix. Runs in O(n log n) without extra memory.
pub(crate) fn heap_sort<H: HeapSortable + ?Sized>(data: &mut H, range: Range<usize>) {
    let len = range.len();
    if len < 2 {
        return;
    }
    let base = range.start;

    for root in (0..len / 2).rev() {
        sift_down(data, base, root, len);
    }

    for end in (1..len).rev() {
        data.swap(base, base + end);
        sift_down(data, base, 0, end);
    }
}

fn sift_down<H: HeapSortable + ?Sized>(data: &mut H, base: usize, mut root: usize, end: usize) {
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            return;
        }
        if child + 1 < end && data.compare_at(base + child, base + child + 1) == Ordering::Less {
            child += 1;
        }
        if data.compare_at(base + root, base + child) != Ordering::Less {
            return;
        }
        data.swap(base + root, base + child);
        root = child;
    }
}

/// A permutation of positions that is sorted by a comparison on the original positions.
///
/// Used for payloads that cannot be swapped in place,
/// like variable-length values.
pub(crate) struct SortPermutation<F> {
    pub(crate) positions: Vec<usize>,
    compare: F,
}

impl<F> std::fmt::Debug for SortPermutation<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortPermutation")
            .field("positions", &self.positions)
            .finish()
    }
}

impl<F> SortPermutation<F>
where
    F: Fn(usize, usize) -> Ordering,
{
    /// Sorts the positions in `range` according to `compare`.
    pub(crate) fn sorted(range: Range<usize>, compare: F) -> Vec<usize> {
        let len = range.len();
        let mut permutation = Self {
            positions: range.collect(),
            compare,
        };
        heap_sort(&mut permutation, 0..len);
        permutation.positions
    }
}

impl<F> HeapSortable for SortPermutation<F>
where
    F: Fn(usize, usize) -> Ordering,
{
    fn compare_at(&self, i: usize, j: usize) -> Ordering {
        (self.compare)(self.positions[i], self.positions[j])
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.positions.swap(i, j);
    }
}
