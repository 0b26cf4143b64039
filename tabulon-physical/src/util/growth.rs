//! Amortized capacity growth for builders.

/// Computes the capacity a staging buffer should grow to
/// when it holds `current` elements and must hold at least `required`.
///
/// The buffer grows by half of its size plus one. If that is still not enough,
/// the next power of two above `required` is used instead, so that a sequence
/// of appends copies every element only a constant number of times.
pub(crate) fn grow_capacity(current: usize, required: usize) -> usize {
    if required <= current {
        return current;
    }

    let grown = current.saturating_add(current / 2).saturating_add(1);
    if grown >= required {
        grown
    } else {
        required.checked_next_power_of_two().unwrap_or(required)
    }
}

#[cfg(test)]
mod test {
    use super::grow_capacity;

    #[test]
    fn grows_by_half_plus_one() {
        assert_eq!(grow_capacity(0, 1), 1);
        assert_eq!(grow_capacity(1, 2), 2);
        assert_eq!(grow_capacity(10, 11), 16);
        assert_eq!(grow_capacity(100, 150), 151);
    }

    #[test]
    fn jumps_to_power_of_two() {
        assert_eq!(grow_capacity(10, 100), 128);
        assert_eq!(grow_capacity(0, 1000), 1024);
        assert_eq!(grow_capacity(3, 64), 64);
    }

    #[test]
    fn keeps_sufficient_capacity() {
        assert_eq!(grow_capacity(20, 5), 20);
        assert_eq!(grow_capacity(20, 20), 20);
    }

    #[test]
    fn total_copies_are_linear() {
        let mut capacity = 0;
        let mut copied = 0;
        for len in 1..=100_000usize {
            if len > capacity {
                copied += capacity;
                capacity = grow_capacity(capacity, len);
            }
        }
        assert!(copied < 4 * 100_000);
    }
}
