use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
};

use super::{ElementType, FixedWidth};

/// Values that are stored as two aligned fixed-width columns.
///
/// Values are ordered lexicographically, first by [Composite::First],
/// then by [Composite::Second].
pub trait Composite: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// Type of the first component
    type First: FixedWidth;
    /// Type of the second component
    type Second: FixedWidth;

    /// Corresponding [ElementType]
    const ELEMENT_TYPE: ElementType;

    /// Split this value into its components.
    fn split(self) -> (Self::First, Self::Second);

    /// Combine two components into a value.
    fn join(first: Self::First, second: Self::Second) -> Self;

    /// Lexicographic comparison of the components.
    fn compare(&self, other: &Self) -> Ordering {
        let (first, second) = self.split();
        let (other_first, other_second) = other.split();
        first
            .compare(&other_first)
            .then_with(|| second.compare(&other_second))
    }
}

/// 128-bit identifier, e.g. a UUID, split into its signed high and low halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Id128 {
    /// Most significant 64 bits
    pub high: i64,
    /// Least significant 64 bits
    pub low: i64,
}

impl Id128 {
    /// Create an identifier from its two halves.
    pub fn new(high: i64, low: i64) -> Self {
        Self { high, low }
    }

    /// The identifier as an unsigned 128-bit number.
    #[allow(clippy::cast_sign_loss)]
    pub fn as_u128(&self) -> u128 {
        (u128::from(self.high as u64) << 64) | u128::from(self.low as u64)
    }
}

impl From<u128> for Id128 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn from(value: u128) -> Self {
        Self {
            high: (value >> 64) as u64 as i64,
            low: value as u64 as i64,
        }
    }
}

impl Display for Id128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.as_u128();
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            value >> 96,
            (value >> 80) & 0xffff,
            (value >> 64) & 0xffff,
            (value >> 48) & 0xffff,
            value & 0xffff_ffff_ffff
        )
    }
}

impl Composite for Id128 {
    type First = i64;
    type Second = i64;

    const ELEMENT_TYPE: ElementType = ElementType::Id128;

    fn split(self) -> (i64, i64) {
        (self.high, self.low)
    }

    fn join(first: i64, second: i64) -> Self {
        Self::new(first, second)
    }
}

/// Point in time as seconds since the epoch plus a nanosecond adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Instant {
    /// Seconds since 1970-01-01T00:00:00Z
    pub seconds: i64,
    /// Nanoseconds within the second, in `0..1_000_000_000`
    pub nanos: i32,
}

impl Instant {
    /// Create an instant, normalizing `nanos` into the range of one second.
    pub fn new(seconds: i64, nanos: i64) -> Self {
        let seconds = seconds + nanos.div_euclid(1_000_000_000);
        #[allow(clippy::cast_possible_truncation)]
        let nanos = nanos.rem_euclid(1_000_000_000) as i32;
        Self { seconds, nanos }
    }
}

impl Display for Instant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}s", self.seconds, self.nanos)
    }
}

impl Composite for Instant {
    type First = i64;
    type Second = i32;

    const ELEMENT_TYPE: ElementType = ElementType::Instant;

    fn split(self) -> (i64, i32) {
        (self.seconds, self.nanos)
    }

    fn join(first: i64, second: i32) -> Self {
        Self {
            seconds: first,
            nanos: second,
        }
    }
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use super::{Composite, Id128, Instant};

    #[test]
    fn id128_formats_like_uuid() {
        let id = Id128::from(0x0123_4567_89ab_cdef_0011_2233_4455_6677u128);
        assert_eq!(id.to_string(), "01234567-89ab-cdef-0011-223344556677");
        assert_eq!(id.as_u128(), 0x0123_4567_89ab_cdef_0011_2233_4455_6677u128);
    }

    #[test]
    fn composite_order_is_lexicographic() {
        let a = Id128::new(1, 9);
        let b = Id128::new(2, 0);
        let c = Id128::new(2, 1);
        assert_eq!(Composite::compare(&a, &b), Ordering::Less);
        assert_eq!(Composite::compare(&c, &b), Ordering::Greater);
        assert_eq!(Composite::compare(&c, &c), Ordering::Equal);
    }

    #[test]
    fn instant_normalizes_nanos() {
        assert_eq!(Instant::new(10, 1_500_000_000), Instant::join(11, 500_000_000));
        assert_eq!(Instant::new(10, -1), Instant::join(9, 999_999_999));
        assert_eq!(Instant::new(3, 5).to_string(), "3.000000005s");
    }
}
