use std::{cmp::Ordering, fmt::Debug};

use crate::buffer::ByteOrder;

use super::ElementType;

/// Values that occupy the same number of bytes in every position of a buffer.
pub trait FixedWidth: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// Number of bytes of one value
    const WIDTH: usize;

    /// Read a value from the first [FixedWidth::WIDTH] bytes of `bytes`.
    fn decode(bytes: &[u8], order: ByteOrder) -> Self;

    /// Append the bytes of this value to `out`.
    fn encode(self, out: &mut Vec<u8>, order: ByteOrder);

    /// Total order on values.
    fn compare(&self, other: &Self) -> Ordering;
}

/// [FixedWidth] values that are element types of a column in their own right.
pub trait Primitive: FixedWidth {
    /// Corresponding [ElementType]
    const ELEMENT_TYPE: ElementType;
}

macro_rules! impl_fixed_width {
    ($type:ty, $compare:ident) => {
        impl FixedWidth for $type {
            const WIDTH: usize = size_of::<$type>();

            fn decode(bytes: &[u8], order: ByteOrder) -> Self {
                let mut raw = [0u8; size_of::<$type>()];
                raw.copy_from_slice(&bytes[..size_of::<$type>()]);
                match order {
                    ByteOrder::Big => <$type>::from_be_bytes(raw),
                    ByteOrder::Little => <$type>::from_le_bytes(raw),
                }
            }

            fn encode(self, out: &mut Vec<u8>, order: ByteOrder) {
                match order {
                    ByteOrder::Big => out.extend_from_slice(&self.to_be_bytes()),
                    ByteOrder::Little => out.extend_from_slice(&self.to_le_bytes()),
                }
            }

            fn compare(&self, other: &Self) -> Ordering {
                self.$compare(other)
            }
        }
    };
}

impl_fixed_width!(i8, cmp);
impl_fixed_width!(i16, cmp);
impl_fixed_width!(i32, cmp);
impl_fixed_width!(i64, cmp);
impl_fixed_width!(u8, cmp);
impl_fixed_width!(u16, cmp);
impl_fixed_width!(u32, cmp);
impl_fixed_width!(f32, total_cmp);
impl_fixed_width!(f64, total_cmp);

impl FixedWidth for bool {
    const WIDTH: usize = 1;

    fn decode(bytes: &[u8], _order: ByteOrder) -> Self {
        bytes[0] != 0
    }

    fn encode(self, out: &mut Vec<u8>, _order: ByteOrder) {
        out.push(u8::from(self));
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

macro_rules! impl_primitive {
    ($type:ty, $element_type:ident) => {
        impl Primitive for $type {
            const ELEMENT_TYPE: ElementType = ElementType::$element_type;
        }
    };
}

impl_primitive!(bool, Boolean);
impl_primitive!(i8, Byte);
impl_primitive!(i16, Short);
impl_primitive!(i32, Int);
impl_primitive!(i64, Long);
impl_primitive!(f32, Float);
impl_primitive!(f64, Double);

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use quickcheck_macros::quickcheck;

    use crate::buffer::ByteOrder;

    use super::FixedWidth;

    #[test]
    fn encodes_in_requested_order() {
        let mut big = Vec::new();
        0x0102_0304i32.encode(&mut big, ByteOrder::Big);
        assert_eq!(big, vec![1, 2, 3, 4]);

        let mut little = Vec::new();
        0x0102_0304i32.encode(&mut little, ByteOrder::Little);
        assert_eq!(little, vec![4, 3, 2, 1]);

        assert_eq!(i32::decode(&little, ByteOrder::Little), 0x0102_0304);
    }

    #[test]
    fn floats_are_totally_ordered() {
        assert_eq!(f64::NAN.compare(&f64::NAN), Ordering::Equal);
        assert_eq!((-0.0f32).compare(&0.0), Ordering::Less);
        assert_eq!(1.5f64.compare(&f64::INFINITY), Ordering::Less);
    }

    #[test]
    fn booleans_use_one_byte() {
        let mut out = Vec::new();
        true.encode(&mut out, ByteOrder::Big);
        false.encode(&mut out, ByteOrder::Big);
        assert_eq!(out, vec![1, 0]);
        assert!(bool::decode(&[7], ByteOrder::Little));
    }

    #[quickcheck]
    fn decode_inverts_encode(value: i64, little: bool) -> bool {
        let order = if little {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };
        let mut out = Vec::new();
        value.encode(&mut out, order);
        out.len() == i64::WIDTH && i64::decode(&out, order) == value
    }
}
