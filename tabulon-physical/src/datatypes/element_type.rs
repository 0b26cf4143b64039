use std::fmt::Display;

/// Number of element types
pub(crate) const NUM_ELEMENT_TYPES: usize = 12;

/// Descriptors to refer to the possible element types of a column at runtime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    /// Data type [`bool`], stored in one byte
    Boolean,
    /// Data type [`i8`]
    Byte,
    /// Data type [`i16`]
    Short,
    /// Data type [`i32`]
    Int,
    /// Data type [`i64`]
    Long,
    /// Data type [`f32`], ordered by [`f32::total_cmp`]
    Float,
    /// Data type [`f64`], ordered by [`f64::total_cmp`]
    Double,
    /// UTF-8 strings of arbitrary length
    String,
    /// Byte arrays of arbitrary length
    Bytes,
    /// Strings stored as small integer codes into a table of distinct values
    DictString,
    /// 128-bit identifiers stored as two [`i64`] columns
    Id128,
    /// Points in time stored as an [`i64`] column of seconds and an [`i32`] column of nanoseconds
    Instant,
}

/// A list of [ElementType],
/// in the order they appear in the enum.
pub const ELEMENT_TYPES: [ElementType; NUM_ELEMENT_TYPES] = [
    ElementType::Boolean,
    ElementType::Byte,
    ElementType::Short,
    ElementType::Int,
    ElementType::Long,
    ElementType::Float,
    ElementType::Double,
    ElementType::String,
    ElementType::Bytes,
    ElementType::DictString,
    ElementType::Id128,
    ElementType::Instant,
];

/// Physical layout used to store the elements of a type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Layout {
    /// Every element occupies the given number of bytes
    Fixed(usize),
    /// Elements are byte ranges described by a pointer array
    Variable,
    /// Elements are split into two fixed-width columns
    Composite,
    /// Elements are codes into a table of distinct values
    Dictionary,
}

impl ElementType {
    /// Name of this type in the binary format.
    pub fn type_code(&self) -> &'static str {
        match self {
            ElementType::Boolean => "BOOLEAN",
            ElementType::Byte => "BYTE",
            ElementType::Short => "SHORT",
            ElementType::Int => "INT",
            ElementType::Long => "LONG",
            ElementType::Float => "FLOAT",
            ElementType::Double => "DOUBLE",
            ElementType::String => "STRING",
            ElementType::Bytes => "BYTES",
            ElementType::DictString => "DICT_STRING",
            ElementType::Id128 => "ID128",
            ElementType::Instant => "INSTANT",
        }
    }

    /// Return the [ElementType] with the given name in the binary format.
    pub fn from_type_code(code: &str) -> Option<Self> {
        ELEMENT_TYPES
            .iter()
            .copied()
            .find(|element_type| element_type.type_code() == code)
    }

    /// Physical layout of this type.
    pub fn layout(&self) -> Layout {
        match self {
            ElementType::Boolean | ElementType::Byte => Layout::Fixed(1),
            ElementType::Short => Layout::Fixed(2),
            ElementType::Int | ElementType::Float => Layout::Fixed(4),
            ElementType::Long | ElementType::Double => Layout::Fixed(8),
            ElementType::String | ElementType::Bytes => Layout::Variable,
            ElementType::DictString => Layout::Dictionary,
            ElementType::Id128 | ElementType::Instant => Layout::Composite,
        }
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_code())
    }
}

#[cfg(test)]
mod test {
    use super::{ElementType, Layout, ELEMENT_TYPES};

    #[test]
    fn type_codes_are_unique_and_reversible() {
        for element_type in ELEMENT_TYPES {
            assert_eq!(
                ElementType::from_type_code(element_type.type_code()),
                Some(element_type)
            );
        }
        assert_eq!(ElementType::from_type_code("VARCHAR"), None);
    }

    #[test]
    fn layouts() {
        assert_eq!(ElementType::Long.layout(), Layout::Fixed(8));
        assert_eq!(ElementType::Bytes.layout(), Layout::Variable);
        assert_eq!(ElementType::Instant.layout(), Layout::Composite);
    }
}
