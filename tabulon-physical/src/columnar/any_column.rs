//! This module defines [AnyColumn], a column whose element type is only known at runtime,
//! and [AnyValue], a single entry of such a column.

use std::fmt::Display;

use crate::{
    bitmap::BitmapSlice,
    datatypes::{ElementType, Id128, Instant},
    error::{Error, Result},
    management::ByteSized,
};

use super::{
    characteristics::Characteristics,
    column::{
        BooleanColumn, ByteColumn, BytesColumn, Column, DictStringColumn, DoubleColumn,
        FloatColumn, Id128Column, InstantColumn, IntColumn, LongColumn, ShortColumn, StringColumn,
    },
};

/// Column of any supported [ElementType].
#[derive(Debug, Clone)]
pub enum AnyColumn {
    /// Column of [bool]
    Boolean(BooleanColumn),
    /// Column of [i8]
    Byte(ByteColumn),
    /// Column of [i16]
    Short(ShortColumn),
    /// Column of [i32]
    Int(IntColumn),
    /// Column of [i64]
    Long(LongColumn),
    /// Column of [f32]
    Float(FloatColumn),
    /// Column of [f64]
    Double(DoubleColumn),
    /// Column of strings
    String(StringColumn),
    /// Column of byte arrays
    Bytes(BytesColumn),
    /// Column of dictionary encoded strings
    DictString(DictStringColumn),
    /// Column of [Id128]
    Id128(Id128Column),
    /// Column of [Instant]
    Instant(InstantColumn),
}

/// Evaluate `$body` for the column inside any variant.
macro_rules! dispatch {
    (@arms $column:expr, $name:ident => $body:expr; $($variant:ident),*) => {
        match $column {
            $(AnyColumn::$variant($name) => $body,)*
        }
    };
    ($column:expr, $name:ident => $body:expr) => {
        dispatch!(@arms $column, $name => $body;
            Boolean, Byte, Short, Int, Long, Float, Double, String, Bytes, DictString, Id128, Instant)
    };
}

/// Evaluate `$body` for the column inside any variant and wrap the result in the same variant.
macro_rules! map_column {
    (@arms $column:expr, $name:ident => $body:expr; $($variant:ident),*) => {
        match $column {
            $(AnyColumn::$variant($name) => AnyColumn::$variant($body),)*
        }
    };
    ($column:expr, $name:ident => $body:expr) => {
        map_column!(@arms $column, $name => $body;
            Boolean, Byte, Short, Int, Long, Float, Double, String, Bytes, DictString, Id128, Instant)
    };
}

/// Evaluate `$body` for two columns of the same variant, or `$mismatch` otherwise.
macro_rules! dispatch_pair {
    (@arms $left:expr, $right:expr, ($l:ident, $r:ident) => $body:expr, $mismatch:expr;
        $($variant:ident),*) => {
        match ($left, $right) {
            $((AnyColumn::$variant($l), AnyColumn::$variant($r)) => $body,)*
            _ => $mismatch,
        }
    };
    ($left:expr, $right:expr, ($l:ident, $r:ident) => $body:expr, _ => $mismatch:expr) => {
        dispatch_pair!(@arms $left, $right, ($l, $r) => $body, $mismatch;
            Boolean, Byte, Short, Int, Long, Float, Double, String, Bytes, DictString, Id128, Instant)
    };
}

impl AnyColumn {
    /// Create an empty column of the given type.
    pub fn empty(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Boolean => Self::Boolean(Column::empty()),
            ElementType::Byte => Self::Byte(Column::empty()),
            ElementType::Short => Self::Short(Column::empty()),
            ElementType::Int => Self::Int(Column::empty()),
            ElementType::Long => Self::Long(Column::empty()),
            ElementType::Float => Self::Float(Column::empty()),
            ElementType::Double => Self::Double(Column::empty()),
            ElementType::String => Self::String(Column::empty()),
            ElementType::Bytes => Self::Bytes(Column::empty()),
            ElementType::DictString => Self::DictString(Column::empty()),
            ElementType::Id128 => Self::Id128(Column::empty()),
            ElementType::Instant => Self::Instant(Column::empty()),
        }
    }

    /// Element type of this column.
    pub fn element_type(&self) -> ElementType {
        dispatch!(self, column => column.element_type())
    }

    /// Number of entries, including nulls.
    pub fn len(&self) -> usize {
        dispatch!(self, column => column.len())
    }

    /// Return `true` if this column has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return `true` if the entry at `index` is null.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn is_null(&self, index: usize) -> bool {
        dispatch!(self, column => column.is_null(index))
    }

    /// Number of nulls.
    pub fn null_count(&self) -> usize {
        dispatch!(self, column => column.null_count())
    }

    /// Guarantees of this column.
    pub fn characteristics(&self) -> Characteristics {
        dispatch!(self, column => column.characteristics())
    }

    /// Return the entry at `index`, or `None` if it is null.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn get(&self, index: usize) -> Option<AnyValue> {
        dispatch!(self, column => column.get(index).map(AnyValue::from))
    }

    /// Textual representation of the entry at `index`, `null` for nulls.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn display_value(&self, index: usize) -> String {
        self.get(index)
            .map_or_else(|| "null".to_string(), |value| value.to_string())
    }

    /// Iterate over all entries, with `None` for nulls.
    pub fn iter(&self) -> impl Iterator<Item = Option<AnyValue>> + '_ {
        (0..self.len()).map(|index| self.get(index))
    }

    /// See [Column::sub_column].
    pub fn sub_column(&self, from: usize, to: usize) -> Result<Self> {
        Ok(map_column!(self, column => column.sub_column(from, to)?))
    }

    /// See [Column::head].
    pub fn head(&self, count: usize) -> Self {
        map_column!(self, column => column.head(count))
    }

    /// See [Column::tail].
    pub fn tail(&self, count: usize) -> Self {
        map_column!(self, column => column.tail(count))
    }

    /// Return the entries of this column followed by those of `tail`.
    ///
    /// Returns an error if the element types differ, see also [Column::append].
    pub fn append(&self, tail: &Self) -> Result<Self> {
        dispatch_pair!(self, tail, (head, tail) => head.append(tail).map(Self::from), _ => {
            Err(Error::TypeMismatch {
                expected: self.element_type(),
                found: tail.element_type(),
            })
        })
    }

    /// See [Column::slice].
    pub fn slice(&self) -> Self {
        map_column!(self, column => column.slice())
    }

    /// See [Column::copy].
    pub fn copy(&self) -> Self {
        map_column!(self, column => column.copy())
    }

    /// See [Column::apply_filter].
    pub fn apply_filter(&self, keep: &BitmapSlice, cardinality: usize) -> Result<Self> {
        Ok(map_column!(self, column => column.apply_filter(keep, cardinality)?))
    }

    /// See [Column::select].
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        Ok(map_column!(self, column => column.select(indices)?))
    }

    /// See [Column::select_optional].
    pub fn select_optional(&self, indices: &[Option<usize>]) -> Result<Self> {
        Ok(map_column!(self, column => column.select_optional(indices)?))
    }

    /// See [Column::to_sorted].
    pub fn to_sorted(&self) -> Result<Self> {
        Ok(map_column!(self, column => column.to_sorted()?))
    }

    /// See [Column::to_distinct].
    pub fn to_distinct(&self) -> Result<Self> {
        Ok(map_column!(self, column => column.to_distinct()?))
    }

    /// See [Column::is_heap].
    pub fn is_heap(&self) -> bool {
        dispatch!(self, column => column.is_heap())
    }

    /// See [Column::to_heap].
    pub fn to_heap(&self) -> Self {
        map_column!(self, column => column.to_heap())
    }

    /// See [Column::verify_characteristics].
    pub fn verify_characteristics(&self) -> Result<()> {
        dispatch!(self, column => column.verify_characteristics())
    }

    /// Compare the entries of two columns, ignoring how they are stored.
    ///
    /// Unlike `==`, a string column equals a dictionary encoded column
    /// with the same strings.
    pub fn values_equal(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl PartialEq for AnyColumn {
    fn eq(&self, other: &Self) -> bool {
        if matches!(
            (self, other),
            (Self::String(_), Self::DictString(_)) | (Self::DictString(_), Self::String(_))
        ) {
            return false;
        }

        dispatch_pair!(self, other, (left, right) => left == right, _ => false)
    }
}

impl ByteSized for AnyColumn {
    fn size_bytes(&self) -> u64 {
        dispatch!(self, column => column.size_bytes())
    }
}

macro_rules! any_column_from {
    ($($variant:ident($column:ty)),*) => {
        $(
            impl From<$column> for AnyColumn {
                fn from(column: $column) -> Self {
                    Self::$variant(column)
                }
            }
        )*
    };
}

any_column_from!(
    Boolean(BooleanColumn),
    Byte(ByteColumn),
    Short(ShortColumn),
    Int(IntColumn),
    Long(LongColumn),
    Float(FloatColumn),
    Double(DoubleColumn),
    String(StringColumn),
    Bytes(BytesColumn),
    DictString(DictStringColumn),
    Id128(Id128Column),
    Instant(InstantColumn)
);

/// Single non-null entry of an [AnyColumn].
///
/// Dictionary encoded strings are represented as [AnyValue::String].
#[derive(Debug, Clone, PartialEq)]
pub enum AnyValue {
    /// A [bool]
    Boolean(bool),
    /// An [i8]
    Byte(i8),
    /// An [i16]
    Short(i16),
    /// An [i32]
    Int(i32),
    /// An [i64]
    Long(i64),
    /// An [f32]
    Float(f32),
    /// An [f64]
    Double(f64),
    /// A string
    String(String),
    /// A byte array
    Bytes(Vec<u8>),
    /// An [Id128]
    Id128(Id128),
    /// An [Instant]
    Instant(Instant),
}

macro_rules! any_value_from {
    ($($variant:ident($value:ty)),*) => {
        $(
            impl From<$value> for AnyValue {
                fn from(value: $value) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

any_value_from!(
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Id128(Id128),
    Instant(Instant)
);

impl Display for AnyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyValue::Boolean(value) => write!(f, "{value}"),
            AnyValue::Byte(value) => write!(f, "{value}"),
            AnyValue::Short(value) => write!(f, "{value}"),
            AnyValue::Int(value) => write!(f, "{value}"),
            AnyValue::Long(value) => write!(f, "{value}"),
            AnyValue::Float(value) => write!(f, "{value}"),
            AnyValue::Double(value) => write!(f, "{value}"),
            AnyValue::String(value) => write!(f, "{value}"),
            AnyValue::Bytes(value) => {
                write!(f, "0x")?;
                value.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
            }
            AnyValue::Id128(value) => write!(f, "{value}"),
            AnyValue::Instant(value) => write!(f, "{value}"),
        }
    }
}
