//! This module collects data structures and operations on individual columns.

pub mod any_column;
pub mod builder;
pub mod characteristics;
pub mod column;
pub mod join;
pub(crate) mod nulls;
pub mod search;
pub mod storage;

pub use column::{
    BooleanColumn, ByteColumn, BytesColumn, DictStringColumn, DoubleColumn, FloatColumn,
    Id128Column, InstantColumn, IntColumn, LongColumn, ShortColumn, StringColumn,
};
