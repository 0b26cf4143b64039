//! This crate defines the physical layer of tabulon: immutable, typed columns
//! over shared byte buffers, together with the algorithms that operate on them
//! (search, filtering, gathering, appending, merge joins) and the versioned
//! binary format used to persist them.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

pub mod bitmap;
pub mod buffer;
pub mod columnar;
pub mod datatypes;
pub mod error;
pub mod management;
pub mod serialization;
pub mod util;

pub use columnar::{
    any_column::{AnyColumn, AnyValue},
    builder::{Builder, BuilderOptions, ColumnBuilder, Validation},
    characteristics::Characteristics,
    column::Column,
    search::{Hone, SearchOutcome},
};
pub use error::{Error, Result};
