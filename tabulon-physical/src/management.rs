//! This module collects functionality surrounding
//! the management of the memory held by columns.

pub mod bytesized;
pub use bytesized::ByteSized;
