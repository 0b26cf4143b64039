//! This module collects miscellaneous functionality.

pub(crate) mod bitset;
pub(crate) mod growth;
pub(crate) mod heapsort;
