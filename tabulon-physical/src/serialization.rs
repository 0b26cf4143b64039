//! This module implements the versioned binary format for columns and tables.
//!
//! All header integers are big endian. Column payloads carry a byte order
//! marker and are otherwise written in the byte order of their buffers,
//! which allows memory mapped files to be used without decoding.

pub mod codec;
pub mod container;
pub mod io;
pub(crate) mod legacy;

pub use container::{NamedColumn, TableFile};

use crate::{
    buffer::ByteOrder,
    error::{Error, Result},
};

/// Bytes every table file starts with
pub const MAGIC: [u8; 8] = *b"TABULON\0";

/// Format version written by this crate
pub const CURRENT_VERSION: i32 = 2;

/// Oldest format version that can still be read
pub const OLDEST_VERSION: i32 = 1;

/// Default upper bound on the size of one payload chunk
pub const MAX_CHUNK_BYTES: usize = 1 << 30;

/// Configuration for writing columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Byte order of the written payloads, `None` to keep the order of each column
    pub byte_order: Option<ByteOrder>,
    /// Payloads larger than this are split into several chunks
    pub max_chunk_bytes: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            byte_order: None,
            max_chunk_bytes: MAX_CHUNK_BYTES,
        }
    }
}

impl WriteOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_chunk_bytes == 0 || self.max_chunk_bytes > i64::MAX as usize {
            return Err(Error::invalid_argument(format!(
                "chunk size {} is out of range",
                self.max_chunk_bytes
            )));
        }
        Ok(())
    }
}

/// Where the payloads of a read column live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadMode {
    /// Copy payloads into heap buffers
    #[default]
    Heap,
    /// Map the file into memory and let columns refer to it
    Mapped,
}

/// Configuration for reading tables from files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// How payloads are loaded
    pub mode: ReadMode,
    /// Check the declared characteristics of every column against its values.
    ///
    /// A violated declaration makes the read fail with [Error::Corrupt].
    /// Without the check, opening a mapped file does not touch the payloads.
    pub verify_characteristics: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            mode: ReadMode::Heap,
            verify_characteristics: true,
        }
    }
}

impl ReadOptions {
    /// Options for reading into the heap, checking characteristics.
    pub fn heap() -> Self {
        Self::default()
    }

    /// Options for mapping the file into memory.
    pub fn mapped() -> Self {
        Self {
            mode: ReadMode::Mapped,
            ..Self::default()
        }
    }

    /// These options, with characteristics taken as declared.
    pub fn trusting(self) -> Self {
        Self {
            verify_characteristics: false,
            ..self
        }
    }
}
