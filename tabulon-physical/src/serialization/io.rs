//! Low-level reading and writing of the primitives of the binary format.

use std::{
    io::{ErrorKind, Read, Write},
    sync::Arc,
};

use memmap2::Mmap;

use crate::{
    buffer::{ByteOrder, SharedBuffer},
    error::{Error, Result},
};

/// Origin of serialized bytes.
pub trait Source {
    /// Read the next `len` bytes into a buffer of the given byte order.
    fn take(&mut self, len: usize, order: ByteOrder) -> Result<SharedBuffer>;

    /// Fill `bytes` with the next bytes.
    fn read_into(&mut self, bytes: &mut [u8]) -> Result<()>;

    /// Read a single byte.
    fn read_u8(&mut self) -> Result<u8> {
        let mut bytes = [0; 1];
        self.read_into(&mut bytes)?;
        Ok(bytes[0])
    }

    /// Read a big endian `i32`.
    fn read_i32(&mut self) -> Result<i32> {
        let mut bytes = [0; 4];
        self.read_into(&mut bytes)?;
        Ok(i32::from_be_bytes(bytes))
    }

    /// Read a big endian `i64`.
    fn read_i64(&mut self) -> Result<i64> {
        let mut bytes = [0; 8];
        self.read_into(&mut bytes)?;
        Ok(i64::from_be_bytes(bytes))
    }

    /// Read a big endian `u64`.
    fn read_u64(&mut self) -> Result<u64> {
        let mut bytes = [0; 8];
        self.read_into(&mut bytes)?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Read a non-negative `i32` count.
    fn read_count(&mut self, what: &str) -> Result<usize> {
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| Error::corrupt(format!("negative {what} {count}")))
    }

    /// Read an `i32` length prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_count("string length")?;
        let buffer = self.take(len, ByteOrder::Big)?;
        String::from_utf8(buffer.bytes().to_vec())
            .map_err(|error| Error::corrupt(format!("string is not valid UTF-8: {error}")))
    }
}

fn truncated(error: std::io::Error) -> Error {
    if error.kind() == ErrorKind::UnexpectedEof {
        Error::corrupt("unexpected end of input")
    } else {
        Error::Io(error)
    }
}

/// [Source] reading from a stream into fresh heap buffers.
#[derive(Debug)]
pub struct StreamSource<R> {
    reader: R,
}

impl<R: Read> StreamSource<R> {
    /// Read from `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> Source for StreamSource<R> {
    fn take(&mut self, len: usize, order: ByteOrder) -> Result<SharedBuffer> {
        // A corrupt length must not allocate more than the input actually holds
        let mut bytes = Vec::<u8>::new();
        (&mut self.reader)
            .take(len as u64)
            .read_to_end(&mut bytes)
            .map_err(truncated)?;
        if bytes.len() != len {
            return Err(Error::corrupt(format!(
                "expected {len} bytes, input ended after {}",
                bytes.len()
            )));
        }

        Ok(SharedBuffer::from_vec(bytes, order))
    }

    fn read_into(&mut self, bytes: &mut [u8]) -> Result<()> {
        self.reader.read_exact(bytes).map_err(truncated)
    }
}

/// [Source] handing out views into a memory mapped file.
#[derive(Debug)]
pub struct MappedSource {
    map: Arc<Mmap>,
    position: usize,
}

impl MappedSource {
    /// Read from the start of `map`.
    pub fn new(map: Arc<Mmap>) -> Self {
        Self { map, position: 0 }
    }

    fn advance(&mut self, len: usize) -> Result<std::ops::Range<usize>> {
        let start = self.position;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.map.len())
            .ok_or_else(|| {
                Error::corrupt(format!(
                    "expected {len} bytes at offset {start}, file has {}",
                    self.map.len()
                ))
            })?;
        self.position = end;
        Ok(start..end)
    }
}

impl Source for MappedSource {
    fn take(&mut self, len: usize, order: ByteOrder) -> Result<SharedBuffer> {
        let range = self.advance(len)?;
        Ok(SharedBuffer::mapped(self.map.clone(), range, order))
    }

    fn read_into(&mut self, bytes: &mut [u8]) -> Result<()> {
        let range = self.advance(bytes.len())?;
        bytes.copy_from_slice(&self.map[range]);
        Ok(())
    }
}

pub(crate) fn write_u8<W: Write + ?Sized>(writer: &mut W, value: u8) -> Result<()> {
    writer.write_all(&[value])?;
    Ok(())
}

pub(crate) fn write_i32<W: Write + ?Sized>(writer: &mut W, value: i32) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub(crate) fn write_i64<W: Write + ?Sized>(writer: &mut W, value: i64) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub(crate) fn write_u64<W: Write + ?Sized>(writer: &mut W, value: u64) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// Write a count that has to fit into an `i32`.
pub(crate) fn write_count<W: Write + ?Sized>(writer: &mut W, count: usize, what: &str) -> Result<()> {
    let count = i32::try_from(count)
        .map_err(|_| Error::invalid_argument(format!("{what} {count} exceeds the format limit")))?;
    write_i32(writer, count)
}

pub(crate) fn write_string<W: Write + ?Sized>(writer: &mut W, value: &str) -> Result<()> {
    write_count(writer, value.len(), "string length")?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Write `bytes` as a sequence of chunks of at most `max_chunk_bytes`.
pub(crate) fn write_chunks<W: Write + ?Sized>(
    writer: &mut W,
    bytes: &[u8],
    max_chunk_bytes: usize,
) -> Result<()> {
    let chunks = bytes.len().div_ceil(max_chunk_bytes);
    write_count(writer, chunks, "chunk count")?;
    for chunk in bytes.chunks(max_chunk_bytes) {
        write_i64(writer, chunk.len() as i64)?;
        writer.write_all(chunk)?;
    }
    Ok(())
}

/// Read a sequence of chunks written by [write_chunks].
///
/// A single chunk is returned as is, several chunks are joined on the heap.
pub(crate) fn read_chunks<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<SharedBuffer> {
    let chunks = source.read_count("chunk count")?;

    let read_chunk = |source: &mut S| -> Result<SharedBuffer> {
        let len = source.read_i64()?;
        let len = usize::try_from(len)
            .map_err(|_| Error::corrupt(format!("invalid chunk length {len}")))?;
        source.take(len, order)
    };

    match chunks {
        0 => Ok(SharedBuffer::empty(order)),
        1 => read_chunk(source),
        _ => {
            log::trace!("joining {chunks} payload chunks");
            let mut bytes = Vec::<u8>::new();
            for _ in 0..chunks {
                bytes.extend_from_slice(read_chunk(source)?.bytes());
            }
            Ok(SharedBuffer::from_vec(bytes, order))
        }
    }
}

#[cfg(test)]
mod test {
    use std::{io::Cursor, sync::Arc};

    use memmap2::MmapMut;
    use test_log::test;

    use crate::{buffer::ByteOrder, error::Error};

    use super::{read_chunks, write_chunks, write_i32, write_string, MappedSource, Source, StreamSource};

    #[test]
    fn chunks_are_joined() {
        let mut bytes = Vec::<u8>::new();
        write_chunks(&mut bytes, b"abcdefg", 3).unwrap();
        assert_eq!(&bytes[..4], &3i32.to_be_bytes());

        let mut source = StreamSource::new(Cursor::new(bytes));
        let buffer = read_chunks(&mut source, ByteOrder::Little).unwrap();
        assert_eq!(buffer.bytes(), b"abcdefg");
        assert_eq!(buffer.order(), ByteOrder::Little);
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let mut bytes = Vec::<u8>::new();
        write_string(&mut bytes, "column").unwrap();
        bytes.truncate(7);

        let mut source = StreamSource::new(Cursor::new(bytes));
        assert!(matches!(source.read_string(), Err(Error::Corrupt(_))));
    }

    #[test]
    fn negative_counts_are_corrupt() {
        let mut bytes = Vec::<u8>::new();
        write_i32(&mut bytes, -4).unwrap();

        let mut source = StreamSource::new(Cursor::new(bytes));
        assert!(matches!(source.read_count("count"), Err(Error::Corrupt(_))));
    }

    #[test]
    fn mapped_source_shares_the_mapping() {
        let mut bytes = Vec::<u8>::new();
        write_chunks(&mut bytes, b"payload", 64).unwrap();

        let mut map = MmapMut::map_anon(bytes.len()).unwrap();
        map.copy_from_slice(&bytes);
        let map = Arc::new(map.make_read_only().unwrap());

        let mut source = MappedSource::new(map);
        let buffer = read_chunks(&mut source, ByteOrder::Big).unwrap();
        assert_eq!(buffer.bytes(), b"payload");
        assert!(!buffer.is_heap());
        assert!(matches!(source.read_u8(), Err(Error::Corrupt(_))));
    }
}
