//! Payload layouts of format version 1 that differ from the current version.

use crate::{
    buffer::ByteOrder,
    columnar::storage::{CompositeStaging, CompositeStore, VarStaging, VarStore},
    datatypes::{Composite, FixedWidth, VarWidth},
    error::{Error, Result},
};

use super::io::{read_chunks, Source};

/// Largest number of values reserved upfront for counts read from the input
const MAX_RESERVED: usize = 1 << 16;

/// Read a variable-length payload stored as a count followed by
/// length prefixed encodings.
pub(crate) fn read_var_payload<T: VarWidth, S: Source + ?Sized>(
    source: &mut S,
    order: ByteOrder,
) -> Result<VarStore<T>> {
    let count = source.read_count("value count")?;
    let mut staging = VarStaging::<T>::with_order(order, count.min(MAX_RESERVED));

    for index in 0..count {
        let len = source.read_count("value length")?;
        let bytes = source.take(len, order)?;
        if !T::is_valid(bytes.bytes()) {
            return Err(Error::corrupt(format!(
                "value {index} is not a valid {}",
                T::ELEMENT_TYPE
            )));
        }
        staging.push_bytes(bytes.bytes());
    }

    Ok(staging.freeze_values())
}

/// Read a composite payload stored as one body of interleaved components.
pub(crate) fn read_composite_payload<T: Composite, S: Source + ?Sized>(
    source: &mut S,
    order: ByteOrder,
) -> Result<CompositeStore<T>> {
    let first_width = <T::First as FixedWidth>::WIDTH;
    let width = first_width + <T::Second as FixedWidth>::WIDTH;

    let buffer = read_chunks(source, order)?;
    if buffer.len() % width != 0 {
        return Err(Error::corrupt(format!(
            "{} bytes do not hold whole {} values",
            buffer.len(),
            T::ELEMENT_TYPE
        )));
    }

    let mut staging = CompositeStaging::<T>::with_order(order, buffer.len() / width);
    for pair in buffer.bytes().chunks_exact(width) {
        let first = T::First::decode(&pair[..first_width], order);
        let second = T::Second::decode(&pair[first_width..], order);
        staging.push_value(T::join(first, second));
    }

    Ok(staging.freeze_values())
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use test_log::test;

    use crate::{
        buffer::ByteOrder,
        datatypes::{Id128, Instant},
        error::Error,
        serialization::io::{write_chunks, write_i32, StreamSource},
    };

    use super::{read_composite_payload, read_var_payload};

    #[test]
    fn var_payload() {
        let mut bytes = Vec::<u8>::new();
        write_i32(&mut bytes, 2).unwrap();
        for value in ["ab", ""] {
            write_i32(&mut bytes, value.len() as i32).unwrap();
            bytes.extend_from_slice(value.as_bytes());
        }

        let store =
            read_var_payload::<String, _>(&mut StreamSource::new(Cursor::new(bytes)), ByteOrder::Big)
                .unwrap();
        assert_eq!(store.iter_bytes().collect::<Vec<_>>(), vec![&b"ab"[..], b""]);
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let mut bytes = Vec::<u8>::new();
        write_i32(&mut bytes, 1).unwrap();
        write_i32(&mut bytes, 1).unwrap();
        bytes.push(0xff);

        let result =
            read_var_payload::<String, _>(&mut StreamSource::new(Cursor::new(bytes)), ByteOrder::Big);
        assert!(matches!(result, Err(Error::Corrupt(_))));
    }

    #[test]
    fn interleaved_composite_payload() {
        let mut body = Vec::new();
        for (seconds, nanos) in [(1i64, 2i32), (3, 4)] {
            body.extend_from_slice(&seconds.to_le_bytes());
            body.extend_from_slice(&nanos.to_le_bytes());
        }
        let mut bytes = Vec::<u8>::new();
        write_chunks(&mut bytes, &body, 1024).unwrap();

        let store = read_composite_payload::<Instant, _>(
            &mut StreamSource::new(Cursor::new(bytes)),
            ByteOrder::Little,
        )
        .unwrap();
        assert_eq!(store.first().values().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(store.second().values().collect::<Vec<_>>(), vec![2, 4]);

        let mut truncated = Vec::<u8>::new();
        write_chunks(&mut truncated, &[0; 15], 1024).unwrap();
        assert!(read_composite_payload::<Id128, _>(
            &mut StreamSource::new(Cursor::new(truncated)),
            ByteOrder::Big
        )
        .is_err());
    }
}
