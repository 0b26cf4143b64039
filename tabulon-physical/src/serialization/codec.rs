//! Encoding of single columns: a record of type code, characteristics and body.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use crate::{
    bitmap,
    buffer::ByteOrder,
    columnar::{
        any_column::AnyColumn,
        characteristics::Characteristics,
        column::Column,
        storage::{
            CodeWidth, Codes, CompositeStore, DictStore, Dictionary, FixedStore, Storage, VarStore,
        },
    },
    datatypes::{Composite, ElementType, FixedWidth, Primitive, VarWidth},
    error::{Error, Result},
};

use super::{
    io::{
        read_chunks, write_chunks, write_count, write_i32, write_string, write_u64, write_u8,
        Source, StreamSource,
    },
    legacy, WriteOptions, CURRENT_VERSION,
};

/// Turn a rejected argument of a constructor into a decoding error.
pub(crate) fn corrupt_on_invalid(error: Error) -> Error {
    match error {
        Error::InvalidArgument(message) => Error::Corrupt(message),
        error => error,
    }
}

/// Stores that can be written to and read from the binary format.
pub trait Payload: Storage {
    /// Write all values of this store in the given byte order.
    fn write_payload<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        order: ByteOrder,
        max_chunk_bytes: usize,
    ) -> Result<()>;

    /// Read a store written by [Payload::write_payload].
    fn read_payload<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<Self>;

    /// Read a store written in the first version of the format.
    fn read_legacy_payload<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<Self> {
        Self::read_payload(source, order)
    }
}

fn write_fixed<T: FixedWidth, W: Write + ?Sized>(
    store: &FixedStore<T>,
    writer: &mut W,
    order: ByteOrder,
    max_chunk_bytes: usize,
) -> Result<()> {
    write_chunks(writer, &store.encoded(order), max_chunk_bytes)
}

pub(crate) fn read_fixed<T: FixedWidth, S: Source + ?Sized>(
    source: &mut S,
    order: ByteOrder,
) -> Result<FixedStore<T>> {
    FixedStore::from_buffer(read_chunks(source, order)?).map_err(corrupt_on_invalid)
}

impl<T: Primitive> Payload for FixedStore<T> {
    fn write_payload<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        order: ByteOrder,
        max_chunk_bytes: usize,
    ) -> Result<()> {
        write_fixed(self, writer, order, max_chunk_bytes)
    }

    fn read_payload<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<Self> {
        read_fixed(source, order)
    }
}

impl<T: VarWidth> Payload for VarStore<T> {
    fn write_payload<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        order: ByteOrder,
        max_chunk_bytes: usize,
    ) -> Result<()> {
        let compact = self.compacted();
        write_fixed(compact.pointers(), writer, order, max_chunk_bytes)?;
        write_chunks(writer, compact.data().bytes(), max_chunk_bytes)
    }

    fn read_payload<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<Self> {
        let pointers = read_fixed::<i64, _>(source, order)?;
        let data = read_chunks(source, order)?;
        VarStore::from_parts(pointers, data).map_err(corrupt_on_invalid)
    }

    fn read_legacy_payload<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<Self> {
        legacy::read_var_payload(source, order)
    }
}

impl<T: Composite> Payload for CompositeStore<T> {
    fn write_payload<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        order: ByteOrder,
        max_chunk_bytes: usize,
    ) -> Result<()> {
        write_fixed(self.first(), writer, order, max_chunk_bytes)?;
        write_fixed(self.second(), writer, order, max_chunk_bytes)
    }

    fn read_payload<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<Self> {
        let first = read_fixed(source, order)?;
        let second = read_fixed(source, order)?;
        CompositeStore::from_parts(first, second).map_err(corrupt_on_invalid)
    }

    fn read_legacy_payload<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<Self> {
        legacy::read_composite_payload(source, order)
    }
}

impl Payload for DictStore {
    fn write_payload<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        order: ByteOrder,
        max_chunk_bytes: usize,
    ) -> Result<()> {
        self.dictionary()
            .values()
            .write_payload(writer, order, max_chunk_bytes)?;

        let codes = self.codes();
        #[allow(clippy::cast_possible_truncation)]
        write_u8(writer, codes.width().bytes() as u8)?;
        write_chunks(writer, &codes.encoded(order), max_chunk_bytes)
    }

    fn read_payload<S: Source + ?Sized>(source: &mut S, order: ByteOrder) -> Result<Self> {
        let values = VarStore::<String>::read_payload(source, order)?;
        let dictionary = Arc::new(Dictionary::from_values(values).map_err(corrupt_on_invalid)?);

        let width = source.read_u8()?;
        let codes = match CodeWidth::from_bytes(width) {
            Some(CodeWidth::U8) => Codes::U8(read_fixed(source, order)?),
            Some(CodeWidth::U16) => Codes::U16(read_fixed(source, order)?),
            Some(CodeWidth::U32) => Codes::U32(read_fixed(source, order)?),
            None => return Err(Error::corrupt(format!("invalid code width {width}"))),
        };

        DictStore::from_parts(dictionary, codes).map_err(corrupt_on_invalid)
    }

    fn read_legacy_payload<S: Source + ?Sized>(_source: &mut S, _order: ByteOrder) -> Result<Self> {
        Err(Error::corrupt(format!(
            "{} columns do not exist in format version 1",
            ElementType::DictString
        )))
    }
}

impl<S: Payload> Column<S> {
    /// Write this column as a record of type code, characteristics and body.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W, options: &WriteOptions) -> Result<()> {
        options.validate()?;

        write_string(writer, S::ELEMENT_TYPE.type_code())?;
        #[allow(clippy::cast_possible_wrap)]
        write_i32(writer, self.characteristics().bits() as i32)?;
        self.write_body(writer, options)
    }

    fn write_body<W: Write + ?Sized>(&self, writer: &mut W, options: &WriteOptions) -> Result<()> {
        let order = options.byte_order.unwrap_or(self.values().byte_order());
        write_u8(writer, order.marker())?;

        if !self.characteristics().is_nonnull() {
            write_count(writer, self.len(), "column length")?;
            let words = bitmap::to_words(&self.null_bits());
            write_count(writer, words.len(), "bitmap length")?;
            for word in words {
                write_u64(writer, word)?;
            }
        }

        self.values()
            .slice(self.physical_range())
            .write_payload(writer, order, options.max_chunk_bytes)
    }

    /// Read a column written by [Column::write_to] into heap buffers.
    ///
    /// Returns an error if the record holds a column of another element type.
    /// Declared characteristics are checked against the values.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Self::read_record(&mut StreamSource::new(reader), CURRENT_VERSION, true)
    }

    pub(crate) fn read_record<R: Source + ?Sized>(
        source: &mut R,
        version: i32,
        verify: bool,
    ) -> Result<Self> {
        let element_type = read_element_type(source)?;
        if element_type != S::ELEMENT_TYPE {
            return Err(Error::corrupt(format!(
                "expected a {} column, found {element_type}",
                S::ELEMENT_TYPE
            )));
        }

        let characteristics = read_characteristics(source)?;
        Self::read_body(source, characteristics, version, verify)
    }

    fn read_body<R: Source + ?Sized>(
        source: &mut R,
        characteristics: Characteristics,
        version: i32,
        verify: bool,
    ) -> Result<Self> {
        let marker = source.read_u8()?;
        let order = ByteOrder::from_marker(marker)
            .ok_or_else(|| Error::corrupt(format!("invalid byte order marker {marker:#04x}")))?;

        let nulls = if characteristics.is_nonnull() {
            None
        } else {
            let len = source.read_count("column length")?;
            let word_count = source.read_count("bitmap length")?;
            if word_count != len.div_ceil(64) {
                return Err(Error::corrupt(format!(
                    "{word_count} bitmap words for {len} entries"
                )));
            }
            let words = (0..word_count)
                .map(|_| source.read_u64())
                .collect::<Result<Vec<_>>>()?;
            Some(
                bitmap::from_words(words, len)
                    .ok_or_else(|| Error::corrupt("null bitmap does not match its length"))?,
            )
        };

        let values = if version == 1 {
            S::read_legacy_payload(source, order)?
        } else {
            S::read_payload(source, order)?
        };

        log::trace!(
            "read {} column with {} values, {characteristics}",
            S::ELEMENT_TYPE,
            values.len()
        );

        match nulls {
            Some(nulls) => Column::from_nullable(values, nulls).map_err(corrupt_on_invalid),
            None if verify => Column::from_store(values)
                .with_characteristics(characteristics)
                .map_err(corrupt_on_invalid),
            None => Ok(Column::from_store(values).with_declared(characteristics)),
        }
    }
}

fn read_element_type<R: Source + ?Sized>(source: &mut R) -> Result<ElementType> {
    let code = source.read_string()?;
    ElementType::from_type_code(&code)
        .ok_or_else(|| Error::corrupt(format!("unknown type code {code:?}")))
}

fn read_characteristics<R: Source + ?Sized>(source: &mut R) -> Result<Characteristics> {
    let bits = source.read_i32()?;
    u32::try_from(bits)
        .map_err(|_| Error::corrupt(format!("invalid characteristics {bits:#x}")))
        .and_then(|bits| Characteristics::from_bits(bits).map_err(corrupt_on_invalid))
}

impl AnyColumn {
    /// Write this column as a record of type code, characteristics and body.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W, options: &WriteOptions) -> Result<()> {
        match self {
            AnyColumn::Boolean(column) => column.write_to(writer, options),
            AnyColumn::Byte(column) => column.write_to(writer, options),
            AnyColumn::Short(column) => column.write_to(writer, options),
            AnyColumn::Int(column) => column.write_to(writer, options),
            AnyColumn::Long(column) => column.write_to(writer, options),
            AnyColumn::Float(column) => column.write_to(writer, options),
            AnyColumn::Double(column) => column.write_to(writer, options),
            AnyColumn::String(column) => column.write_to(writer, options),
            AnyColumn::Bytes(column) => column.write_to(writer, options),
            AnyColumn::DictString(column) => column.write_to(writer, options),
            AnyColumn::Id128(column) => column.write_to(writer, options),
            AnyColumn::Instant(column) => column.write_to(writer, options),
        }
    }

    /// Read a column of any element type written by [AnyColumn::write_to].
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Self::read_record(&mut StreamSource::new(reader), CURRENT_VERSION, true)
    }

    pub(crate) fn read_record<R: Source + ?Sized>(
        source: &mut R,
        version: i32,
        verify: bool,
    ) -> Result<Self> {
        let element_type = read_element_type(source)?;
        let characteristics = read_characteristics(source)?;

        macro_rules! read_as {
            ($variant:ident) => {
                AnyColumn::$variant(Column::read_body(source, characteristics, version, verify)?)
            };
        }

        Ok(match element_type {
            ElementType::Boolean => read_as!(Boolean),
            ElementType::Byte => read_as!(Byte),
            ElementType::Short => read_as!(Short),
            ElementType::Int => read_as!(Int),
            ElementType::Long => read_as!(Long),
            ElementType::Float => read_as!(Float),
            ElementType::Double => read_as!(Double),
            ElementType::String => read_as!(String),
            ElementType::Bytes => read_as!(Bytes),
            ElementType::DictString => read_as!(DictString),
            ElementType::Id128 => read_as!(Id128),
            ElementType::Instant => read_as!(Instant),
        })
    }
}
