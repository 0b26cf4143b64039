//! Table files: a header followed by a sequence of named columns.

use std::{
    ffi::OsString,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use memmap2::Mmap;

use crate::{
    columnar::any_column::AnyColumn,
    error::{Error, Result},
    management::ByteSized,
};

use super::{
    io::{write_count, write_i32, write_string, MappedSource, Source, StreamSource},
    ReadMode, ReadOptions, WriteOptions, CURRENT_VERSION, MAGIC, OLDEST_VERSION,
};

/// A column together with its name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedColumn {
    /// Name of the column
    pub name: String,
    /// Content of the column
    pub column: AnyColumn,
}

impl NamedColumn {
    /// Create a named column.
    pub fn new(name: impl Into<String>, column: impl Into<AnyColumn>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }
}

/// Columns stored together in one file, optionally with a designated key column.
#[derive(Debug, Clone, PartialEq)]
pub struct TableFile {
    columns: Vec<NamedColumn>,
    key_column: Option<usize>,
    version: i32,
}

impl TableFile {
    /// Create a table from its columns.
    ///
    /// Returns an error if `key_column` does not refer to one of the columns.
    pub fn new(columns: Vec<NamedColumn>, key_column: Option<usize>) -> Result<Self> {
        if let Some(key) = key_column {
            if key >= columns.len() {
                return Err(Error::invalid_argument(format!(
                    "key column {key} out of bounds for {} columns",
                    columns.len()
                )));
            }
        }

        Ok(Self {
            columns,
            key_column,
            version: CURRENT_VERSION,
        })
    }

    /// The columns of this table.
    pub fn columns(&self) -> &[NamedColumn] {
        &self.columns
    }

    /// Take the columns of this table.
    pub fn into_columns(self) -> Vec<NamedColumn> {
        self.columns
    }

    /// Index of the key column, if any.
    pub fn key_column(&self) -> Option<usize> {
        self.key_column
    }

    /// Format version this table was read from.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Return the column with the given name.
    pub fn column(&self, name: &str) -> Option<&AnyColumn> {
        self.columns
            .iter()
            .find(|named| named.name == name)
            .map(|named| &named.column)
    }

    /// Return this table with all columns copied to the heap.
    pub fn to_heap(&self) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|named| NamedColumn {
                    name: named.name.clone(),
                    column: named.column.to_heap(),
                })
                .collect(),
            ..*self
        }
    }

    /// Write this table in the current format version.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W, options: &WriteOptions) -> Result<()> {
        options.validate()?;

        writer.write_all(&MAGIC)?;
        write_i32(writer, CURRENT_VERSION)?;
        write_count(writer, self.columns.len(), "column count")?;
        match self.key_column {
            Some(key) => write_count(writer, key, "key column")?,
            None => write_i32(writer, -1)?,
        }

        for named in &self.columns {
            write_string(writer, &named.name)?;
            named.column.write_to(writer, options)?;
        }

        Ok(())
    }

    /// Write this table to a file, replacing it once the table is complete.
    ///
    /// The table is written to a sibling file that is then renamed over `path`,
    /// so columns mapped from the old file stay readable.
    pub fn save<P: AsRef<Path>>(&self, path: P, options: &WriteOptions) -> Result<()> {
        let path = path.as_ref();
        let staging = staging_path(path);
        log::debug!("writing {} through {}", path.display(), staging.display());

        let written = File::create(&staging)
            .map_err(Error::from)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                self.write(&mut writer, options)?;
                writer.flush()?;
                Ok(())
            });
        match written {
            Ok(()) => Ok(std::fs::rename(&staging, path)?),
            Err(error) => {
                if let Err(cleanup) = std::fs::remove_file(&staging) {
                    log::warn!("could not remove {}: {cleanup}", staging.display());
                }
                Err(error)
            }
        }
    }

    /// Read a table into heap buffers, checking declared characteristics.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        Self::read_source(&mut StreamSource::new(reader), true)
    }

    /// Read a table from a file.
    pub fn open<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Self> {
        let file = File::open(path)?;
        let verify = options.verify_characteristics;
        match options.mode {
            ReadMode::Heap => {
                Self::read_source(&mut StreamSource::new(BufReader::new(file)), verify)
            }
            ReadMode::Mapped => {
                // SAFETY: columns only ever read from the mapping; the file must
                // not be truncated or modified while any column refers to it.
                let map = unsafe { Mmap::map(&file) }?;
                Self::read_source(&mut MappedSource::new(Arc::new(map)), verify)
            }
        }
    }

    fn read_source<S: Source + ?Sized>(source: &mut S, verify: bool) -> Result<Self> {
        let mut magic = [0; MAGIC.len()];
        source.read_into(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::corrupt("not a tabulon file"));
        }

        let version = source.read_i32()?;
        if !(OLDEST_VERSION..=CURRENT_VERSION).contains(&version) {
            return Err(Error::corrupt(format!(
                "unsupported format version {version}"
            )));
        }
        if version < CURRENT_VERSION {
            log::warn!("reading legacy format version {version}");
        }

        let count = source.read_i32()?;
        let key = source.read_i32()?;
        if count < 0 {
            return Err(Error::corrupt(format!("negative column count {count}")));
        }
        if !(-1..count).contains(&key) {
            return Err(Error::corrupt(format!(
                "key column {key} out of range for {count} columns"
            )));
        }

        log::debug!("table header: version {version}, {count} columns, key column {key}");

        let mut columns = Vec::new();
        for _ in 0..count {
            let name = source.read_string()?;
            let column = AnyColumn::read_record(source, version, verify)?;
            log::debug!(
                "read column {name:?}: {} entries of {}, {}",
                column.len(),
                column.element_type(),
                column.characteristics()
            );
            columns.push(NamedColumn { name, column });
        }

        Ok(Self {
            columns,
            key_column: usize::try_from(key).ok(),
            version,
        })
    }
}

/// `dir/name` becomes `dir/name.<pid>.tmp`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

impl ByteSized for TableFile {
    fn size_bytes(&self) -> u64 {
        self.columns
            .iter()
            .map(|named| named.name.len() as u64 + named.column.size_bytes())
            .sum()
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use test_log::test;

    use crate::{
        buffer::ByteOrder,
        columnar::{
            characteristics::Characteristics,
            column::{Id128Column, IntColumn, StringColumn},
        },
        datatypes::Id128,
        error::Error,
        serialization::{
            io::{write_chunks, write_i32, write_string},
            ReadOptions, WriteOptions, CURRENT_VERSION, MAGIC,
        },
    };

    use super::{staging_path, NamedColumn, TableFile};

    fn table() -> TableFile {
        TableFile::new(
            vec![
                NamedColumn::new(
                    "id",
                    IntColumn::from_values([1, 2, 3], Characteristics::distinct()).unwrap(),
                ),
                NamedColumn::new(
                    "name",
                    StringColumn::from_options([Some("a".to_string()), None, Some("c".into())])
                        .unwrap(),
                ),
            ],
            Some(0),
        )
        .unwrap()
    }

    fn header(version: i32, count: i32, key: i32) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        for value in [version, count, key] {
            write_i32(&mut bytes, value).unwrap();
        }
        bytes
    }

    #[test]
    fn table_round_trip() {
        let table = table();
        let mut bytes = Vec::<u8>::new();
        table.write(&mut bytes, &WriteOptions::default()).unwrap();

        let read = TableFile::read(Cursor::new(bytes)).unwrap();
        assert_eq!(read, table);
        assert_eq!(read.key_column(), Some(0));
        assert_eq!(read.version(), CURRENT_VERSION);
        assert!(read.column("name").unwrap().is_null(1));
    }

    #[test]
    fn key_column_must_exist() {
        assert!(TableFile::new(Vec::new(), Some(0)).is_err());
    }

    #[test]
    fn header_validation() {
        let read = |bytes: Vec<u8>| TableFile::read(Cursor::new(bytes));

        let mut bad_magic = header(2, 0, -1);
        bad_magic[0] = b'X';
        assert!(matches!(read(bad_magic), Err(Error::Corrupt(_))));

        assert!(matches!(read(header(0, 0, -1)), Err(Error::Corrupt(_))));
        assert!(matches!(read(header(3, 0, -1)), Err(Error::Corrupt(_))));
        assert!(matches!(read(header(2, -1, -1)), Err(Error::Corrupt(_))));
        assert!(matches!(read(header(2, 1, 1)), Err(Error::Corrupt(_))));
        assert!(matches!(read(header(2, 1, -2)), Err(Error::Corrupt(_))));

        let empty = read(header(2, 0, -1)).unwrap();
        assert!(empty.columns().is_empty());
        assert_eq!(empty.key_column(), None);

        // the header is fine but the announced column is missing
        assert!(matches!(read(header(2, 1, 0)), Err(Error::Corrupt(_))));
    }

    #[test]
    fn legacy_version() {
        let mut bytes = header(1, 2, -1);

        write_string(&mut bytes, "names").unwrap();
        write_string(&mut bytes, "STRING").unwrap();
        write_i32(&mut bytes, 1).unwrap();
        bytes.push(b'B');
        write_i32(&mut bytes, 2).unwrap();
        for value in ["x", "yz"] {
            write_string(&mut bytes, value).unwrap();
        }

        write_string(&mut bytes, "ids").unwrap();
        write_string(&mut bytes, "ID128").unwrap();
        write_i32(&mut bytes, 7).unwrap();
        bytes.push(b'B');
        let mut body = Vec::new();
        for (high, low) in [(0i64, 1i64), (0, 2)] {
            body.extend_from_slice(&high.to_be_bytes());
            body.extend_from_slice(&low.to_be_bytes());
        }
        write_chunks(&mut bytes, &body, 1024).unwrap();

        let table = TableFile::read(Cursor::new(bytes)).unwrap();
        assert_eq!(table.version(), 1);
        assert_eq!(
            table.column("names").unwrap(),
            &StringColumn::from_values(["x", "yz"].map(String::from), Characteristics::none())
                .unwrap()
                .into()
        );

        let ids = table.column("ids").unwrap();
        assert_eq!(
            ids,
            &Id128Column::from_values(
                [Id128::new(0, 1), Id128::new(0, 2)],
                Characteristics::distinct()
            )
            .unwrap()
            .into()
        );
        assert!(ids.characteristics().is_distinct());
    }

    #[test]
    fn legacy_dictionary_is_corrupt() {
        let mut bytes = header(1, 1, -1);
        write_string(&mut bytes, "names").unwrap();
        write_string(&mut bytes, "DICT_STRING").unwrap();
        write_i32(&mut bytes, 1).unwrap();
        bytes.push(b'B');

        assert!(matches!(
            TableFile::read(Cursor::new(bytes)),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn mapped_file_round_trip() {
        let path = std::env::temp_dir().join(format!("tabulon-mapped-{}.tbl", std::process::id()));
        let table = table();
        let options = WriteOptions {
            byte_order: Some(ByteOrder::Little),
            ..Default::default()
        };
        table.save(&path, &options).unwrap();

        let mapped = TableFile::open(&path, &ReadOptions::mapped()).unwrap();
        assert_eq!(mapped, table);
        assert!(!mapped.column("id").unwrap().is_heap());

        let heap = mapped.to_heap();
        assert!(heap.column("id").unwrap().is_heap());
        assert_eq!(heap, table);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn saving_over_a_mapped_file() {
        let path = std::env::temp_dir().join(format!("tabulon-replace-{}.tbl", std::process::id()));
        let table = table();
        table.save(&path, &WriteOptions::default()).unwrap();

        let mapped = TableFile::open(&path, &ReadOptions::mapped()).unwrap();
        let options = WriteOptions {
            byte_order: Some(ByteOrder::Little),
            ..Default::default()
        };
        mapped.save(&path, &options).unwrap();

        assert_eq!(mapped, table);
        assert_eq!(TableFile::open(&path, &ReadOptions::heap()).unwrap(), table);
        assert!(!staging_path(&path).exists());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn false_declarations_fail_the_read() {
        let table = TableFile::new(
            vec![NamedColumn::new(
                "x",
                IntColumn::from_values([3, 1], Characteristics::none()).unwrap(),
            )],
            None,
        )
        .unwrap();
        let mut bytes = Vec::<u8>::new();
        table.write(&mut bytes, &WriteOptions::default()).unwrap();
        // header, name "x" and type code "INT" precede the bitmask
        let at = 20 + 4 + 1 + 4 + 3;
        bytes[at..at + 4].copy_from_slice(&7i32.to_be_bytes());

        assert!(matches!(
            TableFile::read(Cursor::new(bytes.clone())),
            Err(Error::Corrupt(_))
        ));

        let path = std::env::temp_dir().join(format!("tabulon-false-{}.tbl", std::process::id()));
        std::fs::write(&path, &bytes).unwrap();
        for options in [ReadOptions::heap(), ReadOptions::mapped()] {
            assert!(matches!(
                TableFile::open(&path, &options),
                Err(Error::Corrupt(_))
            ));
        }

        #[cfg(not(feature = "check_column_sorting"))]
        {
            let trusted = TableFile::open(&path, &ReadOptions::mapped().trusting()).unwrap();
            assert!(trusted.column("x").unwrap().verify_characteristics().is_err());
        }

        std::fs::remove_file(&path).unwrap();
    }
}
