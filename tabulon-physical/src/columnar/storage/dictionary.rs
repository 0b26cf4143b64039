//! This module defines [DictStore],
//! which stores strings as small integer codes into a [Dictionary] of distinct values.

use std::{cmp::Ordering, fmt::Display, ops::Range, sync::Arc};

use hashbrown::HashMap;
use once_cell::sync::OnceCell;

use crate::{
    buffer::ByteOrder,
    columnar::builder::BuilderOptions,
    datatypes::{ElementType, VarWidth},
    error::{Error, Result},
    management::{bytesized::size_inner_hashmap_flat, ByteSized},
};

use super::{
    fixed::{FixedStaging, FixedStore},
    varlen::{VarStaging, VarStore},
    Storage, StorageBuilder,
};

/// Number of bytes used for each code of a [DictStore].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CodeWidth {
    /// Up to 256 distinct values
    U8,
    /// Up to 65536 distinct values
    U16,
    /// Up to 2^32 distinct values
    #[default]
    U32,
}

impl CodeWidth {
    /// Number of bytes of one code.
    pub fn bytes(self) -> usize {
        match self {
            CodeWidth::U8 => 1,
            CodeWidth::U16 => 2,
            CodeWidth::U32 => 4,
        }
    }

    /// Return the [CodeWidth] with the given number of bytes.
    pub fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(CodeWidth::U8),
            2 => Some(CodeWidth::U16),
            4 => Some(CodeWidth::U32),
            _ => None,
        }
    }

    /// Maximal number of distinct values that can be addressed.
    pub fn capacity(self) -> u64 {
        1 << (8 * self.bytes())
    }

    /// Smallest width that can address `distinct` values.
    pub fn for_distinct(distinct: usize) -> Option<Self> {
        [CodeWidth::U8, CodeWidth::U16, CodeWidth::U32]
            .into_iter()
            .find(|width| distinct as u64 <= width.capacity())
    }
}

impl Display for CodeWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{}", 8 * self.bytes())
    }
}

/// Codes of a [DictStore], stored in the narrowest sufficient width.
#[derive(Debug, Clone)]
pub enum Codes {
    /// One byte per code
    U8(FixedStore<u8>),
    /// Two bytes per code
    U16(FixedStore<u16>),
    /// Four bytes per code
    U32(FixedStore<u32>),
}

macro_rules! forward_to_codes {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            Codes::U8($store) => $body,
            Codes::U16($store) => $body,
            Codes::U32($store) => $body,
        }
    };
}

macro_rules! map_codes {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            Codes::U8($store) => Codes::U8($body),
            Codes::U16($store) => Codes::U16($body),
            Codes::U32($store) => Codes::U32($body),
        }
    };
}

impl Codes {
    /// Create an empty code store of the given width.
    pub fn empty(width: CodeWidth, order: ByteOrder) -> Self {
        match width {
            CodeWidth::U8 => Codes::U8(FixedStore::empty(order)),
            CodeWidth::U16 => Codes::U16(FixedStore::empty(order)),
            CodeWidth::U32 => Codes::U32(FixedStore::empty(order)),
        }
    }

    /// Width of the codes.
    pub fn width(&self) -> CodeWidth {
        match self {
            Codes::U8(_) => CodeWidth::U8,
            Codes::U16(_) => CodeWidth::U16,
            Codes::U32(_) => CodeWidth::U32,
        }
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        forward_to_codes!(self, store => store.len())
    }

    /// Return `true` if there are no codes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte order of the codes.
    pub fn order(&self) -> ByteOrder {
        forward_to_codes!(self, store => store.order())
    }

    /// The code at `index`.
    pub fn code(&self, index: usize) -> u32 {
        match self {
            Codes::U8(store) => u32::from(store.value(index)),
            Codes::U16(store) => u32::from(store.value(index)),
            Codes::U32(store) => store.value(index),
        }
    }

    /// All codes, encoded in the given byte order.
    pub fn encoded(&self, order: ByteOrder) -> std::borrow::Cow<'_, [u8]> {
        forward_to_codes!(self, store => store.encoded(order))
    }

    fn view(&self, range: Range<usize>) -> Self {
        map_codes!(self, store => store.view(range))
    }

    fn copy_values(&self, range: Range<usize>) -> Self {
        map_codes!(self, store => store.copy_values(range))
    }

    fn is_heap(&self) -> bool {
        forward_to_codes!(self, store => store.is_heap())
    }

    fn to_heap(&self) -> Self {
        map_codes!(self, store => store.to_heap())
    }
}

impl ByteSized for Codes {
    fn size_bytes(&self) -> u64 {
        forward_to_codes!(self, store => store.size_bytes())
    }
}

/// Table of distinct strings addressed by their position.
#[derive(Debug, Clone)]
pub struct Dictionary {
    values: VarStore<String>,
    lookup: HashMap<String, u32>,
}

impl Dictionary {
    /// Create a dictionary from a store of distinct values.
    pub fn from_values(values: VarStore<String>) -> Result<Self> {
        if values.len() as u64 > CodeWidth::U32.capacity() {
            return Err(Error::CapacityOverflow {
                width: CodeWidth::U32.bytes(),
                distinct: values.len(),
            });
        }

        let mut lookup = HashMap::with_capacity(values.len());
        for (code, bytes) in values.iter_bytes().enumerate() {
            let value = String::from_bytes(bytes);
            if lookup.insert(value, code as u32).is_some() {
                return Err(Error::invalid_argument(format!(
                    "dictionary contains {:?} more than once",
                    String::from_bytes(bytes)
                )));
            }
        }

        Ok(Self { values, lookup })
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return `true` if the dictionary contains no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The store of distinct values.
    pub fn values(&self) -> &VarStore<String> {
        &self.values
    }

    /// The encoding of the value with the given code.
    pub fn bytes(&self, code: u32) -> &[u8] {
        self.values.bytes_at(code as usize)
    }

    /// Code of `value`, if it is part of the dictionary.
    pub fn code_of(&self, value: &str) -> Option<u32> {
        self.lookup.get(value).copied()
    }

    fn to_heap(&self) -> Self {
        Self {
            values: self.values.to_heap(),
            lookup: self.lookup.clone(),
        }
    }
}

impl ByteSized for Dictionary {
    fn size_bytes(&self) -> u64 {
        let keys = self.lookup.keys().map(|key| key.len() as u64).sum::<u64>();
        size_of::<Self>() as u64
            + self.values.size_bytes()
            + size_inner_hashmap_flat(&self.lookup)
            + keys
    }
}

/// Store of strings as codes into a shared [Dictionary].
///
/// Values compare by their decoded strings, not by their codes.
#[derive(Debug, Clone)]
pub struct DictStore {
    codes: Codes,
    dictionary: Arc<Dictionary>,
}

impl DictStore {
    /// Combine a dictionary with codes into it.
    pub fn from_parts(dictionary: Arc<Dictionary>, codes: Codes) -> Result<Self> {
        let distinct = dictionary.len() as u64;
        if let Some(index) = (0..codes.len()).find(|&index| u64::from(codes.code(index)) >= distinct) {
            return Err(Error::invalid_argument(format!(
                "code {} at position {index} exceeds dictionary of {distinct} values",
                codes.code(index)
            )));
        }

        Ok(Self { codes, dictionary })
    }

    /// The codes of this store.
    pub fn codes(&self) -> &Codes {
        &self.codes
    }

    /// The dictionary of this store.
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// The encoding of the value at `index`.
    pub fn bytes_at(&self, index: usize) -> &[u8] {
        self.dictionary.bytes(self.codes.code(index))
    }

    fn shares_dictionary(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.dictionary, &other.dictionary)
    }
}

impl ByteSized for DictStore {
    fn size_bytes(&self) -> u64 {
        self.codes.size_bytes() + self.dictionary.size_bytes()
    }
}

impl Storage for DictStore {
    type Item = String;
    type Staging = DictStaging;

    const ELEMENT_TYPE: ElementType = ElementType::DictString;

    fn empty(order: ByteOrder) -> Self {
        Self {
            codes: Codes::empty(CodeWidth::U8, order),
            dictionary: Arc::new(Dictionary {
                values: VarStore::empty(order),
                lookup: HashMap::new(),
            }),
        }
    }

    fn len(&self) -> usize {
        self.codes.len()
    }

    fn byte_order(&self) -> ByteOrder {
        self.codes.order()
    }

    fn get(&self, index: usize) -> String {
        String::from_bytes(self.bytes_at(index))
    }

    fn compare_values(left: &String, right: &String) -> Ordering {
        left.as_bytes().cmp(right.as_bytes())
    }

    fn compare_at(&self, i: usize, j: usize) -> Ordering {
        let (left, right) = (self.codes.code(i), self.codes.code(j));
        if left == right {
            return Ordering::Equal;
        }
        self.dictionary.bytes(left).cmp(self.dictionary.bytes(right))
    }

    fn compare_to(&self, index: usize, value: &String) -> Ordering {
        self.bytes_at(index).cmp(value.as_bytes())
    }

    fn compare_across(&self, index: usize, other: &Self, other_index: usize) -> Ordering {
        if self.shares_dictionary(other) && self.codes.code(index) == other.codes.code(other_index) {
            return Ordering::Equal;
        }
        self.bytes_at(index).cmp(other.bytes_at(other_index))
    }

    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            codes: self.codes.view(range),
            dictionary: self.dictionary.clone(),
        }
    }

    fn is_heap(&self) -> bool {
        self.codes.is_heap() && self.dictionary.values.is_heap()
    }

    fn to_heap(&self) -> Self {
        if self.is_heap() {
            return self.clone();
        }

        Self {
            codes: self.codes.to_heap(),
            dictionary: Arc::new(self.dictionary.to_heap()),
        }
    }

    fn copy_range(&self, range: Range<usize>) -> Self {
        Self {
            codes: self.codes.copy_values(range),
            dictionary: self.dictionary.clone(),
        }
    }

    fn concat(&self, range: Range<usize>, other: &Self, other_range: Range<usize>) -> Result<Self> {
        let mut staging = DictStaging::derived(self, range.len() + other_range.len());
        for index in range {
            staging.push_from(self, index);
        }

        if self.shares_dictionary(other) {
            for index in other_range {
                staging.push_from(other, index);
            }
        } else {
            log::trace!(
                "re-encoding {} values into a dictionary of {} values",
                other_range.len(),
                self.dictionary.len()
            );
            for index in other_range {
                staging.push(&other.get(index))?;
            }
        }

        Ok(staging.freeze())
    }
}

/// Code array under construction.
#[derive(Debug, Clone)]
enum CodeStaging {
    U8(FixedStaging<u8>),
    U16(FixedStaging<u16>),
    U32(FixedStaging<u32>),
}

impl CodeStaging {
    fn new(width: CodeWidth, order: ByteOrder, capacity: usize) -> Self {
        match width {
            CodeWidth::U8 => CodeStaging::U8(FixedStaging::with_order(order, capacity)),
            CodeWidth::U16 => CodeStaging::U16(FixedStaging::with_order(order, capacity)),
            CodeWidth::U32 => CodeStaging::U32(FixedStaging::with_order(order, capacity)),
        }
    }

    fn width(&self) -> CodeWidth {
        match self {
            CodeStaging::U8(_) => CodeWidth::U8,
            CodeStaging::U16(_) => CodeWidth::U16,
            CodeStaging::U32(_) => CodeWidth::U32,
        }
    }

    fn len(&self) -> usize {
        match self {
            CodeStaging::U8(staging) => staging.len(),
            CodeStaging::U16(staging) => staging.len(),
            CodeStaging::U32(staging) => staging.len(),
        }
    }

    fn order(&self) -> ByteOrder {
        match self {
            CodeStaging::U8(staging) => staging.order(),
            CodeStaging::U16(staging) => staging.order(),
            CodeStaging::U32(staging) => staging.order(),
        }
    }

    fn reserve(&mut self, additional: usize) {
        match self {
            CodeStaging::U8(staging) => staging.reserve(additional),
            CodeStaging::U16(staging) => staging.reserve(additional),
            CodeStaging::U32(staging) => staging.reserve(additional),
        }
    }

    fn code_at(&self, index: usize) -> u32 {
        match self {
            CodeStaging::U8(staging) => u32::from(staging.value_at(index)),
            CodeStaging::U16(staging) => u32::from(staging.value_at(index)),
            CodeStaging::U32(staging) => staging.value_at(index),
        }
    }

    /// Append a code that fits into the current width.
    #[allow(clippy::cast_possible_truncation)]
    fn push(&mut self, code: u32) {
        debug_assert!(u64::from(code) < self.width().capacity());

        match self {
            CodeStaging::U8(staging) => staging.push_value(code as u8),
            CodeStaging::U16(staging) => staging.push_value(code as u16),
            CodeStaging::U32(staging) => staging.push_value(code),
        }
    }

    /// Re-encode all codes with the given, larger width.
    fn widen(&mut self, width: CodeWidth) {
        if width <= self.width() {
            return;
        }

        log::debug!(
            "widening {} dictionary codes from {} to {width}",
            self.len(),
            self.width()
        );

        let mut wider = CodeStaging::new(width, self.order(), self.len());
        for index in 0..self.len() {
            wider.push(self.code_at(index));
        }
        *self = wider;
    }

    fn freeze(&self) -> Codes {
        match self {
            CodeStaging::U8(staging) => Codes::U8(staging.freeze_values()),
            CodeStaging::U16(staging) => Codes::U16(staging.freeze_values()),
            CodeStaging::U32(staging) => Codes::U32(staging.freeze_values()),
        }
    }
}

/// Distinct values of a [DictStaging].
#[derive(Debug, Clone)]
enum Entries {
    /// Values of an existing dictionary that has not been extended yet
    Shared(Arc<Dictionary>),
    /// Values owned by the builder, with a cached immutable copy
    Owned {
        values: VarStaging<String>,
        lookup: HashMap<String, u32>,
        frozen: OnceCell<Arc<Dictionary>>,
    },
}

/// Builder for a [DictStore].
///
/// Codes start out one byte wide and are widened on demand,
/// up to the width given in the [BuilderOptions].
#[derive(Debug, Clone)]
pub struct DictStaging {
    codes: CodeStaging,
    entries: Entries,
    max_width: CodeWidth,
}

impl DictStaging {
    fn code_of(&self, value: &str) -> Option<u32> {
        match &self.entries {
            Entries::Shared(dictionary) => dictionary.code_of(value),
            Entries::Owned { lookup, .. } => lookup.get(value).copied(),
        }
    }

    fn distinct(&self) -> usize {
        match &self.entries {
            Entries::Shared(dictionary) => dictionary.len(),
            Entries::Owned { values, .. } => values.len(),
        }
    }

    fn value_bytes(&self, code: u32) -> &[u8] {
        match &self.entries {
            Entries::Shared(dictionary) => dictionary.bytes(code),
            Entries::Owned { values, .. } => values.bytes_at(code as usize),
        }
    }

    /// Make the distinct values extensible, copying a shared dictionary if necessary.
    #[allow(clippy::type_complexity)]
    fn own_entries(
        &mut self,
    ) -> (
        &mut VarStaging<String>,
        &mut HashMap<String, u32>,
        &mut OnceCell<Arc<Dictionary>>,
    ) {
        if let Entries::Shared(shared) = &self.entries {
            let dictionary = shared.clone();
            let mut values = VarStaging::with_order(dictionary.values.byte_order(), dictionary.len());
            for bytes in dictionary.values.iter_bytes() {
                values.push_bytes(bytes);
            }

            self.entries = Entries::Owned {
                values,
                lookup: dictionary.lookup.clone(),
                frozen: OnceCell::with_value(dictionary),
            };
        }

        match &mut self.entries {
            Entries::Owned {
                values,
                lookup,
                frozen,
            } => (values, lookup, frozen),
            Entries::Shared(_) => unreachable!("entries were converted above"),
        }
    }

    /// Return the code of `value`, adding it to the dictionary if it is new.
    fn intern(&mut self, value: &str) -> Result<u32> {
        if let Some(code) = self.code_of(value) {
            return Ok(code);
        }

        let distinct = self.distinct() + 1;
        let width = CodeWidth::for_distinct(distinct)
            .filter(|width| *width <= self.max_width)
            .ok_or(Error::CapacityOverflow {
                width: self.max_width.bytes(),
                distinct,
            })?;
        self.codes.widen(width);

        let (values, lookup, frozen) = self.own_entries();
        let code = values.len() as u32;
        values.push_bytes(value.as_bytes());
        lookup.insert(value.to_owned(), code);
        *frozen = OnceCell::new();

        Ok(code)
    }

    fn dictionary(&self) -> Arc<Dictionary> {
        match &self.entries {
            Entries::Shared(dictionary) => dictionary.clone(),
            Entries::Owned {
                values,
                lookup,
                frozen,
            } => frozen
                .get_or_init(|| {
                    Arc::new(Dictionary {
                        values: values.freeze_values(),
                        lookup: lookup.clone(),
                    })
                })
                .clone(),
        }
    }
}

impl StorageBuilder for DictStaging {
    type Store = DictStore;

    fn new(options: &BuilderOptions) -> Self {
        Self {
            codes: CodeStaging::new(CodeWidth::U8, options.byte_order, options.initial_capacity),
            entries: Entries::Owned {
                values: VarStaging::with_order(options.byte_order, 0),
                lookup: HashMap::new(),
                frozen: OnceCell::new(),
            },
            max_width: options.dictionary_width,
        }
    }

    fn derived(source: &DictStore, capacity: usize) -> Self {
        Self {
            codes: CodeStaging::new(source.codes.width(), source.codes.order(), capacity),
            entries: Entries::Shared(source.dictionary.clone()),
            max_width: CodeWidth::U32,
        }
    }

    fn len(&self) -> usize {
        self.codes.len()
    }

    fn reserve(&mut self, additional: usize) {
        self.codes.reserve(additional)
    }

    fn push(&mut self, value: &String) -> Result<()> {
        let code = self.intern(value)?;
        self.codes.push(code);
        Ok(())
    }

    fn push_from(&mut self, source: &DictStore, index: usize) {
        debug_assert!(
            matches!(&self.entries, Entries::Shared(dictionary) if Arc::ptr_eq(dictionary, &source.dictionary))
                || self.code_of(&source.get(index)) == Some(source.codes.code(index)),
            "values can only be copied between stores of the same dictionary"
        );

        self.codes.push(source.codes.code(index));
    }

    fn compare_last(&self, value: &String) -> Option<Ordering> {
        let last = self.codes.len().checked_sub(1)?;
        Some(self.value_bytes(self.codes.code_at(last)).cmp(value.as_bytes()))
    }

    fn freeze(&self) -> DictStore {
        DictStore {
            codes: self.codes.freeze(),
            dictionary: self.dictionary(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use test_log::test;

    use crate::{
        buffer::ByteOrder,
        columnar::{
            builder::BuilderOptions,
            storage::{varlen::VarStore, Storage, StorageBuilder},
        },
        error::Error,
    };

    use super::{CodeWidth, DictStaging, DictStore, Dictionary};

    fn build(values: &[&str], options: &BuilderOptions) -> Result<DictStore, Error> {
        let mut staging = DictStaging::new(options);
        for value in values {
            staging.push(&value.to_string())?;
        }
        Ok(staging.freeze())
    }

    fn contents(store: &DictStore) -> Vec<String> {
        (0..store.len()).map(|index| store.get(index)).collect()
    }

    #[test]
    fn repeated_values_share_codes() {
        let store = build(&["b", "a", "b", "c", "a"], &BuilderOptions::default()).unwrap();

        assert_eq!(store.dictionary().len(), 3);
        assert_eq!(store.codes().width(), CodeWidth::U8);
        assert_eq!(
            (0..5).map(|index| store.codes().code(index)).collect::<Vec<_>>(),
            vec![0, 1, 0, 2, 1]
        );
        assert_eq!(contents(&store), vec!["b", "a", "b", "c", "a"]);
    }

    #[test]
    fn comparison_uses_decoded_strings() {
        let store = build(&["zeta", "alpha"], &BuilderOptions::default()).unwrap();
        assert_eq!(store.compare_at(0, 1), std::cmp::Ordering::Greater);

        let sorted = store.sorted(0..2);
        assert_eq!(contents(&sorted), vec!["alpha", "zeta"]);
        assert!(Arc::ptr_eq(sorted.dictionary(), store.dictionary()));
    }

    #[test]
    fn codes_widen_on_demand() {
        let values = (0..300).map(|value| value.to_string()).collect::<Vec<_>>();
        let refs = values.iter().map(String::as_str).collect::<Vec<_>>();

        let store = build(&refs, &BuilderOptions::default()).unwrap();
        assert_eq!(store.codes().width(), CodeWidth::U16);
        assert_eq!(store.get(299), "299");
        assert_eq!(store.get(3), "3");
    }

    #[test]
    fn exceeding_the_maximal_width_fails() {
        let values = (0..257).map(|value| value.to_string()).collect::<Vec<_>>();
        let refs = values.iter().map(String::as_str).collect::<Vec<_>>();

        let options = BuilderOptions {
            dictionary_width: CodeWidth::U8,
            ..Default::default()
        };
        let result = build(&refs, &options);
        assert!(matches!(
            result,
            Err(Error::CapacityOverflow {
                width: 1,
                distinct: 257
            })
        ));
    }

    #[test]
    fn concat_of_different_dictionaries_reencodes() {
        let left = build(&["x", "y"], &BuilderOptions::default()).unwrap();
        let right = build(&["y", "z"], &BuilderOptions::default()).unwrap();

        let joined = left.concat(0..2, &right, 0..2).unwrap();
        assert_eq!(contents(&joined), vec!["x", "y", "y", "z"]);
        assert_eq!(joined.dictionary().len(), 3);
        // the dictionary of the left side is not modified
        assert_eq!(left.dictionary().len(), 2);
    }

    #[test]
    fn snapshots_keep_their_dictionary() {
        let mut staging = DictStaging::new(&BuilderOptions::default());
        staging.push(&"one".to_string()).unwrap();
        let first = staging.freeze();
        staging.push(&"two".to_string()).unwrap();
        let second = staging.freeze();

        assert_eq!(first.dictionary().len(), 1);
        assert_eq!(second.dictionary().len(), 2);
        assert_eq!(contents(&second), vec!["one", "two"]);
    }

    #[test]
    fn duplicate_dictionary_entries_are_rejected() {
        let values = VarStore::from_values(
            &["a".to_string(), "a".to_string()],
            ByteOrder::Big,
        );
        assert!(Dictionary::from_values(values).is_err());
    }

    #[test]
    fn width_helpers() {
        assert_eq!(CodeWidth::for_distinct(256), Some(CodeWidth::U8));
        assert_eq!(CodeWidth::for_distinct(257), Some(CodeWidth::U16));
        assert_eq!(CodeWidth::from_bytes(4), Some(CodeWidth::U32));
        assert_eq!(CodeWidth::from_bytes(3), None);
        assert_eq!(CodeWidth::U16.to_string(), "u16");
    }
}
