use std::fmt::Debug;

use super::ElementType;

/// Values whose encoding is a byte string of arbitrary length.
///
/// Values are ordered by comparing their encodings lexicographically,
/// which for UTF-8 strings coincides with the order of their code points.
pub trait VarWidth: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Corresponding [ElementType]
    const ELEMENT_TYPE: ElementType;

    /// Encoding of this value.
    fn as_bytes(&self) -> &[u8];

    /// Decode a value that was previously encoded.
    fn from_bytes(bytes: &[u8]) -> Self;

    /// Return `true` if `bytes` is the encoding of some value.
    fn is_valid(_bytes: &[u8]) -> bool {
        true
    }
}

impl VarWidth for String {
    const ELEMENT_TYPE: ElementType = ElementType::String;

    fn as_bytes(&self) -> &[u8] {
        str::as_bytes(self)
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn is_valid(bytes: &[u8]) -> bool {
        std::str::from_utf8(bytes).is_ok()
    }
}

impl VarWidth for Vec<u8> {
    const ELEMENT_TYPE: ElementType = ElementType::Bytes;

    fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        bytes.to_vec()
    }
}

#[cfg(test)]
mod test {
    use super::VarWidth;

    #[test]
    fn utf8_validation() {
        assert!(<String as VarWidth>::is_valid("grüße".as_bytes()));
        assert!(!<String as VarWidth>::is_valid(&[0xff, 0xfe]));
        assert!(<Vec<u8> as VarWidth>::is_valid(&[0xff, 0xfe]));
    }

    #[test]
    fn byte_order_matches_string_order() {
        let mut words = vec!["zebra", "Äpfel", "apple", "", "apples"];
        let mut by_bytes = words.clone();
        words.sort();
        by_bytes.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        assert_eq!(words, by_bytes);
    }
}
