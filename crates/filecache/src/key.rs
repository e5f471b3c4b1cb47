//! Cache keys and their filesystem-safe form

use std::any::Any;
use std::fmt;

/// Longest file name most filesystems accept
const MAX_FILE_NAME_BYTES: usize = 255;

/// A sanitized key, usable verbatim as a single path component
///
/// Every byte outside `[A-Za-z0-9-_.~]` is percent-encoded, so the mapping
/// from raw key to file name is injective and never yields a separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    raw: String,
    file_name: String,
}

impl CacheKey {
    /// Sanitize a raw key
    ///
    /// Returns `None` when no safe file name exists for it: empty keys,
    /// `.`/`..`, and keys whose encoded form is longer than 255 bytes.
    pub fn sanitize(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let file_name = urlencoding::encode(raw).into_owned();
        if file_name == "." || file_name == ".." || file_name.len() > MAX_FILE_NAME_BYTES {
            return None;
        }

        Some(Self {
            raw: raw.to_string(),
            file_name,
        })
    }

    /// Recover a key from an on-disk file name
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let raw = urlencoding::decode(file_name).ok()?;
        let key = Self::sanitize(&raw)?;
        (key.file_name == file_name).then_some(key)
    }

    /// The key as supplied by the caller or extractor
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The escaped file name this key is stored under
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Something a key can be resolved from: a literal key or a structured value
#[derive(Clone, Copy)]
pub enum KeyRef<'a> {
    /// Used as-is (after sanitization)
    Literal(&'a str),
    /// Looked up in the extractor registry
    Value(&'a dyn Any),
}

impl<'a> KeyRef<'a> {
    /// Refer to a structured value whose key comes from a registered extractor
    pub fn value<T: Any>(value: &'a T) -> Self {
        KeyRef::Value(value)
    }
}

impl fmt::Debug for KeyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRef::Literal(key) => f.debug_tuple("Literal").field(key).finish(),
            KeyRef::Value(_) => f.write_str("Value(..)"),
        }
    }
}

impl<'a> From<&'a str> for KeyRef<'a> {
    fn from(key: &'a str) -> Self {
        KeyRef::Literal(key)
    }
}

impl<'a> From<&'a String> for KeyRef<'a> {
    fn from(key: &'a String) -> Self {
        KeyRef::Literal(key.as_str())
    }
}

impl<'a> From<&'a CacheKey> for KeyRef<'a> {
    fn from(key: &'a CacheKey) -> Self {
        KeyRef::Literal(key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key_is_unchanged() {
        let key = CacheKey::sanitize("user-42_v1.json").unwrap();
        assert_eq!(key.file_name(), "user-42_v1.json");
        assert_eq!(key.as_str(), "user-42_v1.json");
    }

    #[test]
    fn test_separators_are_escaped() {
        let key = CacheKey::sanitize("../etc/passwd").unwrap();
        assert!(!key.file_name().contains('/'));
        assert_eq!(key.file_name(), "..%2Fetc%2Fpasswd");

        let key = CacheKey::sanitize(r"a\b:c").unwrap();
        assert_eq!(key.file_name(), "a%5Cb%3Ac");
    }

    #[test]
    fn test_escaping_is_injective() {
        let slash = CacheKey::sanitize("a/b").unwrap();
        let underscore = CacheKey::sanitize("a_b").unwrap();
        assert_ne!(slash.file_name(), underscore.file_name());
    }

    #[test]
    fn test_non_ascii_key_is_percent_encoded_utf8() {
        let key = CacheKey::sanitize("café").unwrap();
        assert_eq!(key.file_name(), "caf%C3%A9");
    }

    #[test]
    fn test_unsanitizable_keys() {
        assert!(CacheKey::sanitize("").is_none());
        assert!(CacheKey::sanitize(".").is_none());
        assert!(CacheKey::sanitize("..").is_none());
        assert!(CacheKey::sanitize(&"x".repeat(256)).is_none());
        // each slash triples in length
        assert!(CacheKey::sanitize(&"/".repeat(86)).is_none());
        assert!(CacheKey::sanitize(&"/".repeat(85)).is_some());
    }

    #[test]
    fn test_from_file_name_round_trip() {
        let key = CacheKey::sanitize("orders/2024 Q1").unwrap();
        let back = CacheKey::from_file_name(key.file_name()).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_from_file_name_rejects_foreign_names() {
        // not the canonical encoding of anything
        assert!(CacheKey::from_file_name("a b").is_none());
        assert!(CacheKey::from_file_name("%2e%2e").is_none());
    }
}
