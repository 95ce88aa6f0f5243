//! Cache keys derived from resolved tile URLs.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Longest key a single path component can hold on common filesystems.
pub const MAX_KEY_LEN: usize = 255;

/// Why a URL has no cache key.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeyError {
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The encoded key would not fit in a file or archive member name.
    #[error("encoded key is {len} bytes, limit is {limit}")]
    TooLong { len: usize, limit: usize },
}

/// Canonical key of a tile in the persistent cache.
///
/// The key is the normalised tile URL, percent-encoded so that it is a
/// valid single file name. Everything except ASCII alphanumerics and
/// `-_.~` is escaped, which makes the encoding injective: distinct URLs
/// never share a key, and identical URLs from different providers share
/// their entry. Keys longer than [`MAX_KEY_LEN`] are refused, so every
/// backend accepts exactly the same set of keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a tile URL.
    ///
    /// The URL is parsed and re-serialised first, so trivially different
    /// spellings (`HTTP://Host` vs `http://host/`) map to the same key.
    pub fn from_url(url: &str) -> Result<Self, KeyError> {
        let normalised = Url::parse(url)?;
        let encoded = urlencoding::encode(normalised.as_str()).into_owned();
        if encoded.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong {
                len: encoded.len(),
                limit: MAX_KEY_LEN,
            });
        }
        Ok(Self(encoded))
    }

    /// Reconstructs a key from its encoded form, e.g. a file or archive
    /// member name. Returns `None` if `encoded` is not a key this type
    /// would have produced.
    pub fn from_encoded(encoded: &str) -> Option<Self> {
        let decoded = urlencoding::decode(encoded).ok()?;
        let key = Self::from_url(&decoded).ok()?;
        (key.0 == encoded).then_some(key)
    }

    /// The encoded, filename-safe form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The normalised URL this key was derived from.
    pub fn url(&self) -> String {
        urlencoding::decode(&self.0)
            .map(|u| u.into_owned())
            .unwrap_or_else(|_| self.0.clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_filename_safe() {
        let key = CacheKey::from_url(
            "http://ecn.t3.tiles.virtualearth.net/tiles/a123.jpeg?g=5001",
        )
        .unwrap();
        assert!(!key.as_str().contains('/'));
        assert!(!key.as_str().contains('?'));
        assert!(key
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_.~%".contains(&b)));
    }

    #[test]
    fn test_key_normalises_url() {
        let a = CacheKey::from_url("HTTP://Tiles.Example.com").unwrap();
        let b = CacheKey::from_url("http://tiles.example.com/").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_urls_distinct_keys() {
        let a = CacheKey::from_url("http://t.test/1/2/3.png").unwrap();
        let b = CacheKey::from_url("http://t.test/1/23/.png").unwrap();
        let c = CacheKey::from_url("http://t.test/1/2/3.png?s=").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_url_roundtrip() {
        let key = CacheKey::from_url("http://t.test/a b/%41?x=1&y=2").unwrap();
        assert_eq!(key.url(), "http://t.test/a%20b/%41?x=1&y=2");
        assert_eq!(CacheKey::from_encoded(key.as_str()), Some(key));
    }

    #[test]
    fn test_from_encoded_rejects_foreign_names() {
        assert_eq!(CacheKey::from_encoded(".tmpXYZ"), None);
        assert_eq!(CacheKey::from_encoded("http://t.test/"), None);
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            CacheKey::from_url("not a url"),
            Err(KeyError::Url(_))
        ));
    }

    #[test]
    fn test_overlong_key_rejected() {
        let prefix = "http://t.test/";
        let fits = format!("{}{}", prefix, "x".repeat(MAX_KEY_LEN - 30));
        let key = CacheKey::from_url(&fits).unwrap();
        assert!(key.as_str().len() <= MAX_KEY_LEN);

        let long = format!("{}{}", prefix, "x".repeat(300));
        assert!(matches!(
            CacheKey::from_url(&long),
            Err(KeyError::TooLong { limit: MAX_KEY_LEN, .. })
        ));
        assert_eq!(CacheKey::from_encoded(&"x".repeat(300)), None);
    }
}
