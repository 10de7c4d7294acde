//! HTTP header map with case-insensitive name lookup.
//!
//! Header fields are order-preserving and case-insensitive per RFC 9110 §5.
//! The renderer relies on both properties: conditional validators are looked
//! up under whatever casing the client chose, and the encoder emits the
//! legacy and canonical `Content-Type` variants in a fixed order.

use std::fmt;

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows multiple values per header name.
///
/// # Examples
///
/// ```
/// use feedcache::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("If-None-Match", "\"abc123\"");
///
/// assert_eq!(headers.get("if-none-match"), Some("\"abc123\""));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Replaces every entry with the given name by a single `name: value`
    /// entry, appending if none existed.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.inner.push((name, value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("If-Modified-Since", "Sat, 01 Jan 2022 00:00:00 GMT");
        assert_eq!(
            h.get("if-modified-since"),
            Some("Sat, 01 Jan 2022 00:00:00 GMT")
        );
        assert_eq!(
            h.get("IF-MODIFIED-SINCE"),
            Some("Sat, 01 Jan 2022 00:00:00 GMT")
        );
    }

    #[test]
    fn insert_preserves_duplicates() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/json");
        h.insert("Content-Type", "application/json");
        assert_eq!(h.len(), 2);
        // `get` returns the first entry; clients that apply last-one-wins
        // see the second.
        assert_eq!(h.get("content-type"), Some("text/json"));
    }

    #[test]
    fn set_replaces_all_entries() {
        let mut h = Headers::new();
        h.insert("ETag", "\"old\"");
        h.insert("etag", "\"older\"");
        h.set("ETag", "\"new\"");
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("etag"), Some("\"new\""));
    }

    #[test]
    fn contains() {
        let mut h = Headers::new();
        h.insert("Accept-Encoding", "gzip, br");
        assert!(h.contains("accept-encoding"));
        assert!(!h.contains("if-none-match"));
    }
}
