//! Header fields of requests and stored responses.
//!
//! Names compare without regard to ASCII case; values are kept verbatim, in
//! arrival order, so a response read back from a cache carries exactly the
//! fields the origin sent.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Header names the caching and session layers read or write.
pub mod names {
    pub const CACHE_CONTROL: &str = "Cache-Control";
    pub const CONNECTION: &str = "Connection";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const DATE: &str = "Date";
    pub const ETAG: &str = "ETag";
    pub const EXPIRES: &str = "Expires";
    pub const HOST: &str = "Host";
    pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";
    pub const IF_NONE_MATCH: &str = "If-None-Match";
    pub const LAST_MODIFIED: &str = "Last-Modified";
    pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
}

/// Standard `Connection` header tokens.
pub mod tokens {
    pub const KEEP_ALIVE: &str = "Keep-Alive";
    pub const CLOSE: &str = "Close";
}

/// Ordered list of `(name, value)` fields; a name may repeat.
///
/// # Examples
///
/// ```
/// use httpstash::http::Headers;
///
/// let mut headers: Headers = [("Cache-Control", "max-age=300"), ("Vary", "Accept")]
///     .into_iter()
///     .collect();
/// headers.insert("vary", "Accept-Encoding");
///
/// assert_eq!(headers.get("cache-control"), Some("max-age=300"));
/// assert_eq!(headers.get_all("VARY").count(), 2);
/// assert!(headers.has_token("vary", "Accept-Encoding"));
/// assert!(!headers.has_token("vary", "accept-encoding"));
/// assert!(headers.has_token_ignore_case("vary", "accept-encoding"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Adds a field after the existing ones, even if the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Replaces every value stored under `name` with a single `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.inner.push((name, value.into()));
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Drops every field called `name`; `false` if there was none.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.inner.len() < before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// `true` if a comma-separated element of header `name` is exactly
    /// `token`. The header name is matched without regard to case, the token
    /// is not.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.elements(name).any(|element| element == token)
    }

    /// Like [`has_token`](Self::has_token), ignoring ASCII case in the token.
    pub fn has_token_ignore_case(&self, name: &str, token: &str) -> bool {
        self.elements(name)
            .any(|element| element.eq_ignore_ascii_case(token))
    }

    fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.get_all(name)
            .flat_map(|value| value.split(','))
            .map(str::trim)
    }

    /// Lays `other` over `self`: every name present in `other` has all of its
    /// values in `self` replaced by the values from `other`. Names only in
    /// `self` are kept as they are.
    pub fn overlay(&mut self, other: &Headers) {
        for (name, _) in &other.inner {
            self.remove(name);
        }
        self.inner.extend(other.inner.iter().cloned());
    }

    /// Number of fields, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
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
    fn lookup_ignores_case() {
        let h: Headers = [("etag", "\"abc\"")].into_iter().collect();
        assert_eq!(h.get(names::ETAG), Some("\"abc\""));
        assert!(h.contains("ETAG"));
        assert_eq!(h.get(names::LAST_MODIFIED), None);
    }

    #[test]
    fn set_replaces_every_value() {
        let mut h = Headers::new();
        h.insert("Warning", "a");
        h.insert("warning", "b");
        h.set("WARNING", "c");
        let vals: Vec<_> = h.get_all("warning").collect();
        assert_eq!(vals, vec!["c"]);
    }

    #[test]
    fn overlay_replaces_shared_names_and_keeps_the_rest() {
        let mut stored: Headers = [
            ("Header-That-Was-In-The-First-Response", "42"),
            ("Date", "old"),
            ("Cache-Control", "max-age=1"),
        ]
        .into_iter()
        .collect();
        let update: Headers = [("date", "new"), ("X-Changes-Every-Time", "7")]
            .into_iter()
            .collect();

        stored.overlay(&update);

        assert_eq!(stored.get("Date"), Some("new"));
        assert_eq!(stored.get_all("date").count(), 1);
        assert_eq!(stored.get("x-changes-every-time"), Some("7"));
        assert_eq!(stored.get("header-that-was-in-the-first-response"), Some("42"));
        assert_eq!(stored.get("cache-control"), Some("max-age=1"));
    }

    #[test]
    fn connection_tokens_compare_case_sensitively() {
        let mut h = Headers::new();
        h.insert("connection", "Upgrade, Close");
        assert!(h.has_token(names::CONNECTION, tokens::CLOSE));
        assert!(!h.has_token(names::CONNECTION, tokens::KEEP_ALIVE));

        let lower: Headers = [("Connection", "close")].into_iter().collect();
        assert!(!lower.has_token(names::CONNECTION, tokens::CLOSE));
        assert!(lower.has_token_ignore_case(names::CONNECTION, tokens::CLOSE));
    }

    #[test]
    fn conditional_headers_are_removed_whatever_their_case() {
        let mut h: Headers = [("if-none-match", "\"a\""), ("Accept", "*/*"), ("IF-NONE-MATCH", "\"b\"")]
            .into_iter()
            .collect();
        assert!(h.remove(names::IF_NONE_MATCH));
        assert_eq!(h.len(), 1);
        assert!(!h.remove(names::IF_NONE_MATCH));
    }
}
