//! HTTP/1.1 request parsing using the [`httparse`] crate.
//!
//! The embedded host parses raw bytes with [`Request::parse`]; external
//! routers that already have a parsed request hand the pieces to
//! [`Request::new`] instead.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer, or by
/// [`Request::new`] when an external dispatch layer has already done the
/// parsing. Only the pieces the feed surface consumes are kept: method, path,
/// query parameters, and headers.
///
/// # Examples
///
/// ```
/// use feedcache::http::Request;
///
/// let raw = b"GET /feed/deals?no-cache HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/feed/deals");
/// assert!(request.query_flag("no-cache"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    headers: Headers,
    query: Option<String>,
    params: HashMap<String, String>,
    body: Bytes,
    keep_alive: bool,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Builds a request directly, for callers whose dispatch layer has
    /// already parsed the wire format.
    pub fn new(method: Method, path: impl Into<String>, headers: Headers) -> Self {
        let raw_path = path.into();
        let (path, query) = split_target(&raw_path);
        let params = query.as_deref().map(parse_query_string).unwrap_or_default();
        Self {
            method,
            path,
            headers,
            query,
            params,
            body: Bytes::new(),
            keep_alive: true,
        }
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body
    /// begins in `buf` (immediately after the `\r\n\r\n` header terminator).
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()
            .unwrap(); // Infallible

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let (path, query) = split_target(raw_path);

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let keep_alive = match header_map.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => version == 1, // HTTP/1.1 default: keep-alive
        };

        let params = query.as_deref().map(parse_query_string).unwrap_or_default();
        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                method,
                path,
                headers: header_map,
                query,
                params,
                body,
                keep_alive,
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns a parsed query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns `true` if the query string mentions `key` at all, with or
    /// without a value. The feed's `no-cache` override is presence-based.
    pub fn query_flag(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Returns `true` if the client's `Accept-Encoding` advertises gzip.
    ///
    /// Tokenized scan rather than a substring match, so `br;q=1, gzip` is
    /// accepted and a hypothetical `notgzip` coding is not.
    pub fn accepts_gzip(&self) -> bool {
        let Some(raw) = self.headers.get("accept-encoding") else {
            return false;
        };
        raw.split(',').any(|part| {
            let coding = part.split(';').next().unwrap_or("").trim();
            coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip")
        })
    }

    /// Returns `true` if the connection should be kept alive after this request.
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

/// Splits a request target into path and optional query string.
fn split_target(raw: &str) -> (String, Option<String>) {
    match raw.find('?') {
        Some(pos) => (raw[..pos].to_owned(), Some(raw[pos + 1..].to_owned())),
        None => (raw.to_owned(), None),
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// A bare key (`?no-cache`) maps to an empty value. Keys and values have `+`
/// decoded as a space; full percent-decoding is out of scope for a feed whose
/// only recognized parameter is a bare flag.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.replace('+', " ");
            let value = parts.next().unwrap_or("").replace('+', " ");
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET /feed HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/feed");
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len()); // no body
    }

    #[test]
    fn query_params_and_flags() {
        let raw = b"GET /feed?no-cache&page=2 HTTP/1.1\r\nHost: x\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.query_string(), Some("no-cache&page=2"));
        assert!(req.query_flag("no-cache"));
        assert_eq!(req.query_param("page"), Some("2"));
        assert!(!req.query_flag("missing"));
    }

    #[test]
    fn no_cache_with_value_still_counts() {
        let req = Request::new(Method::Get, "/feed?no-cache=1", Headers::new());
        assert!(req.query_flag("no-cache"));
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn accepts_gzip_tokenized() {
        let mut h = Headers::new();
        h.insert("Accept-Encoding", "br;q=1.0, gzip;q=0.8");
        let req = Request::new(Method::Get, "/feed", h);
        assert!(req.accepts_gzip());

        let mut h = Headers::new();
        h.insert("Accept-Encoding", "notgzip, br");
        let req = Request::new(Method::Get, "/feed", h);
        assert!(!req.accepts_gzip());

        let req = Request::new(Method::Get, "/feed", Headers::new());
        assert!(!req.accepts_gzip());
    }

    #[test]
    fn connection_close() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn keep_alive_http11_default() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(req.is_keep_alive());
    }
}
