//! Conditional-request negotiation.
//!
//! Given a feed's last-modified watermark and the client's validators
//! (`If-Modified-Since`, `If-None-Match`), decide whether the request can be
//! answered with `304 Not Modified` or must proceed to data resolution.
//!
//! The ETag is a content fingerprint, not a security artifact: it only has to
//! be deterministic and unlikely to collide by accident, so an MD5 digest of
//! the watermark plus an entropy string is sufficient.

use chrono::{DateTime, TimeZone, Utc};
use md5::{Digest, Md5};

use crate::http::Headers;

/// Outcome of conditional negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The client's copy is current. The caller must answer `304` with no
    /// body, a `Connection: close` directive, and stop rendering.
    NotModified,
    /// The client needs a full response.
    Proceed,
}

/// The client's conditional validators, parsed permissively.
///
/// An unparseable `If-Modified-Since` is treated as absent, not as an error
/// (clients send all sorts of garbage here). `If-None-Match` has surrounding
/// quotes and a weak-validator `W/` prefix stripped so it compares directly
/// against the raw fingerprint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConditionalRequest {
    if_modified_since: Option<i64>,
    if_none_match: Option<String>,
}

impl ConditionalRequest {
    /// Extracts the validators from request headers.
    pub fn from_headers(headers: &Headers) -> Self {
        Self {
            if_modified_since: headers.get("if-modified-since").and_then(parse_http_date),
            if_none_match: headers.get("if-none-match").map(strip_validator),
        }
    }

    /// The parsed `If-Modified-Since` time (seconds since epoch), if any.
    pub fn if_modified_since(&self) -> Option<i64> {
        self.if_modified_since
    }

    /// The unquoted, weak-prefix-stripped `If-None-Match` token, if any.
    pub fn if_none_match(&self) -> Option<&str> {
        self.if_none_match.as_deref()
    }
}

/// Computes the content fingerprint: `hex(md5(last_modified || entropy))`.
///
/// Deterministic for identical inputs; the entropy string distinguishes
/// otherwise-identical timestamps across versions or contexts.
pub fn content_etag(last_modified: i64, entropy: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(last_modified.to_string().as_bytes());
    hasher.update(entropy.as_bytes());
    hex::encode(hasher.finalize())
}

/// Formats an epoch timestamp as an RFC 1123 HTTP date in GMT,
/// e.g. `Tue, 14 Nov 2023 22:13:20 GMT`.
pub fn http_date(timestamp: i64) -> String {
    let dt = Utc
        .timestamp_opt(timestamp, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parses an HTTP date permissively. Returns `None` for anything that does
/// not look like a date.
pub fn parse_http_date(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.timestamp())
}

/// Decides between `NotModified` and `Proceed`.
///
/// `NotModified` iff the client's `If-Modified-Since` parses to a time at or
/// after `last_modified`, or its `If-None-Match` token equals `etag`. Either
/// validator alone is sufficient.
pub fn decide(last_modified: i64, etag: &str, cond: &ConditionalRequest) -> Decision {
    let fresh_by_date = cond
        .if_modified_since
        .is_some_and(|since| since >= last_modified);
    let fresh_by_etag = cond.if_none_match.as_deref() == Some(etag);

    if fresh_by_date || fresh_by_etag {
        Decision::NotModified
    } else {
        Decision::Proceed
    }
}

/// Strips optional `W/` prefix and surrounding quotes from an entity tag.
fn strip_validator(raw: &str) -> String {
    let s = raw.trim();
    let s = s.strip_prefix("W/").unwrap_or(s);
    s.trim_matches('"').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(ims: Option<&str>, inm: Option<&str>) -> ConditionalRequest {
        let mut h = Headers::new();
        if let Some(v) = ims {
            h.insert("If-Modified-Since", v);
        }
        if let Some(v) = inm {
            h.insert("If-None-Match", v);
        }
        ConditionalRequest::from_headers(&h)
    }

    #[test]
    fn etag_is_deterministic() {
        let a = content_etag(1_700_000_000, "v0.1.1");
        let b = content_etag(1_700_000_000, "v0.1.1");
        assert_eq!(a, b);
        assert_eq!(a, "2a4bb552321b90ad3841da5c426c01e3");
    }

    #[test]
    fn etag_varies_with_inputs() {
        let base = content_etag(1_700_000_000, "");
        assert_eq!(base, "24920decf83f6960b80f737a28eeafc1");
        assert_ne!(base, content_etag(1_700_000_001, ""));
        assert_ne!(base, content_etag(1_700_000_000, "v2"));
    }

    #[test]
    fn http_date_round_trip() {
        let formatted = http_date(1_700_000_000);
        assert_eq!(formatted, "Tue, 14 Nov 2023 22:13:20 GMT");
        assert_eq!(parse_http_date(&formatted), Some(1_700_000_000));
    }

    #[test]
    fn unparseable_date_is_absent() {
        assert_eq!(parse_http_date("not a date"), None);
        let c = cond(Some("yesterday-ish"), None);
        assert_eq!(c.if_modified_since(), None);
        // and an unparseable validator never produces a 304
        assert_eq!(decide(1_700_000_000, "x", &c), Decision::Proceed);
    }

    #[test]
    fn if_modified_since_at_or_after_watermark() {
        let at = cond(Some("Tue, 14 Nov 2023 22:13:20 GMT"), None);
        assert_eq!(decide(1_700_000_000, "x", &at), Decision::NotModified);

        let after = cond(Some("Tue, 14 Nov 2023 22:13:21 GMT"), None);
        assert_eq!(decide(1_700_000_000, "x", &after), Decision::NotModified);

        let before = cond(Some("Tue, 14 Nov 2023 22:13:19 GMT"), None);
        assert_eq!(decide(1_700_000_000, "x", &before), Decision::Proceed);
    }

    #[test]
    fn etag_match_wins_regardless_of_date() {
        let etag = content_etag(1_700_000_000, "v1");
        // stale If-Modified-Since, matching etag: still a 304
        let c = cond(
            Some("Mon, 01 Jan 2001 00:00:00 GMT"),
            Some(&format!("\"{etag}\"")),
        );
        assert_eq!(decide(1_700_000_000, &etag, &c), Decision::NotModified);
    }

    #[test]
    fn etag_quoting_and_weak_prefix() {
        let c = cond(None, Some("\"abc123\""));
        assert_eq!(c.if_none_match(), Some("abc123"));
        assert_eq!(decide(1, "abc123", &c), Decision::NotModified);

        let c = cond(None, Some("W/\"abc123\""));
        assert_eq!(c.if_none_match(), Some("abc123"));
        assert_eq!(decide(1, "abc123", &c), Decision::NotModified);

        let c = cond(None, Some("abc123"));
        assert_eq!(decide(1, "abc123", &c), Decision::NotModified);

        let c = cond(None, Some("\"other\""));
        assert_eq!(decide(1, "abc123", &c), Decision::Proceed);
    }

    #[test]
    fn no_validators_proceeds() {
        assert_eq!(
            decide(1_700_000_000, "x", &ConditionalRequest::default()),
            Decision::Proceed
        );
    }
}
