//! Response encoding — JSON serialization and optional gzip compression.
//!
//! The payload is serialized once; if the client advertises gzip support,
//! exactly one of two compression paths runs:
//!
//! - [`GzipMode::Stream`] — the whole body goes through
//!   `flate2::write::GzEncoder`, which produces a complete gzip member.
//! - [`GzipMode::Framed`] — the member is framed by hand: a fixed 10-byte
//!   header (deflate method, no flags, zero mtime, unknown OS), a raw
//!   deflate body, then the CRC32 and uncompressed-size trailer. This is the
//!   fallback for hosts that cannot wrap the output stream in an encoder.
//!
//! Both paths declare `Content-Encoding: gzip`.

use std::io::Write;

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::{Compression, Crc};
use serde_json::Value;
use thiserror::Error;

use crate::http::Response;

/// Fixed gzip member header for the framed path:
/// magic `1F 8B`, deflate method, no flags, zero mtime, zero XFL, unknown OS.
const GZIP_MEMBER_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0xff];

/// Compression level used by both paths.
const GZIP_LEVEL: u32 = 6;

/// Which gzip path the encoder takes for gzip-capable clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GzipMode {
    /// Wrapped stream-level encoding (preferred).
    #[default]
    Stream,
    /// Manual gzip member framing (fallback).
    Framed,
}

/// Errors produced while encoding a response body.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("compression failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializes `payload` onto `response` as JSON, gzipping when the client
/// accepts it.
///
/// Emits the canonical `Content-Type: application/json` preceded by the
/// legacy `text/json` variant some very old feed consumers still expect;
/// last-one-wins clients see the canonical type.
pub fn encode(
    payload: &Value,
    accepts_gzip: bool,
    mode: GzipMode,
    mut response: Response,
) -> Result<Response, EncodeError> {
    response.add_header("Content-Type", "text/json");
    response.add_header("Content-Type", "application/json");

    let json = serde_json::to_vec(payload)?;

    if !accepts_gzip {
        return Ok(response.body_bytes(json));
    }

    let compressed = match mode {
        GzipMode::Stream => gzip_stream(&json)?,
        GzipMode::Framed => gzip_framed(&json)?,
    };
    response.add_header("Content-Encoding", "gzip");
    Ok(response.body_bytes(compressed))
}

/// Whole-body gzip via the stream encoder.
fn gzip_stream(json: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(json.len() / 2 + 32),
        Compression::new(GZIP_LEVEL),
    );
    encoder.write_all(json)?;
    encoder.finish()
}

/// Hand-framed gzip member: header, raw deflate body, CRC32 + size trailer
/// (both little-endian).
fn gzip_framed(json: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(json.len() / 2 + 32);
    out.extend_from_slice(&GZIP_MEMBER_HEADER);

    let mut deflate = DeflateEncoder::new(out, Compression::new(GZIP_LEVEL));
    deflate.write_all(json)?;
    let mut out = deflate.finish()?;

    let mut crc = Crc::new();
    crc.update(json);
    out.extend_from_slice(&crc.sum().to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;

    fn gunzip(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(body).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn identity_when_client_lacks_gzip() {
        let payload = json!([{"id": 1}]);
        let r = encode(
            &payload,
            false,
            GzipMode::Stream,
            Response::new(StatusCode::Ok),
        )
        .unwrap();
        assert_eq!(r.body(), serde_json::to_vec(&payload).unwrap().as_slice());
        assert!(!r.headers().contains("content-encoding"));
    }

    #[test]
    fn content_type_legacy_then_canonical() {
        let r = encode(
            &json!({}),
            false,
            GzipMode::Stream,
            Response::new(StatusCode::Ok),
        )
        .unwrap();
        let types: Vec<_> = r
            .headers()
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v)
            .collect();
        assert_eq!(types, vec!["text/json", "application/json"]);
    }

    #[test]
    fn stream_gzip_round_trips() {
        let payload = json!([{"id": 1, "title": "a deal"}]);
        let r = encode(
            &payload,
            true,
            GzipMode::Stream,
            Response::new(StatusCode::Ok),
        )
        .unwrap();
        assert_eq!(r.headers().get("content-encoding"), Some("gzip"));
        assert_eq!(gunzip(r.body()), serde_json::to_vec(&payload).unwrap());
    }

    #[test]
    fn framed_gzip_round_trips() {
        let payload = json!([{"id": 1, "title": "a deal"}]);
        let r = encode(
            &payload,
            true,
            GzipMode::Framed,
            Response::new(StatusCode::Ok),
        )
        .unwrap();
        assert_eq!(r.headers().get("content-encoding"), Some("gzip"));
        assert_eq!(&r.body()[..4], &[0x1f, 0x8b, 0x08, 0x00]);
        assert_eq!(gunzip(r.body()), serde_json::to_vec(&payload).unwrap());
    }

    #[test]
    fn framed_trailer_carries_size() {
        let payload = json!({"k": "v"});
        let json_len = serde_json::to_vec(&payload).unwrap().len() as u32;
        let r = encode(
            &payload,
            true,
            GzipMode::Framed,
            Response::new(StatusCode::Ok),
        )
        .unwrap();
        let body = r.body();
        let size = u32::from_le_bytes(body[body.len() - 4..].try_into().unwrap());
        assert_eq!(size, json_len);
    }
}
