//! Embedded async TCP host using Tokio.
//!
//! Routing and process bootstrap are the responsibility of whatever
//! environment embeds a [`Feed`](crate::feed::Feed); this module is the
//! smallest such environment that exercises the whole surface over a real
//! socket: an accept loop, buffered HTTP/1.1 parsing, dispatch of matching
//! `GET` requests to the feed renderer, and the host side of the render
//! error contract (terminate with no body on the header guard, bare `500`
//! on propagated provider/store failures).
//!
//! The feed's registered pattern is matched as an exact path here; a real
//! router would treat it as a pattern.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::feed::{Feed, RenderContext, RenderError};
use crate::http::request::RequestError;
use crate::http::{Method, Request, Response, StatusCode};

/// Errors produced by the host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (64 KiB).
/// Feed requests are header-only GETs; anything bigger is not for us.
const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// A TCP host serving exactly one feed.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use serde_json::json;
/// use feedcache::feed::{Feed, FeedConfig};
/// use feedcache::host::FeedHost;
/// use feedcache::provider::StaticProvider;
/// use feedcache::store::MemoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let feed = Feed::new(
///         FeedConfig::new("deals", "feed/deals"),
///         Arc::new(MemoryStore::new()),
///         Arc::new(StaticProvider(json!([{"id": 1}]))),
///     );
///     let host = FeedHost::bind("127.0.0.1:8080", Arc::new(feed)).await?;
///     host.run().await?;
///     Ok(())
/// }
/// ```
pub struct FeedHost {
    listener: TcpListener,
    local_addr: SocketAddr,
    feed: Arc<Feed>,
}

impl FeedHost {
    /// Binds the host to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Bind`] if the address cannot be bound
    /// (port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>, feed: Arc<Feed>) -> Result<Self, HostError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr).await.map_err(|e| HostError::Bind {
            addr: addr.to_owned(),
            source: e,
        })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            feed,
        })
    }

    /// Returns the local address the host is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and serving the feed.
    ///
    /// Runs until the process is terminated or an unrecoverable listener
    /// error occurs.
    pub async fn run(self) -> Result<(), HostError> {
        let binding = self.feed.registration();
        info!(address = %self.local_addr, pattern = %binding.pattern, key = %binding.key, "feed host listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let feed = Arc::clone(&self.feed);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, feed).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: one request per loop
/// iteration until the peer closes, signals `Connection: close`, or the feed
/// answers with a closing response (the `304` short-circuit closes).
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    feed: Arc<Feed>,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large — sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge).keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            break;
        }

        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => {
                // Headers not yet fully received — read more data.
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                let response = Response::new(StatusCode::BadRequest).keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        // Wait for the full request if a body was declared (unusual for a feed).
        let content_length = request.content_length().unwrap_or(0);
        let total_needed = body_offset + content_length;
        if buf.len() < total_needed {
            continue;
        }

        let keep_alive = request.is_keep_alive();
        let response = dispatch(&feed, request).await;

        let Some(response) = response else {
            // Header guard tripped: flush whatever is buffered and terminate
            // the request with no body.
            stream.flush().await?;
            break;
        };

        let close = response.is_close() || !keep_alive;
        let response = if close { response.keep_alive(false) } else { response };
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        let _ = buf.split_to(total_needed);

        if close {
            debug!(peer = %peer_addr, "closing connection");
            break;
        }
    }

    Ok(())
}

/// Routes one request to the feed.
///
/// Returns `None` only for the fatal header-guard error, in which case the
/// connection is torn down with no response at all.
async fn dispatch(feed: &Feed, request: Request) -> Option<Response> {
    let binding = feed.registration();
    if request.path().trim_start_matches('/') != binding.pattern {
        return Some(Response::new(StatusCode::NotFound));
    }
    if request.method() != &Method::Get {
        debug!(method = %request.method(), "non-GET on feed path");
        return Some(Response::new(StatusCode::MethodNotAllowed));
    }

    let mut ctx = RenderContext::new(request);
    match feed.render(&mut ctx).await {
        Ok(response) => Some(response),
        Err(RenderError::HeadersAlreadySent) => {
            // Already logged by the renderer; nothing more to say to the peer.
            None
        }
        Err(e) => {
            error!(key = %binding.key, error = %e, "render failed — sending 500");
            Some(Response::new(StatusCode::InternalServerError).keep_alive(false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedConfig;
    use crate::provider::StaticProvider;
    use crate::store::{CacheTtl, MemoryStore};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn spawn_host() -> SocketAddr {
        let feed = Feed::new(
            FeedConfig::new("deals", "feed/deals").cache_ttl(CacheTtl::seconds(3600)),
            Arc::new(MemoryStore::new()),
            Arc::new(StaticProvider(json!([{"id": 1}]))),
        );
        let host = FeedHost::bind("127.0.0.1:0", Arc::new(feed)).await.unwrap();
        let addr = host.local_addr();
        tokio::spawn(host.run());
        addr
    }

    async fn roundtrip(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    #[tokio::test]
    async fn serves_feed_then_revalidates() {
        let addr = spawn_host().await;

        let first = roundtrip(
            addr,
            "GET /feed/deals HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(first.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(first.contains("Cache-Control: public\r\n"));
        assert!(first.ends_with("[{\"id\":1}]"));

        let etag_line = first
            .lines()
            .find(|l| l.starts_with("ETag: "))
            .expect("etag header");
        let etag = etag_line.trim_start_matches("ETag: ").trim();

        // Server closes on 304, so read_to_end terminates without our asking.
        let second = roundtrip(
            addr,
            &format!(
                "GET /feed/deals HTTP/1.1\r\nHost: localhost\r\nIf-None-Match: {etag}\r\n\r\n"
            ),
        )
        .await;
        assert!(second.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(second.contains("Connection: close\r\n"));
        assert!(second.ends_with("\r\n\r\n"), "empty body");
    }

    #[tokio::test]
    async fn unknown_path_is_404_and_wrong_method_405() {
        let addr = spawn_host().await;

        let missing = roundtrip(
            addr,
            "GET /other HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"));

        let posted = roundtrip(
            addr,
            "POST /feed/deals HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(posted.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    }
}
