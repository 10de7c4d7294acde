//! # feedcache
//!
//! A conditional-response cache that serves a data source as a single JSON
//! HTTP endpoint, with `ETag`/`Last-Modified` revalidation to avoid redundant
//! transfer and recomputation.
//!
//! Each [`Feed`] tracks a last-modified watermark in an external key-value
//! store, answers conditional requests with `304 Not Modified` when the
//! client's validators are current, and otherwise serves a cached payload —
//! falling back to a [`DataProvider`] callback on cache miss. External write
//! events advance the watermark and invalidate the cache entry, so stale
//! payloads are never served as fresh.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use feedcache::{Feed, FeedConfig, MemoryStore};
//! use feedcache::host::FeedHost;
//! use feedcache::provider::StaticProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let feed = Feed::new(
//!         FeedConfig::new("deals", "feed/deals"),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(StaticProvider(json!([{"id": 1}]))),
//!     );
//!     let host = FeedHost::bind("127.0.0.1:8080", Arc::new(feed)).await?;
//!     println!("Listening on http://127.0.0.1:8080/feed/deals");
//!     host.run().await?;
//!     Ok(())
//! }
//! ```

pub mod conditional;
pub mod encode;
pub mod feed;
pub mod guard;
pub mod hooks;
pub mod host;
pub mod http;
pub mod provider;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use feed::{Feed, FeedConfig, RenderContext, RenderError, Revision, RouteBinding};
pub use hooks::{FeedObserver, HookRegistry};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use provider::DataProvider;
pub use store::{CacheTtl, KeyValueStore, MemoryStore};

/// Running crate version; doubles as the ETag entropy string and the value
/// persisted by the version-migration marker.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
