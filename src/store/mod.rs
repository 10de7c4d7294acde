//! Key-value storage seam and the typed wrappers built on it.
//!
//! The persistent store backing cache entries and the last-modified watermark
//! is an external collaborator. This module defines the contract it must
//! satisfy — [`KeyValueStore`]: atomic per-key `get`/`set`/`delete` with an
//! optional TTL on writes — plus the typed views the renderer actually talks
//! to ([`WatermarkStore`], [`CacheStore`]) and an in-process implementation
//! ([`MemoryStore`]) for tests and small deployments.
//!
//! No cross-key or check-then-set atomicity is assumed anywhere; see the
//! watermark documentation for the accepted last-write-wins races.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod cache;
pub mod memory;
pub mod watermark;

pub use cache::{CacheStore, CacheTtl};
pub use memory::MemoryStore;
pub use watermark::WatermarkStore;

/// Errors surfaced by a store backend.
///
/// Store failures are propagated, never recovered locally — retry policy,
/// if any, belongs to the backend itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// The contract an external key-value store must satisfy.
///
/// Values are [`serde_json::Value`], so any serializable payload round-trips
/// without the store knowing its shape. Implementations must provide atomic
/// `get`/`set`/`delete` per key; nothing stronger is required.
///
/// A `ttl` of `None` on [`set`](Self::set) means the entry does not expire on
/// its own (it lives until an explicit [`delete`](Self::delete) or backend
/// eviction).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetches the value stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes the value stored under `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
