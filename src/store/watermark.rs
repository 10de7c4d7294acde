//! Last-modified watermark, one integer timestamp per feed.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use super::{KeyValueStore, StoreError};

/// Typed view over the store slot holding a feed's last-modified timestamp
/// (seconds since epoch).
///
/// The watermark is advanced by write events and established on demand during
/// a feed's first render. It never decreases in normal operation, but that is
/// an expectation of the write side, not something this wrapper enforces:
/// concurrent writers resolve last-write-wins (the store only guarantees
/// per-key atomicity).
#[derive(Clone)]
pub struct WatermarkStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl WatermarkStore {
    /// Creates a view bound to the given storage key
    /// (conventionally `{identity_key}-last-modified`).
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Reads the watermark. Absent or malformed stored values both read as
    /// `None`; a malformed value is logged and left for the next write to
    /// replace.
    pub async fn get(&self) -> Result<Option<i64>, StoreError> {
        match self.store.get(&self.key).await? {
            None => Ok(None),
            Some(Value::Number(n)) if n.as_i64().is_some() => Ok(n.as_i64()),
            Some(other) => {
                warn!(key = %self.key, value = %other, "malformed watermark, treating as absent");
                Ok(None)
            }
        }
    }

    /// Persists the watermark. Watermarks never expire on their own.
    pub async fn set(&self, timestamp: i64) -> Result<(), StoreError> {
        self.store
            .set(&self.key, Value::from(timestamp), None)
            .await
    }
}

/// Current wall-clock time as whole seconds since the epoch.
pub(crate) fn epoch_seconds_now() -> i64 {
    Utc::now().timestamp()
}
