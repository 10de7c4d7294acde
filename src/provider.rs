//! Data provider seam — the callback that computes a feed's raw content.

use async_trait::async_trait;
use serde_json::Value;

/// Boxed error type for provider failures.
///
/// Provider errors are not recovered locally; they propagate out of the
/// render as [`RenderError::Provider`](crate::feed::RenderError::Provider)
/// and the host environment produces its own error response.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Produces the feed's payload on a cache miss.
///
/// Invoked with the feed's URL pattern, identity key, and current
/// last-modified watermark (absent when the conditional phase was skipped
/// before the watermark was ever established). The result is cached verbatim,
/// so implementations must be pure enough to be cache-safe; idempotence is
/// assumed, not enforced.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Computes the payload.
    async fn fetch(
        &self,
        url: &str,
        key: &str,
        last_modified: Option<i64>,
    ) -> Result<Value, BoxError>;
}

/// A provider that always returns a fixed value. Handy for demos and tests.
pub struct StaticProvider(pub Value);

#[async_trait]
impl DataProvider for StaticProvider {
    async fn fetch(&self, _url: &str, _key: &str, _lm: Option<i64>) -> Result<Value, BoxError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn static_provider_returns_its_value() {
        let p = StaticProvider(json!([{"id": 1}]));
        let v = p.fetch("feed/deals", "deals", Some(1)).await.unwrap();
        assert_eq!(v, json!([{"id": 1}]));
    }
}
