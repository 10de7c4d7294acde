//! Runnable demo: a single cached feed served over TCP.
//!
//! ```sh
//! cargo run --example feed_server
//! curl -v http://127.0.0.1:8080/feed/deals
//! curl -v -H 'If-None-Match: "<etag from above>"' http://127.0.0.1:8080/feed/deals
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use feedcache::feed::{Feed, FeedConfig};
use feedcache::host::FeedHost;
use feedcache::provider::{BoxError, DataProvider};
use feedcache::store::{CacheTtl, MemoryStore};

#[derive(Serialize)]
struct Deal {
    id: u32,
    title: &'static str,
}

/// A provider that pretends to run an expensive query.
struct DealsProvider;

#[async_trait]
impl DataProvider for DealsProvider {
    async fn fetch(&self, url: &str, key: &str, last_modified: Option<i64>) -> Result<Value, BoxError> {
        tracing::info!(%url, %key, ?last_modified, "computing feed payload");
        let deals = vec![
            Deal { id: 1, title: "Half-price espresso machines" },
            Deal { id: 2, title: "Free shipping weekend" },
        ];
        Ok(serde_json::to_value(deals)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let feed = Feed::new(
        FeedConfig::new("deals", "feed/deals").cache_ttl(CacheTtl::seconds(60)),
        Arc::new(MemoryStore::new()),
        Arc::new(DealsProvider),
    );

    let host = FeedHost::bind("127.0.0.1:8080", Arc::new(feed)).await?;
    println!("Listening on http://{}/feed/deals", host.local_addr());
    host.run().await?;
    Ok(())
}
