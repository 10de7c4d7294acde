//! Feed configuration and the render state machine.
//!
//! One [`Feed`] serves exactly one logical feed: it owns the identity key,
//! the typed store views, the data provider, and the registered observers,
//! and it drives a single request through the phases
//!
//! ```text
//! Init → HeaderGuard → ConditionalPhase → DataPhase → EmitPhase → Completion
//! ```
//!
//! The conditional phase may terminate the request with `304 Not Modified`
//! before any data is resolved; the `no-cache` query flag skips it entirely.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::conditional::{self, ConditionalRequest, Decision};
use crate::encode::{self, EncodeError, GzipMode};
use crate::guard::OnceFlag;
use crate::hooks::HookRegistry;
use crate::http::{Request, Response, StatusCode};
use crate::provider::{BoxError, DataProvider};
use crate::store::watermark::epoch_seconds_now;
use crate::store::{CacheStore, CacheTtl, KeyValueStore, StoreError, WatermarkStore};
use crate::VERSION;

/// Errors a render can terminate with.
///
/// None of these is recovered locally. `HeadersAlreadySent` is a programming
/// error in the host; the rest propagate to the host environment's default
/// error handling (spec'd as a bare error response, no custom body format).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("response headers were already sent before render began")]
    HeadersAlreadySent,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("data provider failed: {0}")]
    Provider(#[source] BoxError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Immutable configuration for one feed.
///
/// The identity key namespaces everything persistent — cache entries, the
/// watermark, and the version marker — so it must be unique across every
/// feed instance that shares a store.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    key: String,
    url: String,
    ttl: CacheTtl,
    cache_suffix: Option<String>,
}

impl FeedConfig {
    // TODO: reject identity keys outside [a-z0-9_-]; they flow into store
    // keys and the router pattern verbatim.

    /// Creates a config with the default one-hour cache TTL.
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            ttl: CacheTtl::default(),
            cache_suffix: None,
        }
    }

    /// Sets the cache TTL ([`CacheTtl::Disabled`] bypasses the cache store).
    #[must_use]
    pub fn cache_ttl(mut self, ttl: CacheTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets an extra cache-key suffix, for callers that want different cached
    /// results under the same identity key.
    #[must_use]
    pub fn cache_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.cache_suffix = Some(suffix.into());
        self
    }

    /// The feed's identity key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The URL pattern the external router should register for this feed.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The configured cache TTL.
    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    /// Identity key with a suffix appended.
    pub fn storage_key(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.key)
    }

    /// The cache entry key: `{key}-cache`, plus `-{suffix}` when configured.
    pub fn cache_key(&self) -> String {
        match &self.cache_suffix {
            Some(suffix) => self.storage_key(&format!("-cache-{suffix}")),
            None => self.storage_key("-cache"),
        }
    }

    /// The watermark key: `{key}-last-modified`.
    pub fn watermark_key(&self) -> String {
        self.storage_key("-last-modified")
    }

    /// The version-marker key: `{key}-version`.
    pub fn version_key(&self) -> String {
        self.storage_key("-version")
    }
}

/// The pattern → identity-key mapping an external router registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    pub pattern: String,
    pub key: String,
}

/// How final the content revision behind a write event is.
///
/// Autosaves and previews are `Transient` and never advance the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    Final,
    Transient,
}

/// Explicit per-request state threaded through a render.
///
/// Carries the request itself plus the two flags that used to be ambient in
/// the system this design descends from: whether the host already emitted
/// response headers, and whether this request already advanced the watermark
/// (the first-render bootstrap must not do it twice).
pub struct RenderContext {
    request: Request,
    headers_sent: bool,
    watermark_updated: bool,
}

impl RenderContext {
    /// Creates a fresh context for one request.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            headers_sent: false,
            watermark_updated: false,
        }
    }

    /// The incoming request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Records that something upstream already emitted response headers.
    /// A subsequent [`Feed::render`] will fail fatally.
    pub fn mark_headers_sent(&mut self) {
        self.headers_sent = true;
    }

    /// Whether response headers were already emitted upstream.
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }
}

/// One cached, conditionally-served JSON feed.
pub struct Feed {
    config: FeedConfig,
    store: Arc<dyn KeyValueStore>,
    watermark: WatermarkStore,
    cache: CacheStore,
    provider: Arc<dyn DataProvider>,
    hooks: HookRegistry,
    gzip_mode: GzipMode,
}

impl Feed {
    /// Builds a feed over the given store and data provider.
    pub fn new(
        config: FeedConfig,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn DataProvider>,
    ) -> Self {
        let watermark = WatermarkStore::new(Arc::clone(&store), config.watermark_key());
        let cache = CacheStore::new(Arc::clone(&store), config.cache_key());
        Self {
            config,
            store,
            watermark,
            cache,
            provider,
            hooks: HookRegistry::new(),
            gzip_mode: GzipMode::default(),
        }
    }

    /// Replaces the observer registry.
    #[must_use]
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Selects the gzip path taken for gzip-capable clients.
    #[must_use]
    pub fn gzip_mode(mut self, mode: GzipMode) -> Self {
        self.gzip_mode = mode;
        self
    }

    /// The feed's configuration.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// What the external router should register for this feed.
    pub fn registration(&self) -> RouteBinding {
        RouteBinding {
            pattern: self.config.url.clone(),
            key: self.config.key.clone(),
        }
    }

    /// Renders one request.
    ///
    /// Returns the finished response: `200` with the (possibly gzipped) JSON
    /// payload, or `304` with no body and `Connection: close` when the
    /// client's validators are current.
    ///
    /// # Errors
    ///
    /// - [`RenderError::HeadersAlreadySent`] — the header guard tripped; the
    ///   host must terminate the request with no body.
    /// - [`RenderError::Store`] / [`RenderError::Provider`] /
    ///   [`RenderError::Encode`] — propagated to the host's default error
    ///   handling; no retries, no custom error body.
    pub async fn render(&self, ctx: &mut RenderContext) -> Result<Response, RenderError> {
        self.hooks.will_render(&self.config.key);

        if ctx.headers_sent {
            error!(key = %self.config.key, "headers already sent before render");
            return Err(RenderError::HeadersAlreadySent);
        }

        let mut response = Response::new(StatusCode::Ok);
        let mut last_modified = None;

        if !ctx.request.query_flag("no-cache") {
            let lm = self.resolve_watermark(ctx).await?;
            last_modified = Some(lm);

            let etag = self.hooks.filter_etag(
                conditional::content_etag(lm, VERSION),
                &self.config.key,
                lm,
                VERSION,
            );
            let date = self
                .hooks
                .filter_http_date(conditional::http_date(lm), &self.config.key);

            // These directives accompany both outcomes of the negotiation.
            response.add_header("Last-Modified", &date);
            response.add_header("ETag", format!("\"{etag}\""));
            response.add_header("Cache-Control", "public");

            let cond = ConditionalRequest::from_headers(ctx.request.headers());
            if conditional::decide(lm, &etag, &cond) == Decision::NotModified {
                self.hooks.not_modified(&self.config.key);
                debug!(key = %self.config.key, %etag, "not modified — short-circuiting");
                let mut not_modified = Response::new(StatusCode::NotModified).keep_alive(false);
                for (name, value) in response.headers().iter() {
                    not_modified.add_header(name, value);
                }
                return Ok(not_modified);
            }
        } else {
            debug!(key = %self.config.key, "no-cache override — conditional phase skipped");
        }

        let lm_for_provider = match last_modified {
            Some(lm) => Some(lm),
            None => self.watermark.get().await?,
        };
        let payload = self.cache_or_compute(lm_for_provider).await?;

        let response = encode::encode(
            &payload,
            ctx.request.accepts_gzip(),
            self.gzip_mode,
            response,
        )?;

        self.hooks.did_render(&self.config.key);
        Ok(response)
    }

    /// Notifies the feed that its underlying content changed.
    ///
    /// Advances the watermark to "now" and deletes the cache entry, so the
    /// next render recomputes against fresh data — cache and watermark stay
    /// consistent by write-side invalidation. Transient revisions are
    /// ignored, and `guard` deduplicates repeated notifications for the same
    /// logical change (the caller creates one [`OnceFlag`] per change).
    pub async fn on_content_changed(
        &self,
        revision: Revision,
        guard: &OnceFlag,
    ) -> Result<(), StoreError> {
        if revision == Revision::Transient {
            debug!(key = %self.config.key, "transient revision — watermark untouched");
            return Ok(());
        }
        if !guard.fire() {
            return Ok(());
        }

        let now = epoch_seconds_now();
        self.watermark.set(now).await?;
        self.cache.invalidate().await?;
        info!(key = %self.config.key, watermark = now, "content changed — cache invalidated");
        Ok(())
    }

    /// Compares the persisted version marker against the running crate
    /// version and, on upgrade, persists the new version and invokes
    /// `refresh` (a registration-refresh hook for the external router).
    ///
    /// `refresh_guard` gates the hook to at most one firing per process
    /// lifetime, even when several feed instances migrate concurrently —
    /// share one flag across them. Returns `true` if the marker was advanced.
    pub async fn sync_version(
        &self,
        refresh_guard: &OnceFlag,
        refresh: impl FnOnce(),
    ) -> Result<bool, StoreError> {
        let key = self.config.version_key();
        let stored = match self.store.get(&key).await? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        if let Some(stored) = &stored {
            if version_cmp(stored, VERSION) != Ordering::Less {
                return Ok(false);
            }
        }

        self.store
            .set(&key, Value::String(VERSION.to_owned()), None)
            .await?;
        if refresh_guard.fire() {
            info!(key = %self.config.key, version = VERSION, "version advanced — refreshing registration");
            refresh();
        }
        Ok(true)
    }

    /// Reads the watermark, establishing it as "now" on first render.
    ///
    /// The bootstrap goes through the same write path as a content change
    /// (persist watermark, invalidate cache), guarded by the request-scoped
    /// flag. Concurrent first renders may race here; last-write-wins is
    /// acceptable because every candidate value postdates any cached payload.
    async fn resolve_watermark(&self, ctx: &mut RenderContext) -> Result<i64, StoreError> {
        if let Some(lm) = self.watermark.get().await? {
            return Ok(lm);
        }

        let now = epoch_seconds_now();
        if !ctx.watermark_updated {
            ctx.watermark_updated = true;
            self.watermark.set(now).await?;
            self.cache.invalidate().await?;
            info!(key = %self.config.key, watermark = now, "watermark established on first render");
        }
        Ok(now)
    }

    /// The cache-or-compute protocol.
    ///
    /// A disabled TTL bypasses the store entirely; otherwise a miss invokes
    /// the provider and repopulates the entry. `None` from the cache is a
    /// true miss — any JSON value, `null` included, is a present payload.
    async fn cache_or_compute(&self, last_modified: Option<i64>) -> Result<Value, RenderError> {
        let Some(ttl) = self.config.ttl.duration() else {
            return self.invoke_provider(last_modified).await;
        };

        if let Some(hit) = self.cache.get().await? {
            debug!(key = %self.config.key, "cache hit");
            return Ok(hit);
        }

        let payload = self.invoke_provider(last_modified).await?;
        self.cache.set(payload.clone(), ttl).await?;
        Ok(payload)
    }

    async fn invoke_provider(&self, last_modified: Option<i64>) -> Result<Value, RenderError> {
        debug!(key = %self.config.key, "invoking data provider");
        self.provider
            .fetch(&self.config.url, &self.config.key, last_modified)
            .await
            .map_err(RenderError::Provider)
    }
}

/// Dotted-numeric version comparison (`"0.2.0" > "0.1.10" > "0.1.9"`).
/// Non-numeric segments compare as zero; missing segments compare as zero.
fn version_cmp(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.trim()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
