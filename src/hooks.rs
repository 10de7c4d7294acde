//! Lifecycle hooks — an ordered observer registry for external collaborators.
//!
//! The render pipeline fires named extension points at well-defined moments.
//! Observers are invoked in registration order; this crate defines *when* and
//! *with what arguments* each point fires, and nothing about what observers do
//! with them.
//!
//! Firing order over one render:
//!
//! 1. [`will_render`](FeedObserver::will_render) — before anything else.
//! 2. [`filter_etag`](FeedObserver::filter_etag) — once the fingerprint is
//!    computed; each observer sees the previous observer's output.
//! 3. [`filter_http_date`](FeedObserver::filter_http_date) — once the
//!    `Last-Modified` value is formatted; chained the same way.
//! 4. [`not_modified`](FeedObserver::not_modified) — exactly once, immediately
//!    before the `304` short-circuit; never fired when rendering proceeds.
//! 5. [`did_render`](FeedObserver::did_render) — after the payload is emitted;
//!    not reached when the render terminated at step 4.
//!
//! Steps 2–4 are skipped when the request carries the `no-cache` override;
//! `did_render` still fires on any completed render.

use std::sync::Arc;

/// Observer of feed render lifecycle points.
///
/// Every method has a no-op (or pass-through) default, so implementations
/// only override the points they care about.
pub trait FeedObserver: Send + Sync {
    /// Fired before rendering begins.
    fn will_render(&self, key: &str) {
        let _ = key;
    }

    /// Pass-through mutation point for the computed ETag.
    fn filter_etag(&self, etag: String, key: &str, last_modified: i64, entropy: &str) -> String {
        let _ = (key, last_modified, entropy);
        etag
    }

    /// Pass-through mutation point for the formatted `Last-Modified` value.
    fn filter_http_date(&self, date: String, key: &str) -> String {
        let _ = key;
        date
    }

    /// Fired exactly once per `NotModified` decision, immediately before the
    /// `304` short-circuit.
    fn not_modified(&self, key: &str) {
        let _ = key;
    }

    /// Fired after a completed render (never after a `304` short-circuit).
    fn did_render(&self, key: &str) {
        let _ = key;
    }
}

/// An explicit, ordered list of registered observers.
#[derive(Clone, Default)]
pub struct HookRegistry {
    observers: Vec<Arc<dyn FeedObserver>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer. Observers fire in registration order.
    pub fn register(&mut self, observer: Arc<dyn FeedObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn will_render(&self, key: &str) {
        for obs in &self.observers {
            obs.will_render(key);
        }
    }

    pub(crate) fn filter_etag(
        &self,
        etag: String,
        key: &str,
        last_modified: i64,
        entropy: &str,
    ) -> String {
        self.observers.iter().fold(etag, |etag, obs| {
            obs.filter_etag(etag, key, last_modified, entropy)
        })
    }

    pub(crate) fn filter_http_date(&self, date: String, key: &str) -> String {
        self.observers
            .iter()
            .fold(date, |date, obs| obs.filter_http_date(date, key))
    }

    pub(crate) fn not_modified(&self, key: &str) {
        for obs in &self.observers {
            obs.not_modified(key);
        }
    }

    pub(crate) fn did_render(&self, key: &str) {
        for obs in &self.observers {
            obs.did_render(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Tagger {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl FeedObserver for Tagger {
        fn will_render(&self, key: &str) {
            self.log.lock().unwrap().push(format!("{}:{key}", self.tag));
        }

        fn filter_etag(&self, etag: String, _: &str, _: i64, _: &str) -> String {
            format!("{etag}-{}", self.tag)
        }
    }

    #[test]
    fn observers_fire_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        hooks.register(Arc::new(Tagger {
            tag: "a",
            log: Arc::clone(&log),
        }));
        hooks.register(Arc::new(Tagger {
            tag: "b",
            log: Arc::clone(&log),
        }));

        hooks.will_render("deals");
        assert_eq!(*log.lock().unwrap(), vec!["a:deals", "b:deals"]);
    }

    #[test]
    fn filters_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        hooks.register(Arc::new(Tagger {
            tag: "a",
            log: Arc::clone(&log),
        }));
        hooks.register(Arc::new(Tagger {
            tag: "b",
            log,
        }));

        let out = hooks.filter_etag("etag".into(), "deals", 0, "");
        assert_eq!(out, "etag-a-b");
    }

    #[test]
    fn defaults_are_pass_through() {
        struct Noop;
        impl FeedObserver for Noop {}

        let mut hooks = HookRegistry::new();
        hooks.register(Arc::new(Noop));
        assert_eq!(hooks.filter_etag("e".into(), "k", 1, "v"), "e");
        assert_eq!(hooks.filter_http_date("d".into(), "k"), "d");
        hooks.not_modified("k");
        hooks.did_render("k");
    }
}
