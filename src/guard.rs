//! One-shot guards for "do this at most once" lifecycle points.
//!
//! Two places need one: deduplicating write-event notifications for a single
//! logical content change, and gating the version-migration refresh to a
//! single firing per process lifetime. Both are explicit values owned by the
//! caller — there is no ambient global state.

use std::sync::atomic::{AtomicBool, Ordering};

/// A set-once flag. [`fire`](Self::fire) returns `true` exactly on the first
/// call, `false` ever after.
#[derive(Debug, Default)]
pub struct OnceFlag {
    fired: AtomicBool,
}

impl OnceFlag {
    /// Creates a flag that has not fired yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flag. Returns `true` for the first caller only.
    pub fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    /// Returns `true` if the flag has already fired.
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
