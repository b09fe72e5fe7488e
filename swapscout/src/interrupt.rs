use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared interrupt signal raised by a process-level signal handler.
///
/// Every raise bumps a shared counter. A handle reports `is_raised` only for
/// raises that happened after it was created with `armed`, so a long-lived
/// flag can hand each run its own view and an old signal never leaks into a
/// run started later. Only the scan loop polls it; later phases run to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicUsize>,
    baseline: usize,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.fetch_add(1, Ordering::SeqCst);
    }

    /// True if the signal was raised since this handle was armed
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst) > self.baseline
    }

    /// A handle on the same signal that ignores every raise so far
    pub fn armed(&self) -> Self {
        Self {
            raised: self.raised.clone(),
            baseline: self.raised.load(Ordering::SeqCst),
        }
    }
}
