//! Global atomic counters for repair runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (the orchestrator does so at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    runs_started: AtomicU64,
    iterations: AtomicU64,
    failures_classified: AtomicU64,
    fixes_applied: AtomicU64,
    fixes_failed: AtomicU64,
    test_timeouts: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            failures_classified: AtomicU64::new(0),
            fixes_applied: AtomicU64::new(0),
            fixes_failed: AtomicU64::new(0),
            test_timeouts: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_started", "counter incremented");
    }

    pub fn inc_iterations(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "iterations", "counter incremented");
    }

    /// Add `n` classified failures.
    pub fn add_failures_classified(&self, n: u64) {
        self.failures_classified.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "failures_classified", n, "counter incremented");
    }

    pub fn inc_fixes_applied(&self) {
        self.fixes_applied.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "fixes_applied", "counter incremented");
    }

    pub fn inc_fixes_failed(&self) {
        self.fixes_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "fixes_failed", "counter incremented");
    }

    pub fn inc_test_timeouts(&self) {
        self.test_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "test_timeouts", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            iterations = self.iterations(),
            failures_classified = self.failures_classified(),
            fixes_applied = self.fixes_applied(),
            fixes_failed = self.fixes_failed(),
            test_timeouts = self.test_timeouts(),
        );
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub fn failures_classified(&self) -> u64 {
        self.failures_classified.load(Ordering::Relaxed)
    }

    pub fn fixes_applied(&self) -> u64 {
        self.fixes_applied.load(Ordering::Relaxed)
    }

    pub fn fixes_failed(&self) -> u64 {
        self.fixes_failed.load(Ordering::Relaxed)
    }

    pub fn test_timeouts(&self) -> u64 {
        self.test_timeouts.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.runs_started.store(0, Ordering::Relaxed);
        self.iterations.store(0, Ordering::Relaxed);
        self.failures_classified.store(0, Ordering::Relaxed);
        self.fixes_applied.store(0, Ordering::Relaxed);
        self.fixes_failed.store(0, Ordering::Relaxed);
        self.test_timeouts.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_runs_started();
        m.inc_iterations();
        m.inc_iterations();
        m.add_failures_classified(5);
        m.inc_fixes_applied();
        m.inc_fixes_failed();
        m.inc_test_timeouts();

        assert_eq!(m.runs_started(), 1);
        assert_eq!(m.iterations(), 2);
        assert_eq!(m.failures_classified(), 5);
        assert_eq!(m.fixes_applied(), 1);
        assert_eq!(m.fixes_failed(), 1);
        assert_eq!(m.test_timeouts(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_runs_started();
        m.add_failures_classified(3);
        m.inc_fixes_applied();
        m.reset();
        assert_eq!(m.runs_started(), 0);
        assert_eq!(m.failures_classified(), 0);
        assert_eq!(m.fixes_applied(), 0);
    }
}
