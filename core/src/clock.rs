//! Monotonic time sources for the probes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of monotonic nanosecond timestamps.
///
/// Probes take their clock as injected state so tests can drive time
/// explicitly; production instances use [`MonotonicClock`].
pub trait Clock: Send + Sync {
    /// Current monotonic time in nanoseconds.
    fn now_ns(&self) -> u64;
}

impl<C: Clock> Clock for Arc<C> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

/// Monotonic clock anchored at construction.
pub struct MonotonicClock {
    base: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        self.base.elapsed().as_nanos() as u64
    }
}

/// Hand-driven clock for deterministic tests.
///
/// Readings return the current value and then advance it by the
/// configured tick, so consecutive readings inside a single probe
/// invocation are distinguishable when a nonzero tick is set.
pub struct ManualClock {
    now: AtomicU64,
    tick: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ns),
            tick: AtomicU64::new(0),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ns: u64) {
        self.now.store(now_ns, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, delta_ns: u64) {
        self.now.fetch_add(delta_ns, Ordering::SeqCst);
    }

    /// Advance the clock by `tick_ns` on every reading.
    pub fn tick_by(&self, tick_ns: u64) {
        self.tick.store(tick_ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now
            .fetch_add(self.tick.load(Ordering::Relaxed), Ordering::SeqCst)
    }
}
