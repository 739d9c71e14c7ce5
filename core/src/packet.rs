//! Packet-path observation counters.

use log::debug;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::clock::{Clock, MonotonicClock};
use crate::map::AtomicTable;

/// Verdict handed back to the socket-filter hook. The counter only
/// observes traffic, so the sole verdict is to accept the packet
/// unmodified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
}

/// Per-caller counters for the socket data path.
///
/// Two parallel tables keyed by a context-derived id: how many packets
/// each caller pushed through the hook, and the cumulative nanoseconds
/// the hook spent on its own bookkeeping while doing so. The second
/// number is deliberately self-referential — both timestamps are taken
/// inside a single invocation — so it measures instrumentation
/// overhead, not packet or syscall latency, and stays decoupled from
/// the entry/exit tracing pipeline.
pub struct PacketCounter<C = MonotonicClock> {
    clock: C,
    packets: AtomicTable,
    overhead_ns: AtomicTable,
    dropped_counts: AtomicU64,
    dropped_overhead: AtomicU64,
}

impl PacketCounter<MonotonicClock> {
    /// Counter on the monotonic system clock.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero.
    pub fn new(capacity: u32) -> Self {
        Self::with_clock(capacity, MonotonicClock::new())
    }
}

impl<C: Clock> PacketCounter<C> {
    /// Counter on an injected clock.
    pub fn with_clock(capacity: u32, clock: C) -> Self {
        debug!("packet counter: {capacity} caller slots");
        Self {
            clock,
            packets: AtomicTable::new(capacity),
            overhead_ns: AtomicTable::new(capacity),
            dropped_counts: AtomicU64::new(0),
            dropped_overhead: AtomicU64::new(0),
        }
    }

    /// Observe one unit of data from the caller identified by
    /// `caller_id`. Never filters: the verdict is always accept.
    pub fn observe(&self, caller_id: u32) -> Verdict {
        let entered = self.clock.now_ns();
        if !self.packets.add(caller_id, 1) {
            self.dropped_counts.fetch_add(1, Ordering::Relaxed);
        }
        let spent = self.clock.now_ns().saturating_sub(entered);
        if !self.overhead_ns.add(caller_id, spent) {
            self.dropped_overhead.fetch_add(1, Ordering::Relaxed);
        }
        Verdict::Accept
    }

    /// Packets observed for one caller.
    pub fn packets(&self, caller_id: u32) -> Option<u64> {
        self.packets.get(caller_id)
    }

    /// Cumulative bookkeeping nanoseconds charged to one caller.
    pub fn overhead_ns(&self, caller_id: u32) -> Option<u64> {
        self.overhead_ns.get(caller_id)
    }

    /// Serializable view of both tables and the drop counters.
    pub fn snapshot(&self) -> PacketSnapshot {
        let mut callers: Vec<PacketCallerStats> = self
            .packets
            .snapshot()
            .into_iter()
            .map(|(caller_id, packets)| PacketCallerStats {
                caller_id,
                packets,
                overhead_ns: self.overhead_ns.get(caller_id).unwrap_or(0),
            })
            .collect();
        callers.sort_unstable_by_key(|stats| stats.caller_id);
        PacketSnapshot {
            callers,
            dropped_counts: self.dropped_counts.load(Ordering::Relaxed),
            dropped_overhead: self.dropped_overhead.load(Ordering::Relaxed),
        }
    }
}

/// Counters for one caller id.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct PacketCallerStats {
    pub caller_id: u32,
    pub packets: u64,
    pub overhead_ns: u64,
}

/// Serializable view of the packet-path state.
#[derive(Serialize, Debug, Clone)]
pub struct PacketSnapshot {
    /// Callers in id order
    pub callers: Vec<PacketCallerStats>,
    /// Count-table writes dropped at capacity
    pub dropped_counts: u64,
    /// Overhead-table writes dropped at capacity
    pub dropped_overhead: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    #[test]
    fn test_counts_packets_per_caller() {
        let counter = PacketCounter::with_clock(8, ManualClock::new(0));
        assert_eq!(counter.observe(100), Verdict::Accept);
        assert_eq!(counter.observe(100), Verdict::Accept);
        assert_eq!(counter.observe(200), Verdict::Accept);

        assert_eq!(counter.packets(100), Some(2));
        assert_eq!(counter.packets(200), Some(1));
        assert_eq!(counter.packets(300), None);
    }

    #[test]
    fn test_overhead_measures_the_hook_itself() {
        let clock = Arc::new(ManualClock::new(0));
        // Each clock reading advances time by 5ns, so one observation
        // charges exactly the gap between its own two readings.
        clock.tick_by(5);
        let counter = PacketCounter::with_clock(8, Arc::clone(&clock));

        counter.observe(100);
        assert_eq!(counter.overhead_ns(100), Some(5));
        counter.observe(100);
        assert_eq!(counter.overhead_ns(100), Some(10));
    }

    #[test]
    fn test_overhead_is_not_wall_time_between_packets() {
        let clock = Arc::new(ManualClock::new(0));
        let counter = PacketCounter::with_clock(8, Arc::clone(&clock));

        counter.observe(100);
        // A long quiet period between packets charges nothing.
        clock.advance(1_000_000_000);
        counter.observe(100);
        assert_eq!(counter.overhead_ns(100), Some(0));
        assert_eq!(counter.packets(100), Some(2));
    }

    #[test]
    fn test_full_tables_count_drops_and_still_accept() {
        let counter = PacketCounter::with_clock(2, ManualClock::new(0));
        counter.observe(1);
        counter.observe(2);
        assert_eq!(counter.observe(3), Verdict::Accept);

        let snapshot = counter.snapshot();
        assert_eq!(snapshot.dropped_counts, 1);
        assert_eq!(snapshot.dropped_overhead, 1);
        // Existing callers are unaffected by the saturated insert.
        assert_eq!(counter.packets(1), Some(1));
        assert_eq!(counter.packets(2), Some(1));
        assert_eq!(counter.packets(3), None);
    }

    #[test]
    fn test_snapshot_pairs_the_two_tables() {
        let clock = Arc::new(ManualClock::new(0));
        clock.tick_by(3);
        let counter = PacketCounter::with_clock(8, Arc::clone(&clock));
        counter.observe(20);
        counter.observe(10);
        counter.observe(20);

        let snapshot = counter.snapshot();
        let ids: Vec<u32> = snapshot.callers.iter().map(|c| c.caller_id).collect();
        assert_eq!(ids, vec![10, 20]);
        let caller_20 = &snapshot.callers[1];
        assert_eq!(caller_20.packets, 2);
        assert_eq!(caller_20.overhead_ns, 6);
    }
}
