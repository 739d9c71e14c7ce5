//! Per-syscall aggregate statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use syslat_common::SyscallStats;

#[derive(Default)]
struct StatSlot {
    count: AtomicU64,
    total_ns: AtomicU64,
    max_ns: AtomicU64,
}

/// Aggregate table indexed directly by syscall number.
///
/// The syscall number space is small and fixed, so the table is a flat
/// array of atomic slots; a record exists once its count is nonzero.
/// `count` and `total_ns` accumulate with fetch-add and never lose an
/// update under concurrent writers. `max_ns` resolves concurrent maxima
/// with fetch-max, so it never decreases and never loses the larger of
/// two racing samples.
pub struct StatsTable {
    slots: Box<[StatSlot]>,
}

impl StatsTable {
    /// Table covering syscall numbers `0..capacity`.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "stats capacity must be nonzero");
        let slots = (0..capacity).map(|_| StatSlot::default()).collect();
        Self { slots }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Fold one qualifying sample into the aggregate for `syscall_nr`.
    ///
    /// Returns false when the syscall number falls outside the key
    /// space; the sample is dropped and existing records are untouched.
    pub fn record(&self, syscall_nr: u32, duration_ns: u64) -> bool {
        let Some(slot) = self.slots.get(syscall_nr as usize) else {
            return false;
        };
        slot.count.fetch_add(1, Ordering::Relaxed);
        slot.total_ns.fetch_add(duration_ns, Ordering::Relaxed);
        slot.max_ns.fetch_max(duration_ns, Ordering::Relaxed);
        true
    }

    /// Read the aggregate for one syscall number, if any sample landed.
    pub fn get(&self, syscall_nr: u32) -> Option<SyscallStats> {
        let slot = self.slots.get(syscall_nr as usize)?;
        let count = slot.count.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }
        Some(SyscallStats {
            count,
            total_ns: slot.total_ns.load(Ordering::Relaxed),
            max_ns: slot.max_ns.load(Ordering::Relaxed),
        })
    }

    /// Live records in syscall-number order (exact at quiescence).
    pub fn snapshot(&self) -> Vec<(u32, SyscallStats)> {
        (0..self.capacity())
            .filter_map(|nr| self.get(nr).map(|stats| (nr, stats)))
            .collect()
    }
}
