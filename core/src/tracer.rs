//! Syscall latency tracing core: entry/exit timing, slow-call event
//! emission, and per-syscall aggregation.

use log::debug;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use syslat_common::{comm_matches, SlowSyscallEvent, SyscallStats, COMM_LEN};

use crate::clock::{Clock, MonotonicClock};
use crate::config::TracerConfig;
use crate::map::AtomicTable;
use crate::ring::EventRing;
use crate::stats::StatsTable;

/// Identity of the thread entering or leaving a syscall, as the kernel
/// hooks report it.
#[derive(Clone, Copy, Debug)]
pub struct Task {
    pub pid: u32,
    pub tid: u32,
    pub comm: [u8; COMM_LEN],
}

impl Task {
    /// Build a task identity. `comm` is truncated to 15 bytes; the
    /// stored name is always NUL-terminated.
    pub fn new(pid: u32, tid: u32, comm: &str) -> Self {
        let mut fixed = [0u8; COMM_LEN];
        let bytes = comm.as_bytes();
        let n = bytes.len().min(COMM_LEN - 1);
        fixed[..n].copy_from_slice(&bytes[..n]);
        Self {
            pid,
            tid,
            comm: fixed,
        }
    }
}

#[derive(Default)]
struct DropCounters {
    pending: AtomicU64,
    events: AtomicU64,
    aggregates: AtomicU64,
}

impl DropCounters {
    fn snapshot(&self) -> DropCounts {
        DropCounts {
            pending: self.pending.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            aggregates: self.aggregates.load(Ordering::Relaxed),
        }
    }
}

/// How many writes each capacity-bounded structure silently dropped.
///
/// The kernel programs drop without a trace beyond their health map;
/// here every drop path is counted so saturation behavior is
/// assertable.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    /// Entry stamps dropped because the pending table was full
    pub pending: u64,
    /// Events dropped because the ring was full
    pub events: u64,
    /// Samples dropped because the aggregate table was full
    pub aggregates: u64,
}

/// Aggregate record for one syscall number, flattened for export.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct SyscallAggregate {
    pub syscall_nr: u32,
    pub count: u64,
    pub total_ns: u64,
    pub max_ns: u64,
}

/// Serializable view of the tracer's observable state.
#[derive(Serialize, Debug, Clone)]
pub struct TracerSnapshot {
    /// Syscalls with at least one qualifying sample, in number order
    pub syscalls: Vec<SyscallAggregate>,
    /// Silent-drop counters
    pub drops: DropCounts,
    /// Threads currently inside an instrumented syscall
    pub pending_threads: usize,
}

/// The tracing core: owns the pending-timestamp table, the per-syscall
/// aggregate table, and the event ring, and exposes the probe entry
/// points the kernel hooks drive.
///
/// Every operation runs to completion without blocking or allocating;
/// capacity exhaustion anywhere drops the newest write and bumps a
/// [`DropCounts`] field.
pub struct SyscallTracer<C = MonotonicClock> {
    clock: C,
    threshold_ns: u64,
    target_comm: Box<[u8]>,
    pending: AtomicTable,
    stats: StatsTable,
    events: EventRing,
    drops: DropCounters,
}

impl SyscallTracer<MonotonicClock> {
    /// Tracer on the monotonic system clock.
    ///
    /// # Panics
    ///
    /// Panics when a capacity in `config` is zero or the ring cannot
    /// hold two records; [`TracerConfig::validate`] rejects such
    /// configurations up front.
    pub fn new(config: &TracerConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> SyscallTracer<C> {
    /// Tracer on an injected clock.
    pub fn with_clock(config: &TracerConfig, clock: C) -> Self {
        debug!(
            "tracer: threshold {}ns, {} thread slots, {} syscall slots, {} ring bytes, target {:?}",
            config.threshold_ns,
            config.thread_capacity,
            config.syscall_capacity,
            config.ring_bytes,
            config.target_comm,
        );
        Self {
            clock,
            threshold_ns: config.threshold_ns,
            target_comm: config.target_comm.as_bytes().into(),
            pending: AtomicTable::new(config.thread_capacity),
            stats: StatsTable::new(config.syscall_capacity),
            events: EventRing::with_byte_size(config.ring_bytes),
            drops: DropCounters::default(),
        }
    }

    /// Syscall-entry probe: stamp the calling thread.
    ///
    /// Fire-and-forget. A re-entering thread overwrites its own stamp
    /// (no nesting); when the table is full the stamp is dropped and
    /// the matching exit goes untimed.
    pub fn sys_enter(&self, tid: u32) {
        let now = self.clock.now_ns();
        if !self.pending.upsert(tid, now) {
            self.drops.pending.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Syscall-exit probe: evaluate the stamp, clean it up, and fan out
    /// to the event ring and the aggregate table when the call was
    /// slow.
    pub fn sys_exit(&self, task: &Task, syscall_nr: u32) {
        // Untimed exits are the common case: the entry was never armed
        // or its stamp was dropped. The stamp is consumed here whether
        // or not the call qualifies.
        let Some(entered) = self.pending.remove(task.tid) else {
            return;
        };
        let duration_ns = self.clock.now_ns().saturating_sub(entered);
        if duration_ns <= self.threshold_ns {
            return;
        }
        // Emission and aggregation are independent best-effort sinks;
        // one failing never stops the other.
        self.emit(task, syscall_nr, duration_ns);
        if !self.stats.record(syscall_nr, duration_ns) {
            self.drops.aggregates.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn emit(&self, task: &Task, syscall_nr: u32, duration_ns: u64) {
        let event = SlowSyscallEvent {
            pid: task.pid,
            tid: task.tid,
            duration_ns,
            syscall_nr,
            comm: task.comm,
            _padding: [0; 4],
        };
        if !self.events.push(event) {
            self.drops.events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Socket-creation entry probe: stamp only threads of the target
    /// process, so unrelated traffic stays uninstrumented.
    pub fn socket_enter(&self, task: &Task) {
        if comm_matches(&task.comm, &self.target_comm) {
            self.sys_enter(task.tid);
        }
    }

    /// Drain one published event, oldest first.
    pub fn next_event(&self) -> Option<SlowSyscallEvent> {
        self.events.pop()
    }

    /// Drain everything currently published.
    pub fn drain_events(&self) -> Vec<SlowSyscallEvent> {
        std::iter::from_fn(|| self.events.pop()).collect()
    }

    /// Aggregate for one syscall number, if any sample qualified.
    pub fn stats(&self, syscall_nr: u32) -> Option<SyscallStats> {
        self.stats.get(syscall_nr)
    }

    /// True while an entry stamp for `tid` awaits its exit.
    pub fn has_pending(&self, tid: u32) -> bool {
        self.pending.get(tid).is_some()
    }

    pub fn drop_counts(&self) -> DropCounts {
        self.drops.snapshot()
    }

    /// Serializable view of aggregates, drops, and pending threads.
    pub fn snapshot(&self) -> TracerSnapshot {
        TracerSnapshot {
            syscalls: self
                .stats
                .snapshot()
                .into_iter()
                .map(|(syscall_nr, stats)| SyscallAggregate {
                    syscall_nr,
                    count: stats.count,
                    total_ns: stats.total_ns,
                    max_ns: stats.max_ns,
                })
                .collect(),
            drops: self.drops.snapshot(),
            pending_threads: self.pending.len(),
        }
    }
}
