//! BPF map definitions for syscall latency tracking
//!
//! These maps are the data-plane contract with the userspace loader;
//! their key/value layouts come from syslat-common.

use aya_ebpf::{
    macros::map,
    maps::{HashMap, RingBuf},
};
use syslat_common::{
    SyscallStats, EVENT_RING_BYTES, HEALTH_SLOTS, MAX_PACKET_KEYS, MAX_SYSCALL_NR,
    MAX_TRACKED_THREADS,
};

/// Entry timestamps keyed by thread id
///
/// Armed on syscall entry (or by the scoped socket-entry filter) and
/// consumed by the matching exit. One stamp per thread; re-entry
/// overwrites.
#[map]
pub static PENDING_SYSCALLS: HashMap<u32, u64> =
    HashMap::with_max_entries(MAX_TRACKED_THREADS, 0);

/// Running {count, total, max} per syscall number, slow samples only
#[map]
pub static SYSCALL_STATS: HashMap<u32, SyscallStats> =
    HashMap::with_max_entries(MAX_SYSCALL_NR, 0);

/// Slow-syscall event records drained by the userspace consumer
#[map]
pub static EVENTS: RingBuf = RingBuf::with_byte_size(EVENT_RING_BYTES, 0);

/// Packets seen per caller id on the socket filter hook
#[map]
pub static PACKET_COUNTS: HashMap<u32, u64> = HashMap::with_max_entries(MAX_PACKET_KEYS, 0);

/// Cumulative bookkeeping nanoseconds per caller id on the socket
/// filter hook
#[map]
pub static PACKET_OVERHEAD_NS: HashMap<u32, u64> =
    HashMap::with_max_entries(MAX_PACKET_KEYS, 0);

/// Probe health counters
///
/// Every silent drop lands on one of the HEALTH_* slots defined in
/// syslat-common, so the loader can tell loss from quiet.
#[map]
pub static PROBE_HEALTH: HashMap<u32, u64> = HashMap::with_max_entries(HEALTH_SLOTS, 0);
