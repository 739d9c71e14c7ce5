//! Shared constants for the syslat probes
//!
//! These constants are the reference policy: the kernel programs bake
//! them in at compile time, and the host core uses them as defaults.

// ============================================================================
// Thresholds
// ============================================================================

/// Syscalls slower than this are reported (1ms).
pub const LATENCY_THRESHOLD_NS: u64 = 1_000_000;

// ============================================================================
// Table and channel capacities
// ============================================================================

/// Capacity of the pending-timestamp table (live kernel threads).
pub const MAX_TRACKED_THREADS: u32 = 10_000;

/// Key space of the per-syscall aggregate table. Covers the syscall
/// number range of every supported architecture.
pub const MAX_SYSCALL_NR: u32 = 1024;

/// Byte size of the slow-syscall event ring.
pub const EVENT_RING_BYTES: u32 = 256 * 1024;

/// Capacity of each packet-path table (distinct caller ids).
pub const MAX_PACKET_KEYS: u32 = 1000;

// ============================================================================
// Command names
// ============================================================================

/// Fixed length of a command name, NUL included (TASK_COMM_LEN).
pub const COMM_LEN: usize = 16;

/// Command-name prefix the scoped socket-entry filter arms on.
pub const TARGET_COMM: &str = "envoy";

// ============================================================================
// Probe-health counter slots (PROBE_HEALTH map in the kernel programs)
// ============================================================================

/// Entry timestamps dropped because the pending table was full
pub const HEALTH_PENDING_DROPPED: u32 = 0;

/// Slow-syscall events dropped because the ring was full
pub const HEALTH_EVENTS_DROPPED: u32 = 1;

/// Aggregate samples dropped because the stats table was full
pub const HEALTH_STATS_DROPPED: u32 = 2;

/// Packet-path samples dropped because a packet table was full
pub const HEALTH_PACKET_DROPPED: u32 = 3;

/// Total number of health counter slots
pub const HEALTH_SLOTS: u32 = 4;
