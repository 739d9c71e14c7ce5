//! Host-side model of the syslat probe data plane
//!
//! The eBPF programs in `syslat-ebpf` run in a context that cannot
//! block, allocate, or report errors. This crate carries the same data
//! plane as explicit, injected state objects so the semantics stay
//! testable: bounded tables with atomic slots, a lossy reserve/commit
//! event ring, and probe entry points that absorb every failure as a
//! counted drop instead of propagating it.
//!
//! Two independent pipelines are modeled:
//! - [`SyscallTracer`]: per-thread syscall entry/exit timing, slow-call
//!   event emission, and per-syscall aggregates, plus the scoped
//!   socket-entry filter.
//! - [`PacketCounter`]: per-caller observation counters on the socket
//!   data path.

pub mod clock;
pub mod config;
pub mod map;
pub mod packet;
pub mod ring;
pub mod stats;
pub mod tracer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::TracerConfig;
pub use packet::{PacketCounter, Verdict};
pub use ring::EventRing;
pub use stats::StatsTable;
pub use tracer::{DropCounts, SyscallTracer, Task, TracerSnapshot};
