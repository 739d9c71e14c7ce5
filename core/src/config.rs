//! Tracer configuration.

use anyhow::{ensure, Context, Result};
use log::info;
use serde::Deserialize;
use std::path::Path;

use syslat_common::{consts, SlowSyscallEvent, COMM_LEN};

/// Sizing and policy knobs for one tracer instance.
///
/// Defaults mirror the compile-time policy the kernel programs ship
/// with; embedders and tests size their instances independently.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracerConfig {
    /// Report syscalls slower than this many nanoseconds.
    pub threshold_ns: u64,
    /// Pending-timestamp table capacity (live threads).
    pub thread_capacity: u32,
    /// Aggregate-table key space (syscall numbers).
    pub syscall_capacity: u32,
    /// Event ring size in bytes.
    pub ring_bytes: u32,
    /// Packet-path table capacity (distinct caller ids).
    pub packet_capacity: u32,
    /// Command-name prefix the scoped socket-entry filter arms on.
    pub target_comm: String,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            threshold_ns: consts::LATENCY_THRESHOLD_NS,
            thread_capacity: consts::MAX_TRACKED_THREADS,
            syscall_capacity: consts::MAX_SYSCALL_NR,
            ring_bytes: consts::EVENT_RING_BYTES,
            packet_capacity: consts::MAX_PACKET_KEYS,
            target_comm: consts::TARGET_COMM.to_string(),
        }
    }
}

impl TracerConfig {
    /// Load and validate a configuration from a JSON file. Missing
    /// fields fall back to the reference defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        info!("loaded tracer config from {}", path.display());
        Ok(config)
    }

    /// Reject configurations the tables cannot be built from.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.threshold_ns > 0, "threshold_ns must be nonzero");
        ensure!(self.thread_capacity > 0, "thread_capacity must be nonzero");
        ensure!(self.syscall_capacity > 0, "syscall_capacity must be nonzero");
        ensure!(self.packet_capacity > 0, "packet_capacity must be nonzero");
        let record = std::mem::size_of::<SlowSyscallEvent>();
        ensure!(
            self.ring_bytes as usize >= 2 * record,
            "ring_bytes must hold at least two {record}-byte event records"
        );
        ensure!(!self.target_comm.is_empty(), "target_comm must not be empty");
        ensure!(
            self.target_comm.len() < COMM_LEN,
            "target_comm must fit a {COMM_LEN}-byte comm field"
        );
        Ok(())
    }
}
