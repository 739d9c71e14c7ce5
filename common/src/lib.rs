//! Shared types and constants for the syslat probes
//!
//! This crate is the ABI contract between the eBPF programs, the host
//! tracing core, and any external loader or consumer: record layouts,
//! capacity/threshold constants, and the command-name matching rule.

#![no_std]

pub mod consts;
pub mod types;

// Re-export commonly used items
pub use consts::*;
pub use types::{comm_matches, SlowSyscallEvent, SyscallStats};
