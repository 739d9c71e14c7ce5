//! Syscall latency probes - kernel space programs
//!
//! Times every syscall per thread at the raw tracepoint level and
//! reports the slow ones.
//!
//! ## Architecture
//!
//! ```text
//! sys_enter     -> stamp PENDING_SYSCALLS[tid]
//! sys_exit      -> duration = now - stamp; stamp removed either way;
//!                  above the threshold -> EVENTS ring + SYSCALL_STATS
//! socket_enter  -> stamp only threads of the target process
//! packet_seen   -> per-caller packet counts on the socket filter hook
//! ```
//!
//! ## Usage
//!
//! Built for the bpfel-unknown-none target:
//!
//! ```bash
//! cargo build --release --target=bpfel-unknown-none
//! ```
//!
//! The userspace loader attaches the programs and drains the maps.

#![no_std]
#![no_main]

mod handlers;
mod helpers;
mod maps;

// Re-export the probe programs so they're visible to the loader
pub use handlers::{packet_seen, socket_enter, sys_enter, sys_exit};

// Re-export maps for verification
pub use maps::{
    EVENTS, PACKET_COUNTS, PACKET_OVERHEAD_NS, PENDING_SYSCALLS, PROBE_HEALTH, SYSCALL_STATS,
};

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    // eBPF programs cannot panic; the verifier rejects reachable panics.
    loop {}
}
