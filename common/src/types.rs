//! Data structures shared between kernel and userspace
//!
//! These structures must be repr(C) to ensure consistent memory layout
//! between the eBPF programs, the host tracing core, and map readers.

use crate::consts::COMM_LEN;

/// Record published on the event ring for every syscall that crossed
/// the slow threshold.
///
/// The layout is part of the ABI: 40 bytes, u64-aligned. `comm` holds
/// at most 15 content bytes and is always NUL-terminated.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct SlowSyscallEvent {
    /// Process id (tgid) of the caller
    pub pid: u32,
    /// Thread id of the caller
    pub tid: u32,
    /// Measured syscall duration in nanoseconds
    pub duration_ns: u64,
    /// Syscall number reported at the exit hook
    pub syscall_nr: u32,
    /// Command name of the caller, truncated
    pub comm: [u8; COMM_LEN],
    /// Padding for alignment
    pub _padding: [u8; 4],
}

/// Running aggregate for one syscall number, slow samples only.
///
/// `count * average <= total_ns` holds by construction; `max_ns` never
/// decreases.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyscallStats {
    /// Qualifying samples folded in so far
    pub count: u64,
    /// Sum of their durations in nanoseconds
    pub total_ns: u64,
    /// Largest single duration in nanoseconds
    pub max_ns: u64,
}

// Compile-time layout checks; these sizes are fixed by the map and ring
// record contract.
const _: () = {
    assert!(core::mem::size_of::<SlowSyscallEvent>() == 40);
    assert!(core::mem::align_of::<SlowSyscallEvent>() == 8);
    assert!(core::mem::size_of::<SyscallStats>() == 24);
};

/// Prefix comparison for fixed-length command names.
///
/// Matches when every byte of `target` appears at the start of `comm`.
/// A target longer than the comm field never matches; an empty target
/// matches everything.
#[inline]
pub fn comm_matches(comm: &[u8; COMM_LEN], target: &[u8]) -> bool {
    if target.len() > COMM_LEN {
        return false;
    }
    let mut i = 0;
    while i < target.len() {
        if comm[i] != target[i] {
            return false;
        }
        i += 1;
    }
    true
}

// Implement Aya's Pod trait for userspace usage
#[cfg(feature = "userspace")]
mod userspace_impls {
    use super::*;

    // Pod trait implementations for reading maps and ring records in
    // userspace loaders
    unsafe impl aya::Pod for SlowSyscallEvent {}
    unsafe impl aya::Pod for SyscallStats {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comm(name: &str) -> [u8; COMM_LEN] {
        let mut fixed = [0u8; COMM_LEN];
        fixed[..name.len()].copy_from_slice(name.as_bytes());
        fixed
    }

    #[test]
    fn test_prefix_match() {
        assert!(comm_matches(&comm("envoy"), b"envoy"));
        assert!(comm_matches(&comm("envoy-worker"), b"envoy"));
        assert!(!comm_matches(&comm("envo"), b"envoy"));
        assert!(!comm_matches(&comm("nginx"), b"envoy"));
    }

    #[test]
    fn test_empty_target_matches_everything() {
        assert!(comm_matches(&comm("anything"), b""));
        assert!(comm_matches(&[0u8; COMM_LEN], b""));
    }

    #[test]
    fn test_overlong_target_never_matches() {
        let target = [b'a'; COMM_LEN + 1];
        assert!(!comm_matches(&[b'a'; COMM_LEN], &target));
    }

    #[test]
    fn test_full_width_target() {
        let target = [b'x'; COMM_LEN];
        assert!(comm_matches(&[b'x'; COMM_LEN], &target));
    }
}
