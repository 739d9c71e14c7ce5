//! Helper functions shared by the probe programs.

use aya_ebpf::helpers::{bpf_get_current_pid_tgid, bpf_ktime_get_ns};
use core::sync::atomic::{AtomicU64, Ordering};

use crate::maps::PROBE_HEALTH;

/// Current monotonic time in nanoseconds
#[inline(always)]
pub fn now_ns() -> u64 {
    unsafe { bpf_ktime_get_ns() }
}

/// Current process id (tgid)
#[inline(always)]
pub fn current_pid() -> u32 {
    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    (pid_tgid >> 32) as u32
}

/// Current thread id
#[inline(always)]
pub fn current_tid() -> u32 {
    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    pid_tgid as u32
}

/// Atomic fetch-and-add on a map-resident u64, so concurrent CPUs never
/// lose an increment.
#[inline(always)]
pub unsafe fn atomic_add(field: *mut u64, value: u64) {
    let counter = &*(field as *const AtomicU64);
    counter.fetch_add(value, Ordering::Relaxed);
}

/// Count a silent drop on one of the HEALTH_* slots.
#[inline(always)]
pub fn count_drop(slot: u32) {
    if let Some(ptr) = PROBE_HEALTH.get_ptr_mut(&slot) {
        unsafe { atomic_add(ptr, 1) };
    } else {
        let _ = PROBE_HEALTH.insert(&slot, &1u64, 0);
    }
}
