//! Probe programs: syscall entry/exit timing, the scoped socket-entry
//! filter, and the packet-path counters.

use aya_ebpf::{
    helpers::bpf_get_current_comm,
    macros::{socket_filter, tracepoint},
    maps::HashMap,
    programs::{SkBuffContext, TracePointContext},
};
use syslat_common::{
    comm_matches, SlowSyscallEvent, SyscallStats, HEALTH_EVENTS_DROPPED, HEALTH_PACKET_DROPPED,
    HEALTH_PENDING_DROPPED, HEALTH_STATS_DROPPED, LATENCY_THRESHOLD_NS, TARGET_COMM,
};

use crate::helpers::{atomic_add, count_drop, current_pid, current_tid, now_ns};
use crate::maps::{EVENTS, PACKET_COUNTS, PACKET_OVERHEAD_NS, PENDING_SYSCALLS, SYSCALL_STATS};

/// Offset of the syscall id field in the raw_syscalls tracepoint data,
/// per /sys/kernel/debug/tracing/events/raw_syscalls/sys_exit/format.
const SYSCALL_ID_OFFSET: usize = 8;

/// Stamp every syscall entry for the calling thread
///
/// Attached to: raw_syscalls/sys_enter
#[tracepoint]
pub fn sys_enter(ctx: TracePointContext) -> u32 {
    match try_sys_enter(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_sys_enter(_ctx: &TracePointContext) -> Result<u32, i64> {
    arm_entry_stamp();
    Ok(0)
}

/// Evaluate the stamp on syscall exit and report slow calls
///
/// Attached to: raw_syscalls/sys_exit
#[tracepoint]
pub fn sys_exit(ctx: TracePointContext) -> u32 {
    match try_sys_exit(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_sys_exit(ctx: &TracePointContext) -> Result<u32, i64> {
    let tid = current_tid();
    let entered = match unsafe { PENDING_SYSCALLS.get(&tid) } {
        Some(ts) => *ts,
        // Untimed exit: the entry was never armed or its stamp was
        // dropped. The normal, frequent case.
        None => return Ok(0),
    };
    let duration_ns = now_ns().saturating_sub(entered);

    // The stamp is consumed whether or not the call was slow.
    let _ = PENDING_SYSCALLS.remove(&tid);

    if duration_ns <= LATENCY_THRESHOLD_NS {
        return Ok(0);
    }

    let syscall_nr = unsafe { ctx.read_at::<i64>(SYSCALL_ID_OFFSET)? } as u32;
    emit_event(tid, syscall_nr, duration_ns);
    update_stats(syscall_nr, duration_ns);
    Ok(0)
}

/// Arm the entry stamp only for threads of the target process
///
/// Attached to: syscalls/sys_enter_socket
#[tracepoint]
pub fn socket_enter(ctx: TracePointContext) -> u32 {
    match try_socket_enter(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_socket_enter(_ctx: &TracePointContext) -> Result<u32, i64> {
    let comm = bpf_get_current_comm()?;
    if comm_matches(&comm, TARGET_COMM.as_bytes()) {
        arm_entry_stamp();
    }
    Ok(0)
}

/// Count traffic per caller on the socket filter hook
///
/// Charges each caller id with a packet count and the nanoseconds this
/// invocation spent on its own table updates. Observes only; the
/// verdict always accepts the full packet.
#[socket_filter]
pub fn packet_seen(ctx: SkBuffContext) -> i64 {
    let entered = now_ns();
    let caller_id = current_pid();

    if !upsert_add(&PACKET_COUNTS, caller_id, 1) {
        count_drop(HEALTH_PACKET_DROPPED);
    }
    let spent = now_ns().saturating_sub(entered);
    if !upsert_add(&PACKET_OVERHEAD_NS, caller_id, spent) {
        count_drop(HEALTH_PACKET_DROPPED);
    }

    ctx.skb.len() as i64
}

/// Shared upsert for the entry stamp, used by both entry probes.
#[inline(always)]
fn arm_entry_stamp() {
    let tid = current_tid();
    let ts = now_ns();
    if PENDING_SYSCALLS.insert(&tid, &ts, 0).is_err() {
        // Table full: this thread's exit goes untimed.
        count_drop(HEALTH_PENDING_DROPPED);
    }
}

#[inline(always)]
fn emit_event(tid: u32, syscall_nr: u32, duration_ns: u64) {
    // Reserve-then-commit keeps partially written records invisible to
    // the drainer; a full ring drops the event without retrying.
    let Some(mut entry) = EVENTS.reserve::<SlowSyscallEvent>(0) else {
        count_drop(HEALTH_EVENTS_DROPPED);
        return;
    };
    entry.write(SlowSyscallEvent {
        pid: current_pid(),
        tid,
        duration_ns,
        syscall_nr,
        comm: bpf_get_current_comm().unwrap_or([0u8; 16]),
        _padding: [0; 4],
    });
    entry.submit(0);
}

#[inline(always)]
fn update_stats(syscall_nr: u32, duration_ns: u64) {
    if let Some(ptr) = SYSCALL_STATS.get_ptr_mut(&syscall_nr) {
        unsafe {
            let stats = &mut *ptr;
            atomic_add(&mut stats.count, 1);
            atomic_add(&mut stats.total_ns, duration_ns);
            // Racing CPUs may briefly publish a smaller max; count and
            // total never lose an update.
            if duration_ns > stats.max_ns {
                stats.max_ns = duration_ns;
            }
        }
    } else {
        let first = SyscallStats {
            count: 1,
            total_ns: duration_ns,
            max_ns: duration_ns,
        };
        if SYSCALL_STATS.insert(&syscall_nr, &first, 0).is_err() {
            count_drop(HEALTH_STATS_DROPPED);
        }
    }
}

/// Insert-or-accumulate on a u32 -> u64 counter map. Returns false when
/// the map is full.
#[inline(always)]
fn upsert_add(map: &HashMap<u32, u64>, key: u32, delta: u64) -> bool {
    if let Some(ptr) = map.get_ptr_mut(&key) {
        unsafe { atomic_add(ptr, delta) };
        true
    } else {
        map.insert(&key, &delta, 0).is_ok()
    }
}
