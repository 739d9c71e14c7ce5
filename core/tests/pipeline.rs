//! End-to-end exercises of the tracing core: entry/exit pairs through
//! event emission and aggregation, saturation behavior, and concurrent
//! probe invocations from many threads.

use std::collections::HashMap;
use std::sync::Arc;

use syslat_common::{SlowSyscallEvent, SyscallStats};
use syslat_core::{ManualClock, SyscallTracer, Task, TracerConfig};

fn config_with_ring(records: u32) -> TracerConfig {
    TracerConfig {
        ring_bytes: records * std::mem::size_of::<SlowSyscallEvent>() as u32,
        ..TracerConfig::default()
    }
}

fn manual_tracer(config: &TracerConfig) -> (Arc<ManualClock>, SyscallTracer<Arc<ManualClock>>) {
    let clock = Arc::new(ManualClock::new(0));
    let tracer = SyscallTracer::with_clock(config, Arc::clone(&clock));
    (clock, tracer)
}

#[test]
fn slow_open_is_reported_with_exact_fields() {
    let (clock, tracer) = manual_tracer(&TracerConfig::default());
    let task = Task::new(1234, 42, "envoy");

    tracer.sys_enter(42);
    clock.set(2_000_000);
    tracer.sys_exit(&task, 1);

    let event = tracer.next_event().expect("slow syscall must be reported");
    assert_eq!(event.tid, 42);
    assert_eq!(event.pid, 1234);
    assert_eq!(event.syscall_nr, 1);
    assert_eq!(event.duration_ns, 2_000_000);
    assert_eq!(&event.comm[..5], b"envoy");

    assert_eq!(
        tracer.stats(1),
        Some(SyscallStats {
            count: 1,
            total_ns: 2_000_000,
            max_ns: 2_000_000,
        })
    );
}

#[test]
fn fast_syscall_leaves_no_trace_but_clears_the_stamp() {
    let (clock, tracer) = manual_tracer(&TracerConfig::default());
    let task = Task::new(1234, 42, "envoy");

    tracer.sys_enter(42);
    assert!(tracer.has_pending(42));
    clock.set(500_000);
    tracer.sys_exit(&task, 1);

    assert!(tracer.next_event().is_none());
    assert_eq!(tracer.stats(1), None);
    assert!(!tracer.has_pending(42));
}

#[test]
fn ring_holds_exactly_its_capacity_and_drops_the_rest() {
    let k = 8u32;
    let (clock, tracer) = manual_tracer(&config_with_ring(k));
    let mut now = 0u64;
    for i in 0..=k {
        let task = Task::new(1, 100 + i, "envoy");
        clock.set(now);
        tracer.sys_enter(task.tid);
        now += 3_000_000;
        clock.set(now);
        tracer.sys_exit(&task, 2);
    }

    let events = tracer.drain_events();
    assert_eq!(events.len(), k as usize);
    // Commit order is preserved and every drained record is whole.
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.tid, 100 + i as u32);
        assert_eq!(event.duration_ns, 3_000_000);
    }
    assert_eq!(tracer.drop_counts().events, 1);
    // The aggregate saw all K+1 samples regardless.
    assert_eq!(tracer.stats(2).unwrap().count, u64::from(k) + 1);
}

#[test]
fn aggregates_are_order_independent() {
    let durations = [2_000_000u64, 5_000_000];
    for order in [[0, 1], [1, 0]] {
        let (clock, tracer) = manual_tracer(&TracerConfig::default());
        let task = Task::new(1, 42, "envoy");
        let mut now = 0;
        for idx in order {
            clock.set(now);
            tracer.sys_enter(42);
            now += durations[idx];
            clock.set(now);
            tracer.sys_exit(&task, 1);
        }
        assert_eq!(
            tracer.stats(1),
            Some(SyscallStats {
                count: 2,
                total_ns: 7_000_000,
                max_ns: 5_000_000,
            })
        );
    }
}

#[test]
fn saturated_pending_table_keeps_existing_stamps_correct() {
    let config = TracerConfig {
        thread_capacity: 4,
        ..TracerConfig::default()
    };
    let (clock, tracer) = manual_tracer(&config);

    for tid in 1..=4 {
        tracer.sys_enter(tid);
    }
    tracer.sys_enter(5);
    assert_eq!(tracer.drop_counts().pending, 1);

    clock.set(2_000_000);
    for tid in 1..=5 {
        tracer.sys_exit(&Task::new(1, tid, "envoy"), 0);
    }
    let events = tracer.drain_events();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.duration_ns == 2_000_000));
    assert!(events.iter().all(|e| e.tid <= 4));
}

#[test]
fn concurrent_threads_account_every_qualifying_sample() {
    // An auto-advancing clock makes every syscall take at least one
    // tick, so with a 1ns threshold every sample qualifies. Durations
    // are nondeterministic under interleaving; the invariant is that
    // the aggregates agree exactly with the events that were drained.
    let threads = 8u32;
    let iterations = 50u64;
    let config = TracerConfig {
        threshold_ns: 1,
        ..config_with_ring(threads * iterations as u32)
    };
    let clock = Arc::new(ManualClock::new(0));
    clock.tick_by(10);
    let tracer = Arc::new(SyscallTracer::with_clock(&config, Arc::clone(&clock)));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let tracer = Arc::clone(&tracer);
            std::thread::spawn(move || {
                let tid = 1000 + t;
                let task = Task::new(1, tid, "envoy");
                for i in 0..iterations {
                    let syscall_nr = (i % 4) as u32;
                    tracer.sys_enter(tid);
                    tracer.sys_exit(&task, syscall_nr);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tracer.drop_counts(), syslat_core::DropCounts::default());

    let events = tracer.drain_events();
    assert_eq!(events.len(), (threads as usize) * iterations as usize);

    let mut counts: HashMap<u32, u64> = HashMap::new();
    let mut totals: HashMap<u32, u64> = HashMap::new();
    let mut maxima: HashMap<u32, u64> = HashMap::new();
    for event in &events {
        *counts.entry(event.syscall_nr).or_default() += 1;
        *totals.entry(event.syscall_nr).or_default() += event.duration_ns;
        let max = maxima.entry(event.syscall_nr).or_default();
        *max = (*max).max(event.duration_ns);
    }

    for nr in 0..4u32 {
        let stats = tracer.stats(nr).unwrap();
        assert_eq!(stats.count, counts[&nr]);
        assert_eq!(stats.total_ns, totals[&nr]);
        assert_eq!(stats.max_ns, maxima[&nr]);
    }
}

#[test]
fn snapshot_reflects_drained_and_pending_state() {
    let (clock, tracer) = manual_tracer(&TracerConfig::default());
    tracer.sys_enter(1);
    clock.set(2_000_000);
    tracer.sys_exit(&Task::new(1, 1, "envoy"), 3);
    tracer.sys_enter(2);

    let snapshot = tracer.snapshot();
    assert_eq!(snapshot.pending_threads, 1);
    assert_eq!(snapshot.syscalls.len(), 1);
    assert_eq!(snapshot.syscalls[0].syscall_nr, 3);
    assert_eq!(snapshot.syscalls[0].max_ns, 2_000_000);
}
