//! Bounded, lossy slow-syscall event ring.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use syslat_common::SlowSyscallEvent;

struct RingSlot {
    seq: AtomicUsize,
    event: UnsafeCell<MaybeUninit<SlowSyscallEvent>>,
}

/// Fixed-capacity ring carrying slow-syscall event records.
///
/// Publication is reserve-then-commit: a producer claims a slot by
/// advancing the enqueue cursor, writes the record, and only then
/// publishes the slot's sequence. The drainer only reads slots whose
/// sequence is published, so a partially written record is never
/// visible. When every slot holds an undrained record the push fails
/// and the caller drops the event; producers never block and never
/// retry a full ring.
///
/// Each slot's sequence tracks which lap of the ring last touched it,
/// which lets producers on many threads and a draining consumer
/// interleave without locks.
pub struct EventRing {
    slots: Box<[RingSlot]>,
    enqueue_pos: AtomicUsize,
    dequeue_pos: AtomicUsize,
}

// The unguarded payload cell is only written between a successful claim
// of the enqueue cursor and the sequence publish, and only read between
// a successful claim of the dequeue cursor and the lap publish.
unsafe impl Send for EventRing {}
unsafe impl Sync for EventRing {}

impl EventRing {
    /// Ring sized to `bytes` worth of fixed-size records.
    pub fn with_byte_size(bytes: u32) -> Self {
        let record = std::mem::size_of::<SlowSyscallEvent>();
        Self::with_capacity((bytes as usize / record).max(2))
    }

    /// Ring holding exactly `capacity` records.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is less than two; the sequence scheme
    /// needs enqueue and dequeue laps on one slot to be distinguishable.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring capacity must be at least two records");
        let slots = (0..capacity)
            .map(|i| RingSlot {
                seq: AtomicUsize::new(i),
                event: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Self {
            slots,
            enqueue_pos: AtomicUsize::new(0),
            dequeue_pos: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Best-effort publish. Returns false when the ring is full.
    pub fn push(&self, event: SlowSyscallEvent) -> bool {
        let cap = self.slots.len();
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos % cap];
            let seq = slot.seq.load(Ordering::Acquire);
            let dif = seq as isize - pos as isize;
            if dif == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // Slot reserved; commit happens when the new
                        // sequence lands.
                        unsafe { (*slot.event.get()).write(event) };
                        slot.seq.store(pos.wrapping_add(1), Ordering::Release);
                        return true;
                    }
                    Err(current) => pos = current,
                }
            } else if dif < 0 {
                // Undrained record from the previous lap: full.
                return false;
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Drain one committed record, oldest first.
    pub fn pop(&self) -> Option<SlowSyscallEvent> {
        let cap = self.slots.len();
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos % cap];
            let seq = slot.seq.load(Ordering::Acquire);
            let dif = seq as isize - pos.wrapping_add(1) as isize;
            if dif == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let event = unsafe { (*slot.event.get()).assume_init_read() };
                        slot.seq
                            .store(pos.wrapping_add(cap), Ordering::Release);
                        return Some(event);
                    }
                    Err(current) => pos = current,
                }
            } else if dif < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Records reserved and not yet drained (approximate while
    /// producers are active).
    pub fn len(&self) -> usize {
        self.enqueue_pos
            .load(Ordering::Relaxed)
            .wrapping_sub(self.dequeue_pos.load(Ordering::Relaxed))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
