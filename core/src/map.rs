//! Fixed-capacity hash table with atomic slots.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Key marking a never-used slot.
const EMPTY: u32 = u32::MAX;
/// Key marking a deleted slot, reusable by later inserts.
const TOMBSTONE: u32 = u32::MAX - 1;

/// Largest key value a table accepts; the two values above it are
/// reserved slot markers.
pub const MAX_KEY: u32 = u32::MAX - 2;

struct Slot {
    key: AtomicU32,
    value: AtomicU64,
}

/// Preallocated, open-addressing `u32 -> u64` table.
///
/// Models a kernel hash map: capacity fixed at construction, no
/// allocation afterwards, and inserts fail instead of evicting when
/// every slot is taken. All mutation is a single atomic operation per
/// field; slot claims race through compare-exchange.
///
/// Concurrency contract: any number of threads may operate on the
/// table, but a given key is written and removed by one thread at a
/// time (each thread owns its own key on the timestamp path). Tables
/// that accumulate with [`add`](Self::add) must not mix it with
/// [`remove`](Self::remove), since a reclaimed slot starts from the
/// deleting thread's zero, not the adder's.
pub struct AtomicTable {
    slots: Box<[Slot]>,
}

impl AtomicTable {
    /// Table holding up to `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "table capacity must be nonzero");
        let slots = (0..capacity)
            .map(|_| Slot {
                key: AtomicU32::new(EMPTY),
                value: AtomicU64::new(0),
            })
            .collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn start_index(&self, key: u32) -> usize {
        // Multiplicative spread so adjacent thread ids do not chain.
        (key.wrapping_mul(0x9E37_79B9) as usize) % self.slots.len()
    }

    /// Insert or overwrite. Returns false when the table is full; the
    /// write is dropped and existing entries stay untouched.
    pub fn upsert(&self, key: u32, value: u64) -> bool {
        debug_assert!(key <= MAX_KEY);
        let len = self.slots.len();
        let start = self.start_index(key);

        // First pass: overwrite in place if the key is already present.
        // The key cannot live past the first never-used slot, because
        // deletion leaves tombstones rather than holes.
        for i in 0..len {
            let slot = &self.slots[(start + i) % len];
            match slot.key.load(Ordering::Acquire) {
                k if k == key => {
                    slot.value.store(value, Ordering::Release);
                    return true;
                }
                EMPTY => break,
                _ => {}
            }
        }

        // Key absent: claim the first reusable slot, racing other
        // writers for it.
        for i in 0..len {
            let slot = &self.slots[(start + i) % len];
            loop {
                let current = slot.key.load(Ordering::Acquire);
                if current == key {
                    slot.value.store(value, Ordering::Release);
                    return true;
                }
                if current != EMPTY && current != TOMBSTONE {
                    break;
                }
                if slot
                    .key
                    .compare_exchange(current, key, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    slot.value.store(value, Ordering::Release);
                    return true;
                }
            }
        }
        false
    }

    /// Look up the value for `key`.
    pub fn get(&self, key: u32) -> Option<u64> {
        let len = self.slots.len();
        let start = self.start_index(key);
        for i in 0..len {
            let slot = &self.slots[(start + i) % len];
            match slot.key.load(Ordering::Acquire) {
                k if k == key => return Some(slot.value.load(Ordering::Acquire)),
                EMPTY => return None,
                _ => {}
            }
        }
        None
    }

    /// Delete the entry for `key`, returning its value. The slot
    /// becomes reusable.
    pub fn remove(&self, key: u32) -> Option<u64> {
        let len = self.slots.len();
        let start = self.start_index(key);
        for i in 0..len {
            let slot = &self.slots[(start + i) % len];
            match slot.key.load(Ordering::Acquire) {
                k if k == key => {
                    let value = slot.value.load(Ordering::Acquire);
                    slot.value.store(0, Ordering::Release);
                    return match slot.key.compare_exchange(
                        key,
                        TOMBSTONE,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => Some(value),
                        Err(_) => None,
                    };
                }
                EMPTY => return None,
                _ => {}
            }
        }
        None
    }

    /// Insert-or-accumulate: add `delta` to the entry for `key`,
    /// creating it first when absent. Returns false when the table is
    /// full. Concurrent adds to the same key never lose an update.
    pub fn add(&self, key: u32, delta: u64) -> bool {
        debug_assert!(key <= MAX_KEY);
        let len = self.slots.len();
        let start = self.start_index(key);

        for i in 0..len {
            let slot = &self.slots[(start + i) % len];
            match slot.key.load(Ordering::Acquire) {
                k if k == key => {
                    slot.value.fetch_add(delta, Ordering::AcqRel);
                    return true;
                }
                EMPTY => break,
                _ => {}
            }
        }

        for i in 0..len {
            let slot = &self.slots[(start + i) % len];
            loop {
                let current = slot.key.load(Ordering::Acquire);
                if current == key {
                    slot.value.fetch_add(delta, Ordering::AcqRel);
                    return true;
                }
                if current != EMPTY && current != TOMBSTONE {
                    break;
                }
                if slot
                    .key
                    .compare_exchange(current, key, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    slot.value.fetch_add(delta, Ordering::AcqRel);
                    return true;
                }
            }
        }
        false
    }

    /// Number of live entries (scan; exact only at quiescence).
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.key.load(Ordering::Acquire) <= MAX_KEY)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entries in slot order (exact only at quiescence).
    pub fn snapshot(&self) -> Vec<(u32, u64)> {
        self.slots
            .iter()
            .filter_map(|slot| {
                let key = slot.key.load(Ordering::Acquire);
                if key <= MAX_KEY {
                    Some((key, slot.value.load(Ordering::Acquire)))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_upsert_get_remove() {
        let table = AtomicTable::new(8);
        assert!(table.upsert(42, 1000));
        assert_eq!(table.get(42), Some(1000));
        assert_eq!(table.remove(42), Some(1000));
        assert_eq!(table.get(42), None);
        assert_eq!(table.remove(42), None);
    }

    #[test]
    fn test_upsert_overwrites_in_place() {
        let table = AtomicTable::new(4);
        assert!(table.upsert(7, 1));
        assert!(table.upsert(7, 2));
        assert_eq!(table.get(7), Some(2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_full_table_drops_new_keys() {
        let table = AtomicTable::new(2);
        assert!(table.upsert(1, 10));
        assert!(table.upsert(2, 20));
        assert!(!table.upsert(3, 30));
        // Existing entries stay intact and queryable.
        assert_eq!(table.get(1), Some(10));
        assert_eq!(table.get(2), Some(20));
        assert_eq!(table.get(3), None);
        // Overwrites of present keys still succeed at capacity.
        assert!(table.upsert(1, 11));
        assert_eq!(table.get(1), Some(11));
    }

    #[test]
    fn test_removed_slot_is_reusable() {
        let table = AtomicTable::new(2);
        assert!(table.upsert(1, 10));
        assert!(table.upsert(2, 20));
        assert_eq!(table.remove(1), Some(10));
        assert!(table.upsert(3, 30));
        assert_eq!(table.get(3), Some(30));
        assert_eq!(table.get(2), Some(20));
    }

    #[test]
    fn test_add_accumulates() {
        let table = AtomicTable::new(4);
        assert!(table.add(9, 5));
        assert!(table.add(9, 7));
        assert_eq!(table.get(9), Some(12));
    }

    #[test]
    fn test_snapshot_lists_live_entries() {
        let table = AtomicTable::new(8);
        table.upsert(1, 10);
        table.upsert(2, 20);
        table.remove(1);
        let mut entries = table.snapshot();
        entries.sort_unstable();
        assert_eq!(entries, vec![(2, 20)]);
    }

    #[test]
    fn test_concurrent_inserts_land() {
        let table = Arc::new(AtomicTable::new(64));
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for k in 0..8u32 {
                        assert!(table.upsert(t * 8 + k, u64::from(t)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 64);
        for t in 0..8u32 {
            for k in 0..8u32 {
                assert_eq!(table.get(t * 8 + k), Some(u64::from(t)));
            }
        }
    }

    #[test]
    fn test_concurrent_adds_never_lose_updates() {
        let table = Arc::new(AtomicTable::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert!(table.add(1, 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.get(1), Some(4000));
    }
}
