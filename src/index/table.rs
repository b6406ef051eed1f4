//! Two-table cuckoo hash index
//!
//! ## Storage layout
//!
//! Two slot tables of identical capacity, each slot guarded by its own
//! `RwLock`. A present key occupies exactly one of `table1[slot1(key)]` or
//! `table2[slot2(key)]`.
//!
//! ## Resize protocol
//!
//! The table storage itself sits behind a global `RwLock`: every operation
//! acquires it in shared mode (so independent slot operations never block
//! each other), and a rehash acquires it exclusively, stopping the world for
//! the duration of the capacity doubling. Operations therefore observe either
//! the pre-rehash or the post-rehash table, never a partial one.
//!
//! ## Insert race
//!
//! The lookup phase and the displacement chain of `set` are not one atomic
//! transaction. The chain closes the gap by re-validating both candidate
//! slots of the in-hand item under the same exclusive lock span immediately
//! before every placement step: a key inserted or deleted concurrently is
//! caught there and resolved as an in-place overwrite.

use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::{NestError, Result};

use super::hash::{base_hash, slot1, slot2};

/// A slot holds at most one resident key/value pair
type Slot<K, V> = Option<(K, V)>;

/// Outcome of a `set` operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key was not present and is now resident
    Inserted,

    /// The key was present and its value was replaced
    Updated,
}

/// The two slot tables plus their shared capacity
///
/// Reallocated wholesale on rehash; only reachable through the global
/// resize lock in [`HashIndex`].
struct Tables<K, V> {
    capacity: usize,
    table1: Box<[RwLock<Slot<K, V>>]>,
    table2: Box<[RwLock<Slot<K, V>>]>,
}

impl<K, V> Tables<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            table1: (0..capacity).map(|_| RwLock::new(None)).collect(),
            table2: (0..capacity).map(|_| RwLock::new(None)).collect(),
        }
    }
}

/// Result of running the displacement chain under the shared resize lock
enum ChainResult<K, V> {
    /// The item found a home (or the key was overwritten in place)
    Done(SetOutcome),

    /// Displacement bound exhausted; the in-hand evicted item is returned
    /// and must be carried into a rehash
    Exhausted((K, V)),
}

/// Concurrent two-table cuckoo hash index
///
/// ## Concurrency contract
///
/// - `get`/`contains`/`set`/`delete` on different slots proceed in parallel
///   (shared resize lock, independent per-slot locks).
/// - Updates to the same key are linearized by that key's slot lock.
/// - A rehash holds the resize lock exclusively: stop-the-world, O(capacity).
pub struct HashIndex<K, V> {
    /// Global resize lock doubling as the owner of the table storage
    tables: RwLock<Tables<K, V>>,

    /// Number of resident keys; incremented exactly once per newly
    /// inserted key, never on updates
    occupancy: AtomicUsize,

    /// Max displacements per insert before forcing a rehash
    max_displacements: usize,

    /// occupancy / capacity threshold that triggers a rehash before insert
    rehash_load_factor: f64,
}

impl<K, V> HashIndex<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an index with the given initial capacity per table
    pub fn new(initial_capacity: usize, max_displacements: usize, rehash_load_factor: f64) -> Self {
        let capacity = initial_capacity.max(1);
        Self {
            tables: RwLock::new(Tables::with_capacity(capacity)),
            occupancy: AtomicUsize::new(0),
            max_displacements: max_displacements.max(1),
            rehash_load_factor,
        }
    }

    /// Look up a key; a miss is a normal outcome, not an error
    pub fn get(&self, key: &K) -> Option<V> {
        let tables = self.tables.read();
        let h = base_hash(key);

        {
            let slot = tables.table1[slot1(h, tables.capacity)].read();
            if let Some((k, v)) = slot.as_ref() {
                if k == key {
                    return Some(v.clone());
                }
            }
        }

        let slot = tables.table2[slot2(h, tables.capacity)].read();
        match slot.as_ref() {
            Some((k, v)) if k == key => Some(v.clone()),
            _ => None,
        }
    }

    /// Presence check with the same lookup skeleton as `get`
    pub fn contains(&self, key: &K) -> bool {
        let tables = self.tables.read();
        let h = base_hash(key);

        {
            let slot = tables.table1[slot1(h, tables.capacity)].read();
            if matches!(slot.as_ref(), Some((k, _)) if k == key) {
                return true;
            }
        }

        let slot = tables.table2[slot2(h, tables.capacity)].read();
        matches!(slot.as_ref(), Some((k, _)) if k == key)
    }

    /// Insert or update a key
    ///
    /// Runs the cuckoo displacement chain under the shared resize lock. If
    /// the chain exhausts its bound, the lock is released, the capacity is
    /// doubled under the exclusive lock (carrying the evicted item), and the
    /// insert is already complete: the new key committed on the chain's
    /// first step.
    pub fn set(&self, key: K, value: V) -> Result<SetOutcome> {
        if self.load_factor() >= self.rehash_load_factor {
            self.grow(None)?;
        }

        let tables = self.tables.read();
        match self.displace_chain(&tables, key, value) {
            ChainResult::Done(outcome) => Ok(outcome),
            ChainResult::Exhausted(pending) => {
                drop(tables);
                self.grow(Some(pending))?;
                Ok(SetOutcome::Inserted)
            }
        }
    }

    /// Remove a key; returns whether a key was removed (idempotent)
    pub fn delete(&self, key: &K) -> bool {
        let tables = self.tables.read();
        let h = base_hash(key);

        {
            let mut slot = tables.table1[slot1(h, tables.capacity)].write();
            if matches!(slot.as_ref(), Some((k, _)) if k == key) {
                *slot = None;
                self.occupancy.fetch_sub(1, Ordering::Relaxed);
                return true;
            }
        }

        let mut slot = tables.table2[slot2(h, tables.capacity)].write();
        if matches!(slot.as_ref(), Some((k, _)) if k == key) {
            *slot = None;
            self.occupancy.fetch_sub(1, Ordering::Relaxed);
            return true;
        }

        false
    }

    /// Number of resident keys
    pub fn len(&self) -> usize {
        self.occupancy.load(Ordering::Relaxed)
    }

    /// Whether the index holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity of each of the two tables
    pub fn capacity(&self) -> usize {
        self.tables.read().capacity
    }

    /// occupancy / capacity
    pub fn load_factor(&self) -> f64 {
        let tables = self.tables.read();
        self.occupancy.load(Ordering::Relaxed) as f64 / tables.capacity as f64
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Run the displacement chain for one item under the shared resize lock.
    ///
    /// Each step locks both candidate slots of the in-hand item (table1
    /// before table2, so chains cannot deadlock) and re-validates residency
    /// before touching the target slot. The fresh item commits on the first
    /// step; later steps only relocate evicted residents.
    fn displace_chain(&self, tables: &Tables<K, V>, key: K, value: V) -> ChainResult<K, V> {
        let mut item = (key, value);
        let mut fresh = true;
        let mut into_first = true;

        for _ in 0..self.max_displacements {
            let h = base_hash(&item.0);
            let i1 = slot1(h, tables.capacity);
            let i2 = slot2(h, tables.capacity);

            let mut s1 = tables.table1[i1].write();
            let mut s2 = tables.table2[i2].write();

            // Re-validate under the held locks: the key may have been
            // inserted (or re-inserted) since the previous step.
            if let Some((k, v)) = s1.as_mut() {
                if *k == item.0 {
                    *v = item.1;
                    return ChainResult::Done(if fresh {
                        SetOutcome::Updated
                    } else {
                        SetOutcome::Inserted
                    });
                }
            }
            if let Some((k, v)) = s2.as_mut() {
                if *k == item.0 {
                    *v = item.1;
                    return ChainResult::Done(if fresh {
                        SetOutcome::Updated
                    } else {
                        SetOutcome::Inserted
                    });
                }
            }

            let target = if into_first { &mut *s1 } else { &mut *s2 };
            match target.take() {
                None => {
                    *target = Some(item);
                    if fresh {
                        self.occupancy.fetch_add(1, Ordering::Relaxed);
                    }
                    return ChainResult::Done(SetOutcome::Inserted);
                }
                Some(resident) => {
                    *target = Some(item);
                    if fresh {
                        self.occupancy.fetch_add(1, Ordering::Relaxed);
                        fresh = false;
                    }
                    item = resident;
                    into_first = !into_first;
                }
            }
        }

        ChainResult::Exhausted(item)
    }

    /// Double the capacity and re-place every resident key.
    ///
    /// Holds the resize lock exclusively for the whole rebuild. The new
    /// tables are built aside and only swapped in on success, so a failed
    /// rehash leaves the old tables untouched. `pending` is an item evicted
    /// by an exhausted chain; it is already counted in the occupancy.
    fn grow(&self, pending: Option<(K, V)>) -> Result<()> {
        let mut tables = self.tables.write();

        // Another thread may have grown the table while this one waited on
        // the exclusive lock; a purely load-triggered grow is then stale.
        if pending.is_none()
            && (self.occupancy.load(Ordering::Relaxed) as f64) / (tables.capacity as f64)
                < self.rehash_load_factor
        {
            return Ok(());
        }

        let new_capacity = tables.capacity * 2;
        tracing::info!(
            old_capacity = tables.capacity,
            new_capacity,
            occupancy = self.occupancy.load(Ordering::Relaxed),
            "rehashing index"
        );

        let mut fresh = Tables::with_capacity(new_capacity);

        for table in [&tables.table1, &tables.table2] {
            for slot in table.iter() {
                if let Some(entry) = slot.read().as_ref() {
                    Self::place(&mut fresh, entry.clone(), self.max_displacements)?;
                }
            }
        }
        if let Some(entry) = pending {
            Self::place(&mut fresh, entry, self.max_displacements)?;
        }

        *tables = fresh;
        Ok(())
    }

    /// Cuckoo placement into freshly allocated tables (exclusive access, so
    /// no slot locking). Bound exhaustion here means the existing key set
    /// cannot be held at the new capacity: fatal, never partial.
    fn place(tables: &mut Tables<K, V>, entry: (K, V), bound: usize) -> Result<()> {
        let mut item = entry;
        let mut into_first = true;

        for _ in 0..bound {
            let h = base_hash(&item.0);
            let slot = if into_first {
                tables.table1[slot1(h, tables.capacity)].get_mut()
            } else {
                tables.table2[slot2(h, tables.capacity)].get_mut()
            };

            match slot.take() {
                None => {
                    *slot = Some(item);
                    return Ok(());
                }
                Some(resident) => {
                    *slot = Some(item);
                    item = resident;
                    into_first = !into_first;
                }
            }
        }

        Err(NestError::RehashOverflow {
            capacity: tables.capacity,
        })
    }
}
