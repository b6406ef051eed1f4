//! Slot addressing for the two-table cuckoo index
//!
//! The base hash is fixed and capacity-independent; both slot functions take
//! the current capacity explicitly so that a capacity change only requires
//! recomputing the modulus, never rebinding a hash function to a table.

use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

/// Odd mixing constant separating the two slot functions
const GOLDEN_MIX: u64 = 0x9e37_79b9;

/// Seed for the base hash; fixed so both tables agree across the process
const HASH_SEED: u64 = 0;

/// Capacity-independent base hash of a key
pub fn base_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = XxHash64::with_seed(HASH_SEED);
    key.hash(&mut hasher);
    hasher.finish()
}

/// Primary slot index for a base hash at the given capacity
pub fn slot1(hash: u64, capacity: usize) -> usize {
    (hash % capacity as u64) as usize
}

/// Alternate slot index for a base hash at the given capacity
pub fn slot2(hash: u64, capacity: usize) -> usize {
    ((hash ^ GOLDEN_MIX) % capacity as u64) as usize
}
