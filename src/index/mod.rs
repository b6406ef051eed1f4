//! Index Module
//!
//! The cuckoo-hashing storage core.
//!
//! ## Responsibilities
//! - Two-table slot storage with one lock per slot
//! - Bounded-displacement cuckoo insertion
//! - Stop-the-world capacity doubling behind a global resize lock
//!
//! ## Data Structure Choice
//! Cuckoo hashing gives worst-case two-probe lookups, which keeps the
//! per-slot lock hold times short and lets independent operations run fully
//! in parallel. The price is an occasional stop-the-world rehash when an
//! insert exhausts its displacement bound.

mod hash;
mod table;

pub use hash::{base_hash, slot1, slot2};
pub use table::{HashIndex, SetOutcome};
