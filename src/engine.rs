//! Engine Module
//!
//! The public façade over the cuckoo index.
//!
//! ## Responsibilities
//! - Compose the hash index with its construction parameters
//! - Expose the per-key operations (get/set/insert/delete/contains)
//! - Route decoded commands to the corresponding operation
//!
//! ## Concurrency Model
//!
//! Everything is `&self`: the index provides per-slot exclusive locking for
//! same-key linearizability and a global resize lock for stop-the-world
//! rehashes. Operations block only while waiting for one of those locks.

use std::hash::Hash;

use bytes::Bytes;

use crate::config::Config;
use crate::error::Result;
use crate::index::{HashIndex, SetOutcome};
use crate::protocol::{Command, Response};

/// The main in-memory storage engine
pub struct Engine<K, V> {
    /// Engine configuration
    config: Config,

    /// Cuckoo-hashing index
    index: HashIndex<K, V>,
}

impl<K, V> Engine<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an engine from the given config
    pub fn new(config: Config) -> Self {
        let index = HashIndex::new(
            config.initial_capacity,
            config.max_displacements,
            config.rehash_load_factor,
        );
        Self { config, index }
    }

    /// Get a value by key; a miss is a normal outcome
    pub fn get(&self, key: &K) -> Option<V> {
        self.index.get(key)
    }

    /// Whether a key is present
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains(key)
    }

    /// Insert or update a key (upsert)
    pub fn set(&self, key: K, value: V) -> Result<SetOutcome> {
        self.index.set(key, value)
    }

    /// Create-only insert: refuses to touch an existing key
    ///
    /// The lookup and the insert are not one atomic step; two peers racing
    /// to create the same key resolve to last-writer-wins inside the
    /// index's displacement chain.
    pub fn insert(&self, key: K, value: V) -> Result<bool> {
        if self.index.contains(&key) {
            return Ok(false);
        }
        self.index.set(key, value)?;
        Ok(true)
    }

    /// Delete a key; returns whether a key was removed (idempotent)
    pub fn delete(&self, key: &K) -> bool {
        self.index.delete(key)
    }

    // =========================================================================
    // Accessors (for serving stats and tests)
    // =========================================================================

    /// Number of resident keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the engine holds no keys
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current capacity of each slot table
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    /// occupancy / capacity
    pub fn load_factor(&self) -> f64 {
        self.index.load_factor()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Engine<Bytes, Bytes> {
    /// Execute a decoded command and build its reply
    ///
    /// Normal outcomes (miss, existing key) become replies; only internal
    /// faults propagate as errors.
    pub fn execute(&self, command: Command) -> Result<Response> {
        match command {
            Command::Get { key } => Ok(match self.get(&key) {
                Some(value) => Response::ok_with(value),
                None => Response::not_found(),
            }),
            Command::Put { key, value } => {
                self.set(key, value)?;
                Ok(Response::ok())
            }
            Command::Post { key, value } => {
                if self.insert(key, value)? {
                    Ok(Response::ok())
                } else {
                    Ok(Response::error("key already exists"))
                }
            }
            Command::Delete { key } => Ok(if self.delete(&key) {
                Response::ok()
            } else {
                Response::not_found()
            }),
        }
    }
}
