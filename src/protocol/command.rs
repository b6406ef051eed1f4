//! Command definitions
//!
//! Represents decoded requests from peers.

use bytes::Bytes;

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert or update a key-value pair
    Put { key: Bytes, value: Bytes },

    /// Get a value by key
    Get { key: Bytes },

    /// Create a key-value pair; fails if the key exists
    Post { key: Bytes, value: Bytes },

    /// Delete a key
    Delete { key: Bytes },
}

impl Command {
    /// The wire verb of this command
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Put { .. } => "PUT",
            Command::Get { .. } => "GET",
            Command::Post { .. } => "POST",
            Command::Delete { .. } => "DELETE",
        }
    }

    /// The key this command addresses
    pub fn key(&self) -> &Bytes {
        match self {
            Command::Put { key, .. }
            | Command::Get { key }
            | Command::Post { key, .. }
            | Command::Delete { key } => key,
        }
    }
}

/// A peer lifecycle control request, carried on the same channel as data
/// but handled by the coordinator without touching the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Stop the addressed peer from submitting work
    Pause(u32),

    /// Let the addressed peer submit work again
    Resume(u32),

    /// Disconnect the addressed peer for good
    Terminate(u32),
}

/// One decoded request line
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// A data operation destined for the task queue
    Data(Command),

    /// A lifecycle control operation handled at the connection
    Control(Control),
}
