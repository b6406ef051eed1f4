//! Task definitions
//!
//! A task is one decoded operation request flowing producer → queue →
//! consumer. It is created when a wire request is decoded, owned by the
//! queue while enqueued, and consumed by exactly one worker.

use bytes::Bytes;

use crate::protocol::Command;

/// Identifier of the peer a task originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u32);

/// Correlation id connecting a task to its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// Operation requested by a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Get,
    Set,
    Post,
    Delete,

    /// The wire request failed to decode; the engine is never invoked
    Error,
}

/// An operation request handed from the transport to a worker
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Requested operation
    pub opcode: Opcode,

    /// Key bytes (empty for `Error` tasks)
    pub key: Bytes,

    /// Value bytes for Set/Post; the decode message for `Error` tasks
    pub value: Option<Bytes>,

    /// Originating peer
    pub origin: PeerId,

    /// Correlation id assigned by the transport
    pub task_id: TaskId,
}

impl Task {
    /// Build a GET task
    pub fn get(key: Bytes, origin: PeerId, task_id: TaskId) -> Self {
        Self {
            opcode: Opcode::Get,
            key,
            value: None,
            origin,
            task_id,
        }
    }

    /// Build a SET task (upsert)
    pub fn set(key: Bytes, value: Bytes, origin: PeerId, task_id: TaskId) -> Self {
        Self {
            opcode: Opcode::Set,
            key,
            value: Some(value),
            origin,
            task_id,
        }
    }

    /// Build a POST task (create-only)
    pub fn post(key: Bytes, value: Bytes, origin: PeerId, task_id: TaskId) -> Self {
        Self {
            opcode: Opcode::Post,
            key,
            value: Some(value),
            origin,
            task_id,
        }
    }

    /// Build a DELETE task
    pub fn delete(key: Bytes, origin: PeerId, task_id: TaskId) -> Self {
        Self {
            opcode: Opcode::Delete,
            key,
            value: None,
            origin,
            task_id,
        }
    }

    /// Build a task from a decoded command
    pub fn from_command(command: Command, origin: PeerId, task_id: TaskId) -> Self {
        match command {
            Command::Get { key } => Self::get(key, origin, task_id),
            Command::Put { key, value } => Self::set(key, value, origin, task_id),
            Command::Post { key, value } => Self::post(key, value, origin, task_id),
            Command::Delete { key } => Self::delete(key, origin, task_id),
        }
    }

    /// Build an ERROR-tagged task carrying a decode failure message
    pub fn decode_error(message: impl Into<String>, origin: PeerId, task_id: TaskId) -> Self {
        Self {
            opcode: Opcode::Error,
            key: Bytes::new(),
            value: Some(Bytes::from(message.into().into_bytes())),
            origin,
            task_id,
        }
    }

    /// The decode failure message of an ERROR-tagged task
    pub fn error_message(&self) -> Option<String> {
        match self.opcode {
            Opcode::Error => self
                .value
                .as_ref()
                .map(|m| String::from_utf8_lossy(m).into_owned()),
            _ => None,
        }
    }
}
