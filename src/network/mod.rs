//! Network Module
//!
//! Local-socket transport around the engine and the task queue.
//!
//! ## Request Flow
//!
//! ```text
//! peer ──line──▶ Connection ──Task──▶ TaskQueue ──pop──▶ Worker
//!   ▲                │ register                            │
//!   │                ▼                                     ▼
//!   └──line──── ReplyRouter ◀──────────Response────────────┘
//! ```
//!
//! A connection decodes each line into a task, registers a reply channel
//! under the task's correlation id, and pushes the task into the queue with
//! backpressure mapping. A worker pops the task, runs the engine operation,
//! and completes the reply channel. Decode failures travel the same path as
//! ERROR-tagged tasks so the engine is never invoked for them.

mod client;
mod connection;
mod server;

pub use client::Client;
pub use connection::Connection;
pub use server::Server;
