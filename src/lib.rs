//! # NestKV
//!
//! A concurrent, in-memory key-value store engine with:
//! - A two-table cuckoo-hashing index with one lock per slot
//! - A global resize lock for stop-the-world capacity doubling
//! - A lock-free bounded task queue between transport and workers
//! - A Unix-socket line protocol with cooperative peer lifecycle control
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Unix Socket Server                       │
//! │                     (Multiple Peers)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ decoded Tasks
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      TaskQueue                               │
//! │             (lock-free MPMC ring buffer)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ worker pool
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │                 (cuckoo HashIndex)                           │
//! │      table1 ──┐               ┌── table2                     │
//! │   per-slot RwLocks    +    global resize RwLock              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine and the queue do not depend on each other; they compose only
//! through the [`queue::Task`] schema.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod index;
pub mod queue;
pub mod protocol;
pub mod engine;
pub mod peer;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::Engine;
pub use error::{NestError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of NestKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
