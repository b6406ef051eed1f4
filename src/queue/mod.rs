//! Task Queue Module
//!
//! Hand-off point between request ingestion and worker execution.
//!
//! ## Responsibilities
//! - Fixed-capacity ring buffer synchronized purely with atomics and CAS
//! - Non-blocking push/pop with bounded retries and exponential backoff
//! - Blocking wrappers that yield instead of sleeping on a lock
//!
//! The queue and the engine do not depend on each other; they compose only
//! through the [`Task`] schema.

mod ring;
mod task;

pub use ring::{
    TaskQueue, TryPopError, TryPushError, DEFAULT_MAX_RETRIES, DEFAULT_QUEUE_CAPACITY,
};
pub use task::{Opcode, PeerId, Task, TaskId};
