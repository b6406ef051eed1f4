//! Peer Module
//!
//! Lifecycle tracking for connected peers.
//!
//! Pause/resume/terminate are cooperative state transitions exposed as
//! coordinator API rather than process signals: the transport consults a
//! peer's state before accepting work, so control takes effect at the next
//! request boundary and needs no signal primitives from the platform.

mod registry;

pub use registry::{PeerHandle, PeerRegistry, PeerState};
