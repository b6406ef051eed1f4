//! Peer registry
//!
//! Records every peer that completed the handshake: its process id, the
//! handle assigned to it, and its lifecycle state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::queue::PeerId;

/// Integer handle assigned to a peer at handshake time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerHandle(pub u32);

/// Lifecycle state of a connected peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Submitting work normally
    Active,

    /// Told to stop submitting; requests are rejected until resumed
    Paused,

    /// Disconnected for good; terminal state
    Terminated,
}

struct PeerInfo {
    pid: u32,
    state: PeerState,
}

/// Registry of connected peers and their lifecycle states
pub struct PeerRegistry {
    peers: Mutex<HashMap<PeerHandle, PeerInfo>>,
    next_handle: AtomicU32,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            next_handle: AtomicU32::new(1),
        }
    }

    /// Register a peer that sent its process id; returns the assigned handle
    pub fn register(&self, pid: u32) -> PeerHandle {
        let handle = PeerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.peers.lock().insert(
            handle,
            PeerInfo {
                pid,
                state: PeerState::Active,
            },
        );
        tracing::debug!(pid, handle = handle.0, "peer registered");
        handle
    }

    /// Current state of a peer; unknown handles read as terminated
    pub fn state(&self, handle: PeerHandle) -> PeerState {
        self.peers
            .lock()
            .get(&handle)
            .map(|info| info.state)
            .unwrap_or(PeerState::Terminated)
    }

    /// The process id a peer registered with
    pub fn pid(&self, handle: PeerHandle) -> Option<u32> {
        self.peers.lock().get(&handle).map(|info| info.pid)
    }

    /// Tell a peer to stop submitting work
    ///
    /// Returns false for unknown or terminated peers.
    pub fn pause(&self, handle: PeerHandle) -> bool {
        self.transition(handle, PeerState::Paused)
    }

    /// Let a paused peer submit work again
    pub fn resume(&self, handle: PeerHandle) -> bool {
        self.transition(handle, PeerState::Active)
    }

    /// Disconnect a peer for good; cannot be undone
    pub fn terminate(&self, handle: PeerHandle) -> bool {
        let mut peers = self.peers.lock();
        match peers.get_mut(&handle) {
            Some(info) => {
                info.state = PeerState::Terminated;
                tracing::info!(handle = handle.0, pid = info.pid, "peer terminated");
                true
            }
            None => false,
        }
    }

    /// Number of registered peers (any state)
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// The peer id the transport stamps into tasks for this handle
    pub fn peer_id(&self, handle: PeerHandle) -> PeerId {
        PeerId(handle.0)
    }

    fn transition(&self, handle: PeerHandle, state: PeerState) -> bool {
        let mut peers = self.peers.lock();
        match peers.get_mut(&handle) {
            // terminate is terminal
            Some(info) if info.state != PeerState::Terminated => {
                info.state = state;
                tracing::debug!(handle = handle.0, ?state, "peer state changed");
                true
            }
            _ => false,
        }
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
