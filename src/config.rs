//! Configuration for NestKV
//!
//! Centralized configuration with sensible defaults. Capacity and retry
//! bounds are construction parameters of the engine and queue; there is no
//! environment-variable configuration.

use std::path::PathBuf;

/// Main configuration for a NestKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Initial capacity of each of the two slot tables
    pub initial_capacity: usize,

    /// Max cuckoo displacements before an insert forces a rehash
    pub max_displacements: usize,

    /// Load factor (occupancy / capacity) at which a rehash is triggered
    pub rehash_load_factor: f64,

    // -------------------------------------------------------------------------
    // Task Queue Configuration
    // -------------------------------------------------------------------------
    /// Slot count of the task ring buffer (capacity - 1 usable)
    pub queue_capacity: usize,

    /// Retry bound for a single try_push/try_pop under contention
    pub queue_max_retries: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Unix socket path the server listens on
    pub socket_path: PathBuf,

    /// Number of worker threads draining the task queue
    pub worker_threads: usize,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// How long a connection waits for a worker reply (milliseconds)
    pub reply_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            max_displacements: 8,
            rehash_load_factor: 0.75,
            queue_capacity: 1024,
            queue_max_retries: 1000,
            socket_path: PathBuf::from("/tmp/nestkv.sock"),
            worker_threads: 4,
            max_connections: 1024,
            reply_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the initial capacity of each slot table
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Set the cuckoo displacement bound
    pub fn max_displacements(mut self, bound: usize) -> Self {
        self.config.max_displacements = bound;
        self
    }

    /// Set the load factor threshold that triggers a rehash
    pub fn rehash_load_factor(mut self, threshold: f64) -> Self {
        self.config.rehash_load_factor = threshold;
        self
    }

    /// Set the task queue slot count
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the queue retry bound under contention
    pub fn queue_max_retries(mut self, retries: usize) -> Self {
        self.config.queue_max_retries = retries;
        self
    }

    /// Set the Unix socket path
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = path.into();
        self
    }

    /// Set the number of worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the reply timeout (in milliseconds)
    pub fn reply_timeout_ms(mut self, ms: u64) -> Self {
        self.config.reply_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
