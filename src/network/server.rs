//! Unix-socket server
//!
//! Accepts peer connections, runs the worker pool that drains the task
//! queue, and routes worker results back to the waiting connections.

use std::collections::HashMap;
use std::fs;
use std::os::unix::net::UnixListener;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{NestError, Result};
use crate::peer::PeerRegistry;
use crate::protocol::{Command, Response};
use crate::queue::{Opcode, Task, TaskId, TaskQueue};

use super::connection::Connection;

/// Retry bound a worker uses per pop round, kept small so shutdown is
/// observed promptly
const WORKER_POP_RETRIES: usize = 64;

/// Poll interval of the non-blocking accept loop
const ACCEPT_POLL: Duration = Duration::from_millis(25);

// =============================================================================
// Reply routing
// =============================================================================

/// Maps in-flight correlation ids to the channel a connection waits on
pub(crate) struct ReplyRouter {
    pending: Mutex<HashMap<TaskId, Sender<Response>>>,
    next_task_id: AtomicU64,
}

impl ReplyRouter {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_task_id: AtomicU64::new(1),
        }
    }

    /// Assign a fresh correlation id and register its reply channel
    pub(crate) fn issue(&self) -> (TaskId, Receiver<Response>) {
        let task_id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = bounded(1);
        self.pending.lock().insert(task_id, tx);
        (task_id, rx)
    }

    /// Deliver a worker result; a vanished receiver (timed-out connection)
    /// is not an error
    pub(crate) fn complete(&self, task_id: TaskId, response: Response) {
        if let Some(tx) = self.pending.lock().remove(&task_id) {
            let _ = tx.send(response);
        }
    }

    /// Drop a registration whose connection stopped waiting
    pub(crate) fn forget(&self, task_id: TaskId) {
        self.pending.lock().remove(&task_id);
    }
}

// =============================================================================
// Server
// =============================================================================

/// Unix-socket server for NestKV
pub struct Server {
    config: Config,
    engine: Arc<Engine<Bytes, Bytes>>,
    queue: Arc<TaskQueue<Task>>,
    registry: Arc<PeerRegistry>,
    router: Arc<ReplyRouter>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Create a new server around the given engine
    pub fn new(config: Config, engine: Arc<Engine<Bytes, Bytes>>) -> Self {
        let queue = Arc::new(TaskQueue::with_capacity(config.queue_capacity));
        Self {
            config,
            engine,
            queue,
            registry: Arc::new(PeerRegistry::new()),
            router: Arc::new(ReplyRouter::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The peer registry, for lifecycle control from the embedding process
    pub fn registry(&self) -> Arc<PeerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Signal the server to shut down after in-flight work drains
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// A handle that can trigger shutdown from another thread
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        // A previous run may have left the socket file behind.
        if self.config.socket_path.exists() {
            fs::remove_file(&self.config.socket_path)?;
        }

        let listener = UnixListener::bind(&self.config.socket_path).map_err(|e| {
            NestError::Network(format!(
                "failed to bind {}: {e}",
                self.config.socket_path.display()
            ))
        })?;
        listener.set_nonblocking(true)?;

        tracing::info!(path = %self.config.socket_path.display(), "server listening");

        let workers = self.spawn_workers()?;
        let active = Arc::new(AtomicUsize::new(0));

        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    if active.load(Ordering::Relaxed) >= self.config.max_connections {
                        tracing::warn!("connection limit reached, rejecting peer");
                        let _ = Connection::reject(stream, "server at connection limit");
                        continue;
                    }

                    let mut connection = match Connection::new(
                        stream,
                        Arc::clone(&self.queue),
                        Arc::clone(&self.router),
                        Arc::clone(&self.registry),
                        self.config.clone(),
                    ) {
                        Ok(connection) => connection,
                        Err(e) => {
                            tracing::warn!("failed to set up connection: {e}");
                            continue;
                        }
                    };

                    active.fetch_add(1, Ordering::Relaxed);
                    let active = Arc::clone(&active);
                    thread::spawn(move || {
                        if let Err(e) = connection.handle() {
                            tracing::warn!("connection error: {e}");
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    tracing::warn!("accept failed: {e}");
                }
            }
        }

        tracing::info!("server stopping");
        for worker in workers {
            let _ = worker.join();
        }
        let _ = fs::remove_file(&self.config.socket_path);
        Ok(())
    }

    fn spawn_workers(&self) -> Result<Vec<JoinHandle<()>>> {
        (0..self.config.worker_threads.max(1))
            .map(|id| {
                let engine = Arc::clone(&self.engine);
                let queue = Arc::clone(&self.queue);
                let router = Arc::clone(&self.router);
                let shutdown = Arc::clone(&self.shutdown);
                let handle = thread::Builder::new()
                    .name(format!("nestkv-worker-{id}"))
                    .spawn(move || worker_loop(engine, queue, router, shutdown))?;
                Ok(handle)
            })
            .collect()
    }
}

// =============================================================================
// Workers
// =============================================================================

/// Drain the task queue until shutdown
fn worker_loop(
    engine: Arc<Engine<Bytes, Bytes>>,
    queue: Arc<TaskQueue<Task>>,
    router: Arc<ReplyRouter>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match queue.try_pop(WORKER_POP_RETRIES) {
            Ok(task) => {
                let task_id = task.task_id;
                let response = execute_task(&engine, task, &shutdown);
                router.complete(task_id, response);
            }
            Err(_) => thread::yield_now(),
        }
    }
}

/// Run one task against the engine and build its reply
fn execute_task(
    engine: &Engine<Bytes, Bytes>,
    task: Task,
    shutdown: &AtomicBool,
) -> Response {
    let command = match task.opcode {
        Opcode::Error => {
            let message = task
                .error_message()
                .unwrap_or_else(|| "malformed request".to_string());
            return Response::error(message);
        }
        Opcode::Get => Command::Get { key: task.key },
        Opcode::Delete => Command::Delete { key: task.key },
        Opcode::Set => match task.value {
            Some(value) => Command::Put {
                key: task.key,
                value,
            },
            None => return Response::error("PUT requires a value"),
        },
        Opcode::Post => match task.value {
            Some(value) => Command::Post {
                key: task.key,
                value,
            },
            None => return Response::error("POST requires a value"),
        },
    };

    tracing::trace!(
        verb = command.verb(),
        key_len = command.key().len(),
        "executing task"
    );

    match engine.execute(command) {
        Ok(response) => response,
        Err(e) => {
            // A rehash overflow means the index can no longer hold its key
            // set; serving on would hide a corrupt store.
            if matches!(e, NestError::RehashOverflow { .. }) {
                tracing::error!("fatal storage fault: {e}");
                shutdown.store(true, Ordering::Relaxed);
            }
            Response::error(e.to_string())
        }
    }
}
