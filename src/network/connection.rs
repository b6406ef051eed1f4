//! Connection Handler
//!
//! Handles a single peer connection: handshake, request decoding, queue
//! hand-off with backpressure, and reply delivery.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{NestError, Result};
use crate::peer::{PeerHandle, PeerRegistry, PeerState};
use crate::protocol::{encode_handle, parse_handshake, parse_request, Control, Request, Response};
use crate::queue::{Task, TaskQueue, TryPushError};

use super::server::ReplyRouter;

/// Rounds of contended try_push before the request is rejected
const PUSH_ROUNDS: usize = 8;

/// Handles a single peer connection
pub struct Connection {
    reader: BufReader<UnixStream>,
    writer: BufWriter<UnixStream>,
    queue: Arc<TaskQueue<Task>>,
    router: Arc<ReplyRouter>,
    registry: Arc<PeerRegistry>,
    config: Config,
}

impl Connection {
    /// Wrap an accepted stream in buffered I/O
    pub fn new(
        stream: UnixStream,
        queue: Arc<TaskQueue<Task>>,
        router: Arc<ReplyRouter>,
        registry: Arc<PeerRegistry>,
        config: Config,
    ) -> Result<Self> {
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            queue,
            router,
            registry,
            config,
        })
    }

    /// Refuse a connection before the handshake (used at the accept limit)
    pub(crate) fn reject(stream: UnixStream, message: &str) -> Result<()> {
        let mut writer = BufWriter::new(stream);
        writer.write_all(&Response::error(message).to_line())?;
        writer.flush()?;
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// The first line must be the `HELLO {pid}` handshake; every further
    /// line is a data request or a control request.
    pub fn handle(&mut self) -> Result<()> {
        let peer = match self.handshake() {
            Ok(peer) => peer,
            Err(NestError::Io(ref e)) if disconnect_kind(e.kind()) => return Ok(()),
            Err(e) => {
                let _ = self.send(Response::error(e.to_string()));
                return Err(e);
            }
        };

        loop {
            let line = match self.read_line() {
                Ok(Some(line)) => line,
                // Peer closed the stream.
                Ok(None) => {
                    tracing::debug!(handle = peer.0, "peer disconnected");
                    return Ok(());
                }
                Err(NestError::Io(ref e)) if disconnect_kind(e.kind()) => {
                    tracing::debug!(handle = peer.0, "peer connection dropped");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match self.registry.state(peer) {
                PeerState::Active => {}
                PeerState::Paused => {
                    self.send(Response::error("peer is paused"))?;
                    continue;
                }
                PeerState::Terminated => {
                    let _ = self.send(Response::error("peer is terminated"));
                    tracing::debug!(handle = peer.0, "closing terminated peer");
                    return Ok(());
                }
            }

            let response = match parse_request(&line) {
                Ok(Request::Control(control)) => self.apply_control(control),
                Ok(Request::Data(command)) => {
                    let (task_id, reply) = self.router.issue();
                    let origin = self.registry.peer_id(peer);
                    self.submit(Task::from_command(command, origin, task_id), reply)
                }
                // A malformed line still flows through the queue as an
                // ERROR-tagged task; the engine is never invoked for it.
                Err(e) => {
                    let (task_id, reply) = self.router.issue();
                    let origin = self.registry.peer_id(peer);
                    self.submit(Task::decode_error(e.to_string(), origin, task_id), reply)
                }
            };

            self.send(response)?;
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Read and answer the `HELLO {pid}` line
    fn handshake(&mut self) -> Result<PeerHandle> {
        let line = self
            .read_line()?
            .ok_or_else(|| NestError::Protocol("peer closed before handshake".to_string()))?;
        let pid = parse_handshake(&line)?;
        let handle = self.registry.register(pid);

        self.writer.write_all(&encode_handle(handle.0))?;
        self.writer.flush()?;

        tracing::debug!(pid, handle = handle.0, "handshake complete");
        Ok(handle)
    }

    /// Push a task and wait for the worker's reply
    ///
    /// Queue-full is reported to the peer immediately (backpressure);
    /// contention is retried a few rounds before giving up.
    fn submit(
        &self,
        task: Task,
        reply: crossbeam::channel::Receiver<Response>,
    ) -> Response {
        let task_id = task.task_id;
        let mut task = task;

        for round in 0.. {
            match self.queue.try_push(task, self.config.queue_max_retries) {
                Ok(()) => break,
                Err(TryPushError::Full(_)) => {
                    self.router.forget(task_id);
                    return Response::error("task queue full, retry later");
                }
                Err(TryPushError::Busy(rejected)) => {
                    if round >= PUSH_ROUNDS {
                        self.router.forget(task_id);
                        return Response::error("task queue contended, retry later");
                    }
                    task = rejected;
                    thread::yield_now();
                }
            }
        }

        match reply.recv_timeout(Duration::from_millis(self.config.reply_timeout_ms)) {
            Ok(response) => response,
            Err(_) => {
                self.router.forget(task_id);
                Response::error("timed out waiting for worker")
            }
        }
    }

    /// Apply a lifecycle control request addressed to some peer
    fn apply_control(&self, control: Control) -> Response {
        let (applied, handle) = match control {
            Control::Pause(h) => (self.registry.pause(PeerHandle(h)), h),
            Control::Resume(h) => (self.registry.resume(PeerHandle(h)), h),
            Control::Terminate(h) => (self.registry.terminate(PeerHandle(h)), h),
        };
        if applied {
            Response::ok()
        } else {
            Response::error(format!("no controllable peer with handle {handle}"))
        }
    }

    /// Read one newline-terminated line; `None` on clean EOF
    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn send(&mut self, response: Response) -> Result<()> {
        self.writer.write_all(&response.to_line())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// I/O error kinds that mean the peer went away rather than a server fault
fn disconnect_kind(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
    )
}
