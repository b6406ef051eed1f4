//! Bounded lock-free MPMC ring buffer
//!
//! ## Synchronization
//!
//! Head and tail are monotonically increasing tickets committed with
//! compare-and-swap; the buffer index is the ticket modulo the slot count.
//! Both counters live in [`CachePadded`] cells so a consumer's head updates
//! never share a cache line with a producer's tail updates.
//!
//! One slot is always left empty: `tail - head == capacity - 1` means full,
//! `head == tail` means empty, so the two states stay distinguishable from
//! the counters alone.
//!
//! ## Claim-then-write
//!
//! A producer must *claim* a slot before writing into it. Every slot carries
//! a sequence marker: it equals the producer's ticket while the slot is free
//! for that lap, and ticket+1 once the payload is published. The tail CAS is
//! only attempted when the marker shows the slot free, so two producers
//! racing for the same ticket can never interleave their payload writes:
//! the loser's CAS fails before it touches the slot. Consumers gate on the
//! marker as well, never on the tail position alone, so a claimed-but-unwritten
//! slot is treated as contention rather than read half-written.
//!
//! ## Contention policy
//!
//! Producers and consumers never block on a kernel lock: a lost race costs a
//! bounded exponential spin (doubling, capped at 256 iterations) and a
//! retry. The blocking wrappers yield the scheduling quantum between retry
//! rounds and loop without a timeout; there is no fairness guarantee.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam::utils::CachePadded;

/// Default slot count of a task queue (capacity - 1 usable)
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default retry bound for the non-blocking operations
pub const DEFAULT_MAX_RETRIES: usize = 1000;

/// Retry bound used per round by the blocking wrappers
const BLOCKING_RETRIES: usize = 100;

/// Cap on the exponential spin backoff
const BACKOFF_SPIN_LIMIT: u32 = 256;

// =============================================================================
// Failure types
// =============================================================================

/// Failure of a non-blocking push; carries the rejected element back
pub enum TryPushError<T> {
    /// The queue was full; immediate failure, the caller applies
    /// backpressure
    Full(T),

    /// The retry bound was exhausted under contention; distinct from full,
    /// the caller may try again later
    Busy(T),
}

impl<T> TryPushError<T> {
    /// Recover the element that could not be pushed
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(value) | TryPushError::Busy(value) => value,
        }
    }

    /// Whether the failure was a full queue (as opposed to contention)
    pub fn is_full(&self) -> bool {
        matches!(self, TryPushError::Full(_))
    }
}

impl<T> fmt::Debug for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => f.write_str("Full(..)"),
            TryPushError::Busy(_) => f.write_str("Busy(..)"),
        }
    }
}

impl<T> fmt::Display for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => f.write_str("pushing into a full queue"),
            TryPushError::Busy(_) => f.write_str("pushing into a contended queue"),
        }
    }
}

impl<T> std::error::Error for TryPushError<T> {}

/// Failure of a non-blocking pop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPopError {
    /// The queue was empty; a normal outcome, not an error
    Empty,

    /// The retry bound was exhausted under contention
    Busy,
}

impl fmt::Display for TryPopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPopError::Empty => f.write_str("popping from an empty queue"),
            TryPopError::Busy => f.write_str("popping from a contended queue"),
        }
    }
}

impl std::error::Error for TryPopError {}

// =============================================================================
// Queue
// =============================================================================

/// One ring slot: a sequence marker plus the (possibly uninitialized) payload
struct QueueSlot<T> {
    /// Lap-counted claim marker; see the module docs for the lifecycle
    seq: AtomicU64,

    /// Payload storage, only valid between publish and consume
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded multi-producer multi-consumer queue of operation requests
///
/// Decouples request ingestion from worker execution without blocking on a
/// mutex. `len`/`is_empty`/`is_full` are approximate hints under concurrent
/// mutation and must never drive correctness decisions.
pub struct TaskQueue<T> {
    /// Ring storage; index = ticket % slot count
    slots: Box<[QueueSlot<T>]>,

    /// Next ticket to consume
    head: CachePadded<AtomicU64>,

    /// Next ticket to produce
    tail: CachePadded<AtomicU64>,

    /// Committed-operation counter, diagnostic only
    version: CachePadded<AtomicU64>,

    capacity: usize,
}

unsafe impl<T: Send> Send for TaskQueue<T> {}
unsafe impl<T: Send> Sync for TaskQueue<T> {}

impl<T> TaskQueue<T> {
    /// Create a queue with [`DEFAULT_QUEUE_CAPACITY`] slots
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a queue with the given slot count (capacity - 1 usable)
    ///
    /// ## Panics
    /// Panics if `capacity < 2`, which would leave no usable slot.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "queue capacity must be at least 2");
        Self {
            slots: (0..capacity as u64)
                .map(|i| QueueSlot {
                    seq: AtomicU64::new(i),
                    value: UnsafeCell::new(MaybeUninit::uninit()),
                })
                .collect(),
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            version: CachePadded::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Non-blocking push
    ///
    /// Returns `Full` immediately when the queue is full (no retries) and
    /// `Busy` after `max_retries` lost races; both carry the element back.
    pub fn try_push(&self, value: T, max_retries: usize) -> Result<(), TryPushError<T>> {
        let mut spins: u32 = 1;

        for _ in 0..max_retries.max(1) {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);

            if tail.wrapping_sub(head) >= (self.capacity - 1) as u64 {
                return Err(TryPushError::Full(value));
            }

            let slot = &self.slots[(tail % self.capacity as u64) as usize];
            if slot.seq.load(Ordering::Acquire) == tail
                && self
                    .tail
                    .compare_exchange_weak(tail, tail + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                // Slot claimed: the write is private until seq publishes it.
                unsafe { (*slot.value.get()).write(value) };
                slot.seq.store(tail + 1, Ordering::Release);
                self.version.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }

            spins = spin_backoff(spins);
        }

        Err(TryPushError::Busy(value))
    }

    /// Non-blocking pop
    ///
    /// Returns `Empty` immediately when the queue is empty and `Busy` after
    /// `max_retries` lost races.
    pub fn try_pop(&self, max_retries: usize) -> Result<T, TryPopError> {
        let mut spins: u32 = 1;

        for _ in 0..max_retries.max(1) {
            let head = self.head.load(Ordering::Relaxed);
            let tail = self.tail.load(Ordering::Acquire);

            if head == tail {
                return Err(TryPopError::Empty);
            }

            let slot = &self.slots[(head % self.capacity as u64) as usize];
            if slot.seq.load(Ordering::Acquire) == head + 1
                && self
                    .head
                    .compare_exchange_weak(head, head + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                let value = unsafe { (*slot.value.get()).assume_init_read() };
                // Free the slot for the producer one lap ahead.
                slot.seq
                    .store(head + self.capacity as u64, Ordering::Release);
                self.version.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }

            spins = spin_backoff(spins);
        }

        Err(TryPopError::Busy)
    }

    /// Blocking push: spin rounds of bounded retries, yielding between them
    ///
    /// No timeout and no cancellation; wrap externally if either is needed.
    pub fn push(&self, value: T) {
        let mut value = value;
        loop {
            match self.try_push(value, BLOCKING_RETRIES) {
                Ok(()) => return,
                Err(err) => {
                    value = err.into_inner();
                    thread::yield_now();
                }
            }
        }
    }

    /// Blocking pop counterpart of [`push`](Self::push)
    pub fn pop(&self) -> T {
        loop {
            match self.try_pop(BLOCKING_RETRIES) {
                Ok(value) => return value,
                Err(_) => thread::yield_now(),
            }
        }
    }

    /// Approximate number of enqueued elements (unsynchronized snapshot)
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.saturating_sub(head) as usize
    }

    /// Approximate emptiness hint
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    /// Approximate fullness hint
    pub fn is_full(&self) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) >= (self.capacity - 1) as u64
    }

    /// Slot count (one more than the usable capacity)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Committed push/pop count, diagnostic only
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for TaskQueue<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();

        for ticket in head..tail {
            let slot = &mut self.slots[(ticket % self.capacity as u64) as usize];
            // Only fully published payloads are live.
            if *slot.seq.get_mut() == ticket + 1 {
                unsafe { slot.value.get_mut().assume_init_drop() };
            }
        }
    }
}

/// Spin for the given iteration count, then double it up to the cap
fn spin_backoff(spins: u32) -> u32 {
    for _ in 0..spins {
        std::hint::spin_loop();
    }
    (spins << 1).min(BACKOFF_SPIN_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let queue = TaskQueue::with_capacity(8);
        for i in 0..7 {
            queue.try_push(i, 1).unwrap();
        }
        for i in 0..7 {
            assert_eq!(queue.try_pop(1).unwrap(), i);
        }
    }

    #[test]
    fn full_is_reported_immediately() {
        let queue = TaskQueue::with_capacity(4);
        for i in 0..3 {
            queue.try_push(i, 1).unwrap();
        }
        let err = queue.try_push(99, DEFAULT_MAX_RETRIES).unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), 99);
    }

    #[test]
    fn empty_is_reported_immediately() {
        let queue: TaskQueue<u32> = TaskQueue::with_capacity(4);
        assert_eq!(queue.try_pop(DEFAULT_MAX_RETRIES), Err(TryPopError::Empty));
    }

    #[test]
    fn pop_reopens_a_full_queue() {
        let queue = TaskQueue::with_capacity(4);
        for i in 0..3 {
            queue.try_push(i, 1).unwrap();
        }
        assert!(queue.try_push(3, 1).is_err());
        assert_eq!(queue.try_pop(1).unwrap(), 0);
        queue.try_push(3, 1).unwrap();
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn version_counts_committed_operations() {
        let queue = TaskQueue::with_capacity(8);
        queue.try_push(1, 1).unwrap();
        queue.try_push(2, 1).unwrap();
        queue.try_pop(1).unwrap();
        assert_eq!(queue.version(), 3);
    }

    #[test]
    fn drop_releases_unconsumed_elements() {
        let queue = TaskQueue::with_capacity(8);
        queue.try_push(String::from("left-behind"), 1).unwrap();
        queue.try_push(String::from("also-left"), 1).unwrap();
        drop(queue);
    }
}
