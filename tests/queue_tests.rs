//! Tests for the lock-free task queue
//!
//! These tests verify:
//! - FIFO order, byte-for-byte
//! - Full/empty/contended failure distinctions
//! - The one-empty-slot capacity rule
//! - Multi-producer/multi-consumer hand-off under contention

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use nestkv::queue::{
    Opcode, PeerId, Task, TaskId, TaskQueue, TryPopError, DEFAULT_MAX_RETRIES,
};
use parking_lot::Mutex;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_task(i: u64) -> Task {
    Task::set(
        Bytes::from(format!("key-{i}").into_bytes()),
        Bytes::from(format!("value-{i}").into_bytes()),
        PeerId(1),
        TaskId(i),
    )
}

// =============================================================================
// Sequential Behavior Tests
// =============================================================================

#[test]
fn test_fifo_order_byte_for_byte() {
    let queue = TaskQueue::with_capacity(16);

    for i in 0..15 {
        queue.try_push(sample_task(i), 1).unwrap();
    }
    for i in 0..15 {
        let task = queue.try_pop(1).unwrap();
        assert_eq!(task, sample_task(i));
        assert_eq!(task.key.as_ref(), format!("key-{i}").as_bytes());
        assert_eq!(task.opcode, Opcode::Set);
    }
    assert!(queue.is_empty());
}

#[test]
fn test_capacity_minus_one_slots_usable() {
    // 1024 slots: 1023 pushes succeed, the 1024th reports full (not
    // retry exhaustion), and a single pop reopens the queue.
    let queue = TaskQueue::with_capacity(1024);

    for i in 0..1023 {
        queue
            .try_push(sample_task(i), 1)
            .unwrap_or_else(|_| panic!("push {i} failed"));
    }

    let err = queue.try_push(sample_task(9999), DEFAULT_MAX_RETRIES).unwrap_err();
    assert!(err.is_full(), "expected full, got contention");
    assert!(queue.is_full());

    assert_eq!(queue.try_pop(1).unwrap(), sample_task(0));
    queue.try_push(sample_task(9999), 1).unwrap();
    assert_eq!(queue.len(), 1023);
}

#[test]
fn test_pop_on_empty_fails_immediately() {
    let queue: TaskQueue<Task> = TaskQueue::with_capacity(8);
    assert_eq!(queue.try_pop(DEFAULT_MAX_RETRIES), Err(TryPopError::Empty));
    assert!(queue.is_empty());
}

#[test]
fn test_push_failure_returns_the_task() {
    let queue = TaskQueue::with_capacity(2);
    queue.try_push(sample_task(0), 1).unwrap();

    let rejected = queue.try_push(sample_task(1), 1).unwrap_err().into_inner();
    assert_eq!(rejected, sample_task(1));
}

#[test]
fn test_version_counts_commits() {
    let queue = TaskQueue::with_capacity(8);
    assert_eq!(queue.version(), 0);

    queue.try_push(sample_task(0), 1).unwrap();
    queue.try_push(sample_task(1), 1).unwrap();
    queue.try_pop(1).unwrap();

    assert_eq!(queue.version(), 3);
}

#[test]
fn test_len_is_a_hint_that_tracks_quiescent_state() {
    let queue = TaskQueue::with_capacity(8);
    assert_eq!(queue.len(), 0);

    for i in 0..5 {
        queue.try_push(sample_task(i), 1).unwrap();
    }
    assert_eq!(queue.len(), 5);

    queue.try_pop(1).unwrap();
    assert_eq!(queue.len(), 4);
    assert!(!queue.is_empty());
    assert!(!queue.is_full());
}

// =============================================================================
// Blocking Wrapper Tests
// =============================================================================

#[test]
fn test_blocking_pop_waits_for_a_producer() {
    let queue: Arc<TaskQueue<Task>> = Arc::new(TaskQueue::with_capacity(8));

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    // Give the consumer a moment to start spinning on the empty queue.
    thread::sleep(std::time::Duration::from_millis(20));
    queue.push(sample_task(42));

    assert_eq!(consumer.join().unwrap(), sample_task(42));
}

#[test]
fn test_blocking_push_waits_for_space() {
    let queue: Arc<TaskQueue<u64>> = Arc::new(TaskQueue::with_capacity(2));
    queue.push(1);

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.push(2))
    };

    thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(queue.pop(), 1);

    producer.join().unwrap();
    assert_eq!(queue.pop(), 2);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_mpmc_hand_off_loses_nothing() {
    // More items than slots, so producers ride backpressure the whole way.
    let queue: Arc<TaskQueue<u64>> = Arc::new(TaskQueue::with_capacity(64));
    let producers = 4u64;
    let per_producer = 1000u64;
    let total = (producers * per_producer) as usize;

    let consumed = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let remaining = Arc::new(AtomicUsize::new(total));

    let mut handles = vec![];

    for t in 0..producers {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                queue.push(t * per_producer + i);
            }
        }));
    }

    for _ in 0..4 {
        let queue = Arc::clone(&queue);
        let consumed = Arc::clone(&consumed);
        let remaining = Arc::clone(&remaining);
        handles.push(thread::spawn(move || loop {
            // Claim an item slot before popping so consumers stop exactly
            // at the produced total.
            let prev = remaining.fetch_sub(1, Ordering::Relaxed);
            if prev == 0 || prev > total {
                remaining.fetch_add(1, Ordering::Relaxed);
                return;
            }
            let value = queue.pop();
            consumed.lock().push(value);
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let consumed = consumed.lock();
    assert_eq!(consumed.len(), total);

    let unique: HashSet<u64> = consumed.iter().copied().collect();
    assert_eq!(unique.len(), total, "duplicate or lost items");
    assert!(queue.is_empty());
}

#[test]
fn test_contended_heap_payloads_stay_intact() {
    // Heap-owning payloads through a small ring under heavy contention;
    // every popped string must be one that was pushed, exactly once.
    let queue: Arc<TaskQueue<String>> = Arc::new(TaskQueue::with_capacity(4));
    let producers = 4;
    let per_producer = 500;
    let total = producers * per_producer;

    let consumed = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let mut handles = vec![];

    for t in 0..producers {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                queue.push(format!("p{t}-{i}"));
            }
        }));
    }

    {
        let queue = Arc::clone(&queue);
        let consumed = Arc::clone(&consumed);
        handles.push(thread::spawn(move || {
            for _ in 0..total {
                consumed.lock().push(queue.pop());
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let consumed = consumed.lock();
    let unique: HashSet<&String> = consumed.iter().collect();
    assert_eq!(unique.len(), total);
    for t in 0..producers {
        for i in 0..per_producer {
            assert!(unique.contains(&format!("p{t}-{i}")));
        }
    }
}
