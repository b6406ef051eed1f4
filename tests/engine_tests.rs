//! Tests for the Engine and its cuckoo index
//!
//! These tests verify:
//! - Basic get/set/delete/contains operations
//! - Update-in-place vs fresh insert accounting
//! - Rehash growth (occupancy preserved, capacity doubled)
//! - The eviction path between the two tables
//! - Concurrent writer correctness

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use nestkv::config::Config;
use nestkv::engine::Engine;
use nestkv::index::{base_hash, slot1, SetOutcome};
use nestkv::protocol::{Command, Response, Status};

// =============================================================================
// Helper Functions
// =============================================================================

fn small_engine() -> Engine<String, u64> {
    Engine::new(Config::builder().initial_capacity(4).build())
}

fn bytes_engine() -> Engine<Bytes, Bytes> {
    Engine::new(Config::builder().initial_capacity(64).build())
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_set_then_get() {
    let engine = small_engine();

    engine.set("hello".to_string(), 1).unwrap();
    assert_eq!(engine.get(&"hello".to_string()), Some(1));
}

#[test]
fn test_get_nonexistent_key() {
    let engine = small_engine();

    assert_eq!(engine.get(&"nonexistent".to_string()), None);
}

#[test]
fn test_set_overwrite() {
    let engine = small_engine();

    assert_eq!(
        engine.set("key".to_string(), 1).unwrap(),
        SetOutcome::Inserted
    );
    assert_eq!(
        engine.set("key".to_string(), 2).unwrap(),
        SetOutcome::Updated
    );

    assert_eq!(engine.get(&"key".to_string()), Some(2));
    assert_eq!(engine.len(), 1);
}

#[test]
fn test_delete() {
    let engine = small_engine();

    engine.set("key".to_string(), 1).unwrap();
    assert!(engine.delete(&"key".to_string()));
    assert_eq!(engine.get(&"key".to_string()), None);
    assert_eq!(engine.len(), 0);
}

#[test]
fn test_delete_is_idempotent() {
    let engine = small_engine();

    engine.set("key".to_string(), 1).unwrap();
    assert!(engine.delete(&"key".to_string()));
    assert!(!engine.delete(&"key".to_string()));
    assert!(!engine.delete(&"never-there".to_string()));
}

#[test]
fn test_contains_matches_get() {
    let engine = small_engine();

    engine.set("present".to_string(), 7).unwrap();

    for key in ["present", "absent"] {
        let key = key.to_string();
        assert_eq!(engine.contains(&key), engine.get(&key).is_some());
    }
}

#[test]
fn test_insert_is_create_only() {
    let engine = small_engine();

    assert!(engine.insert("key".to_string(), 1).unwrap());
    assert!(!engine.insert("key".to_string(), 2).unwrap());
    // The refused insert must not have touched the value.
    assert_eq!(engine.get(&"key".to_string()), Some(1));
}

// =============================================================================
// Rehash Tests
// =============================================================================

#[test]
fn test_rehash_preserves_all_keys() {
    let engine = small_engine();
    let initial = engine.capacity();

    for i in 0..64u64 {
        engine.set(format!("key-{i}"), i).unwrap();
    }

    assert_eq!(engine.len(), 64);
    assert!(engine.capacity() > initial);
    // Capacity only ever doubles, so growth is a power-of-two multiple.
    assert_eq!(engine.capacity() % initial, 0);
    assert!((engine.capacity() / initial).is_power_of_two());

    for i in 0..64u64 {
        assert_eq!(engine.get(&format!("key-{i}")), Some(i), "key-{i} lost");
    }
}

#[test]
fn test_load_factor_tracks_occupancy() {
    let engine = small_engine();
    assert_eq!(engine.load_factor(), 0.0);

    engine.set("a".to_string(), 1).unwrap();
    let expected = 1.0 / engine.capacity() as f64;
    assert!((engine.load_factor() - expected).abs() < f64::EPSILON);
}

#[test]
fn test_eviction_between_tables() {
    // Two keys sharing a primary slot force the resident into its alternate
    // table; both must stay retrievable.
    let engine = small_engine();
    let capacity = engine.capacity();

    let first = "a".to_string();
    let target = slot1(base_hash(&first), capacity);
    let colliding = (0..1000u32)
        .map(|i| format!("probe-{i}"))
        .find(|k| slot1(base_hash(k), capacity) == target)
        .expect("no colliding key found in 1000 probes");

    engine.set(first.clone(), 1).unwrap();
    engine.set(colliding.clone(), 2).unwrap();

    assert_eq!(engine.get(&first), Some(1));
    assert_eq!(engine.get(&colliding), Some(2));
}

// =============================================================================
// Command Execution Tests
// =============================================================================

#[test]
fn test_execute_put_then_get() {
    let engine = bytes_engine();

    let put = engine
        .execute(Command::Put {
            key: Bytes::from_static(b"key"),
            value: Bytes::from_static(b"value"),
        })
        .unwrap();
    assert_eq!(put, Response::ok());

    let get = engine
        .execute(Command::Get {
            key: Bytes::from_static(b"key"),
        })
        .unwrap();
    assert_eq!(get, Response::ok_with(Bytes::from_static(b"value")));
}

#[test]
fn test_execute_get_miss_is_not_found() {
    let engine = bytes_engine();

    let get = engine
        .execute(Command::Get {
            key: Bytes::from_static(b"missing"),
        })
        .unwrap();
    assert_eq!(get.status, Status::NotFound);
}

#[test]
fn test_execute_post_refuses_existing_key() {
    let engine = bytes_engine();

    let first = engine
        .execute(Command::Post {
            key: Bytes::from_static(b"key"),
            value: Bytes::from_static(b"one"),
        })
        .unwrap();
    assert_eq!(first.status, Status::Ok);

    let second = engine
        .execute(Command::Post {
            key: Bytes::from_static(b"key"),
            value: Bytes::from_static(b"two"),
        })
        .unwrap();
    assert_eq!(second.status, Status::Error);

    // The refused create must not clobber the stored value.
    let get = engine
        .execute(Command::Get {
            key: Bytes::from_static(b"key"),
        })
        .unwrap();
    assert_eq!(get, Response::ok_with(Bytes::from_static(b"one")));
}

#[test]
fn test_execute_delete_reports_absence() {
    let engine = bytes_engine();

    engine
        .execute(Command::Put {
            key: Bytes::from_static(b"key"),
            value: Bytes::from_static(b"value"),
        })
        .unwrap();

    let deleted = engine
        .execute(Command::Delete {
            key: Bytes::from_static(b"key"),
        })
        .unwrap();
    assert_eq!(deleted.status, Status::Ok);

    let again = engine
        .execute(Command::Delete {
            key: Bytes::from_static(b"key"),
        })
        .unwrap();
    assert_eq!(again.status, Status::NotFound);
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_readers() {
    let engine = Arc::new(bytes_engine());

    for i in 0..100u32 {
        let key = Bytes::from(format!("key{i}").into_bytes());
        let value = Bytes::from(format!("value{i}").into_bytes());
        engine.set(key, value).unwrap();
    }

    let mut handles = vec![];
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..100u32 {
                let key = Bytes::from(format!("key{i}").into_bytes());
                let expected = Bytes::from(format!("value{i}").into_bytes());
                assert_eq!(engine.get(&key), Some(expected));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_distinct_writers() {
    // N distinct keys from several threads, no deletes: final occupancy
    // must be exactly N with every key retrievable, across rehashes.
    let engine: Arc<Engine<String, u64>> = Arc::new(small_engine());
    let threads = 4u64;
    let per_thread = 64u64;

    let mut handles = vec![];
    for t in 0..threads {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..per_thread {
                engine.set(format!("t{t}-k{i}"), t * per_thread + i).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.len() as u64, threads * per_thread);
    for t in 0..threads {
        for i in 0..per_thread {
            assert_eq!(
                engine.get(&format!("t{t}-k{i}")),
                Some(t * per_thread + i),
                "t{t}-k{i} lost"
            );
        }
    }
}

#[test]
fn test_concurrent_same_key_updates_settle_on_one_value() {
    let engine: Arc<Engine<String, u64>> = Arc::new(small_engine());
    let mut handles = vec![];

    for t in 0..4u64 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                engine.set("shared".to_string(), t).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.len(), 1);
    let value = engine.get(&"shared".to_string()).unwrap();
    assert!(value < 4);
}
