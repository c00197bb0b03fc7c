//! S5: batch threshold and debounce timer both drive a flush (§8).

use std::time::{Duration, Instant};

use gk_store::{EngineConfig, GpuKvEngine, StoreOptions};

fn engine(batch_threshold: usize, debounce: Duration) -> std::sync::Arc<GpuKvEngine> {
    GpuKvEngine::with_backend(
        gk_gpu::fake::FakeBackend::arc(),
        EngineConfig {
            batch_threshold,
            debounce,
        },
    )
}

#[test]
fn crossing_the_batch_threshold_flushes_immediately() {
    let engine = engine(3, Duration::from_secs(3600));
    let store = engine
        .create_store("events", StoreOptions::opaque(1 << 16, 64))
        .unwrap();

    store.put("a", b"v").unwrap();
    store.put("b", b"v").unwrap();
    assert!(!store.is_ready().unwrap());

    store.put("c", b"v").unwrap();
    assert!(store.is_ready().unwrap());
}

#[test]
fn debounce_timer_flushes_once_it_elapses() {
    let engine = engine(10_000, Duration::from_millis(250));
    let store = engine
        .create_store("events", StoreOptions::opaque(1 << 16, 64))
        .unwrap();

    let t0 = Instant::now();
    store.put("a", b"v").unwrap();
    assert!(!store.is_ready().unwrap());

    engine.tick(t0).unwrap();
    assert!(!store.is_ready().unwrap(), "debounce has not elapsed yet");

    engine.tick(t0 + Duration::from_millis(251)).unwrap();
    assert!(store.is_ready().unwrap());
}

#[test]
fn pending_queue_is_empty_after_the_triggering_flush() {
    let engine = engine(5, Duration::from_secs(3600));
    let store = engine
        .create_store("events", StoreOptions::opaque(1 << 16, 64))
        .unwrap();

    for n in 0..5 {
        store.put(&format!("k{n}"), b"v").unwrap();
    }
    assert!(store.is_ready().unwrap());
    // A store that is ready has nothing left for the debounce tick to flush.
    engine.tick(Instant::now() + Duration::from_secs(3600)).unwrap();
    assert!(store.is_ready().unwrap());
}
