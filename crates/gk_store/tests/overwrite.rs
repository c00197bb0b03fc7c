//! S1/S2: in-place overwrite vs grow-and-reallocate (§8).

use gk_store::{EngineConfig, GpuKvEngine, StoreOptions};

fn engine() -> std::sync::Arc<GpuKvEngine> {
    GpuKvEngine::with_backend(gk_gpu::fake::FakeBackend::arc(), EngineConfig::default())
}

#[test]
fn in_place_overwrite_shrinks_the_same_row() {
    let engine = engine();
    let store = engine
        .create_store("docs", StoreOptions::json(1 << 20, 10))
        .unwrap();

    store.put("k", br#"{"a":1}"#).unwrap();
    store.put("k", br#"{"a":2}"#).unwrap();

    let value = store.get("k").unwrap().unwrap();
    let decoded: serde_json::Value = serde_json::from_slice(&value).unwrap();
    assert_eq!(decoded, serde_json::json!({"a": 2}));
}

#[test]
fn grow_reallocates_and_keeps_exactly_one_active_row() {
    let engine = engine();
    let store = engine
        .create_store("docs", StoreOptions::json(1 << 20, 10))
        .unwrap();

    store.put("k", br#"{"a":1}"#).unwrap();
    let long_value = "x".repeat(1000);
    let body = serde_json::to_vec(&serde_json::json!({ "x": long_value })).unwrap();
    store.put("k", &body).unwrap();

    let value = store.get("k").unwrap().unwrap();
    let decoded: serde_json::Value = serde_json::from_slice(&value).unwrap();
    assert_eq!(decoded["x"], long_value);
}
