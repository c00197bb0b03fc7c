//! S4: ranged, directional cursor scans (§8).

use gk_store::{Direction, EngineConfig, GpuKvEngine, KeyRange, StoreOptions};

fn engine() -> std::sync::Arc<GpuKvEngine> {
    GpuKvEngine::with_backend(gk_gpu::fake::FakeBackend::arc(), EngineConfig::default())
}

#[test]
fn descending_half_open_range_yields_keys_in_reverse_lexicographic_order() {
    let engine = engine();
    let store = engine
        .create_store("nums", StoreOptions::opaque(1 << 20, 256))
        .unwrap();

    for n in 100..200 {
        store.put(&n.to_string(), b"v").unwrap();
    }

    let range = KeyRange {
        lower: Some("120".to_owned()),
        upper: Some("125".to_owned()),
        lower_inclusive: true,
        upper_inclusive: false,
    };
    let results = store.cursor(&range, Direction::Descending).unwrap();
    let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["124", "123", "122", "121", "120"]);
}

#[test]
fn ascending_is_the_default_direction() {
    let engine = engine();
    let store = engine
        .create_store("nums", StoreOptions::opaque(1 << 20, 256))
        .unwrap();

    for n in 100..200 {
        store.put(&n.to_string(), b"v").unwrap();
    }

    let range = KeyRange {
        lower: Some("120".to_owned()),
        upper: Some("125".to_owned()),
        lower_inclusive: true,
        upper_inclusive: false,
    };
    let results = store.cursor(&range, Direction::default()).unwrap();
    let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["120", "121", "122", "123", "124"]);
}

#[test]
fn deleted_keys_never_appear_in_a_cursor_scan() {
    let engine = engine();
    let store = engine
        .create_store("nums", StoreOptions::opaque(4096, 16))
        .unwrap();
    store.put("a", b"v").unwrap();
    store.put("b", b"v").unwrap();
    store.delete("a").unwrap();

    let results = store.cursor(&KeyRange::default(), Direction::Ascending).unwrap();
    let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["b"]);
}
