//! S6: sort of JSON rows by two fields, read back after quiescence (§8).

use std::time::Duration;

use gk_codec::{DataKind, SortDefinition, SortDirection, SortField};
use gk_store::{EngineConfig, GpuKvEngine, StoreOptions};

fn engine() -> std::sync::Arc<GpuKvEngine> {
    GpuKvEngine::with_backend(
        gk_gpu::fake::FakeBackend::arc(),
        EngineConfig {
            batch_threshold: 10_000,
            debounce: Duration::from_millis(250),
        },
    )
}

#[test]
fn sort_definition_orders_rows_by_age_then_name() {
    let engine = engine();
    let definition = SortDefinition {
        name: "by_age_then_name".to_owned(),
        fields: vec![
            SortField {
                path: "age".to_owned(),
                kind: DataKind::Number,
                direction: SortDirection::Ascending,
            },
            SortField {
                path: "name".to_owned(),
                kind: DataKind::String,
                direction: SortDirection::Ascending,
            },
        ],
    };
    let store = engine
        .create_store(
            "people",
            StoreOptions::json(1 << 20, 32).with_sort_definitions(vec![definition]),
        )
        .unwrap();

    let mut records = vec![
        ("r0", 42, "mallory"),
        ("r1", 19, "zoe"),
        ("r2", 19, "alice"),
        ("r3", 65, "bob"),
        ("r4", 30, "carol"),
        ("r5", 30, "aaron"),
        ("r6", 8, "dave"),
        ("r7", 8, "erin"),
        ("r8", 51, "frank"),
        ("r9", 42, "grace"),
    ];
    for (key, age, name) in &records {
        let body = serde_json::to_vec(&serde_json::json!({ "age": age, "name": name })).unwrap();
        store.put(key, &body).unwrap();
    }
    store.await_ready().unwrap();

    records.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.cmp(b.2)));
    let expected_order: Vec<String> = records.iter().map(|(key, _, _)| key.to_string()).collect();

    let actual_order = engine
        .ordered_keys("people", "by_age_then_name")
        .unwrap()
        .unwrap();
    assert_eq!(actual_order, expected_order);
}
