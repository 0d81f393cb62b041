// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn append_then_read_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    store.append("incidents", json!({"signal_id": "1"})).unwrap();
    store.append("incidents", json!({"signal_id": "2"})).unwrap();

    let records = store.read_all("incidents").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].seq, 1);
    assert_eq!(records[1].seq, 2);
    assert_eq!(records[1].record["signal_id"], "2");
}

#[test]
fn collections_are_independent_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    store.append("alerts", json!({"id": "a"})).unwrap();
    store.append(crate::EMERGENCY_ROUTES, json!({"route": "r"})).unwrap();

    assert!(dir.path().join("alerts.jsonl").exists());
    assert!(dir.path().join("emergency_routes.jsonl").exists());
    assert_eq!(store.read_all("alerts").unwrap().len(), 1);
}

#[test]
fn unknown_collection_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    assert!(store.read_all("nothing").unwrap().is_empty());
}

#[test]
fn sequence_continues_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = JsonlStore::open(dir.path()).unwrap();
        store.append("alerts", json!(1)).unwrap();
        store.append("alerts", json!(2)).unwrap();
    }

    let store = JsonlStore::open(dir.path()).unwrap();
    let stored = store.append("alerts", json!(3)).unwrap();

    assert_eq!(stored.seq, 3);
    assert_eq!(store.read_all("alerts").unwrap().len(), 3);
}

#[test]
fn rejects_path_like_collection_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    for name in ["", "../escape", "a/b", "with space"] {
        assert!(
            matches!(
                store.append(name, json!({})),
                Err(StoreError::InvalidCollection(_))
            ),
            "{:?} should be rejected",
            name
        );
    }
}

#[test]
fn corrupt_line_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alerts.jsonl"), "not json\n").unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    assert!(matches!(store.read_all("alerts"), Err(StoreError::Json(_))));
}
