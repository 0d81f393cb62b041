// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

//! Registry, supervisor and broadcaster wired together against a fake
//! process adapter

use cw_adapters::{FakeProcessAdapter, StreamScript};
use cw_core::{BroadcastMessage, LocationRegistry};
use cw_engine::{Broadcaster, WorkerConfig, WorkerSupervisor};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

const SIGNALS: &str = "\
SL_No,Name,Latitude,Longitude
1,Market Square,\"12°58'12\"\" N\",\"77°35'40\"\" E\"
2,Station Road,\"12°59'00\"\" N\",\"77°36'10\"\" E\"
3,Lake View,\"13°01'30\"\" N\",\"77°34'05\"\" E\"
";

async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Arc<str>>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        out.push(serde_json::from_str(&text).unwrap());
    }
    out
}

#[tokio::test]
async fn startup_supervises_available_locations_and_greets_subscribers() {
    let root = TempDir::new().unwrap();
    let csv = root.path().join("signal.csv");
    std::fs::write(&csv, SIGNALS).unwrap();
    for id in ["1", "3"] {
        std::fs::create_dir_all(
            root.path()
                .join(format!("All_Crossings/Crossing_{}/Lanes", id)),
        )
        .unwrap();
    }

    let fake = FakeProcessAdapter::new();
    fake.push_stream(
        "Crossing_1",
        StreamScript::lines([r#"{"lane": "N", "state": "green"}"#]).hold_open(),
    );
    let broadcaster = Broadcaster::new();
    let registry = LocationRegistry::new(&csv);
    let config = WorkerConfig::new(root.path(), "python")
        .args(["traffic.py", "Crossing_{id}"])
        .resource_dir("All_Crossings/Crossing_{id}/Lanes");
    let mut supervisor = WorkerSupervisor::new(fake.clone(), broadcaster.clone(), config);

    // An early subscriber sees worker output
    let (early_tx, mut early_rx) = mpsc::unbounded_channel();
    broadcaster.subscribe(early_tx);

    let locations = registry.load().unwrap();
    assert_eq!(locations.len(), 3);
    let started = supervisor.supervise_all(locations).await;
    settle().await;

    assert_eq!(started, 2);
    assert_eq!(fake.spawn_count("Crossing_1"), 1);
    assert_eq!(fake.spawn_count("Crossing_2"), 0);
    assert_eq!(fake.spawn_count("Crossing_3"), 1);

    let updates = drain(&mut early_rx);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["type"], "signal_update");
    assert_eq!(updates[0]["signal_id"], "1");
    assert_eq!(updates[0]["data"]["state"], "green");

    // A later subscriber is greeted with every known location, gaps included
    let (late_tx, mut late_rx) = mpsc::unbounded_channel();
    let greeting = BroadcastMessage::InitialSignals {
        signals: registry.load().unwrap(),
    };
    broadcaster
        .subscribe_with_greeting(late_tx, &greeting)
        .unwrap();

    let greeted = drain(&mut late_rx);
    assert_eq!(greeted.len(), 1);
    assert_eq!(greeted[0]["type"], "initial_signals");
    let names: Vec<&str> = greeted[0]["signals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Market Square", "Station Road", "Lake View"]);
    assert!(greeted[0]["signals"][0]["latitude"].as_f64().unwrap() > 12.9);

    supervisor.shutdown_all().await;
    assert_eq!(fake.live_count("python traffic.py Crossing_1"), 0);
    assert_eq!(fake.live_count("python traffic.py Crossing_3"), 0);
}
