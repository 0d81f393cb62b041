// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cw_adapters::{FakeProcessAdapter, ProcessCall, RunScript};
use cw_storage::MemoryStore;
use tokio::sync::mpsc;

fn detector(
    fake: &FakeProcessAdapter,
    store: &MemoryStore,
) -> (IncidentDetector<FakeProcessAdapter>, mpsc::UnboundedReceiver<Arc<str>>) {
    let broadcaster = Broadcaster::new();
    let (tx, rx) = mpsc::unbounded_channel();
    broadcaster.subscribe(tx);
    let config = DetectorConfig::new("/srv/scripts", "python").args(["detect_accident.py", "{image}"]);
    let detector = IncidentDetector::new(fake.clone(), broadcaster, Arc::new(store.clone()), config);
    (detector, rx)
}

#[tokio::test]
async fn accident_is_published_and_recorded() {
    let fake = FakeProcessAdapter::new();
    let store = MemoryStore::new();
    fake.push_run(RunScript::exit(
        0,
        r#"{"accident": true, "info": {"reason": "vehicle_proximity", "close_pairs": 1}}"#,
        "",
    ));
    let (detector, mut rx) = detector(&fake, &store);

    let report = detector.detect("7", "cams/7.jpg").await.unwrap();

    assert!(report.accident);
    assert_eq!(report.info["reason"], "vehicle_proximity");

    let frame: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
    assert_eq!(frame["type"], "incident_alert");
    assert_eq!(frame["signal_id"], "7");
    assert_eq!(frame["data"]["image"], "cams/7.jpg");

    let incidents = store.read_all(INCIDENTS).unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].record["signal_id"], "7");

    match &fake.calls()[0] {
        ProcessCall::Run { spec } => {
            assert_eq!(spec.command_line(), "python detect_accident.py cams/7.jpg")
        }
        other => panic!("unexpected call: {:?}", other),
    }
}

#[tokio::test]
async fn clean_image_publishes_nothing() {
    let fake = FakeProcessAdapter::new();
    let store = MemoryStore::new();
    fake.push_run(RunScript::exit(
        0,
        r#"{"accident": false, "info": {"reason": "no_accident_detected"}}"#,
        "",
    ));
    let (detector, mut rx) = detector(&fake, &store);

    let report = detector.detect("7", "cams/7.jpg").await.unwrap();

    assert!(!report.accident);
    assert!(rx.try_recv().is_err());
    assert!(store.read_all(INCIDENTS).unwrap().is_empty());
}

#[tokio::test]
async fn detector_error_message_is_surfaced() {
    let fake = FakeProcessAdapter::new();
    let store = MemoryStore::new();
    fake.push_run(RunScript::exit(
        1,
        r#"{"error": "Image not found", "path": "cams/9.jpg"}"#,
        "",
    ));
    let (detector, mut rx) = detector(&fake, &store);

    let err = detector.detect("9", "cams/9.jpg").await.unwrap_err();

    match err {
        DetectionError::Failed { code, message } => {
            assert_eq!(code, Some(1));
            assert_eq!(message, "Image not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn failure_without_json_falls_back_to_stderr() {
    let fake = FakeProcessAdapter::new();
    fake.push_run(RunScript::exit(2, "", "ModuleNotFoundError: cv2\n"));
    let (detector, _rx) = detector(&fake, &MemoryStore::new());

    let err = detector.detect("1", "a.jpg").await.unwrap_err();

    assert!(err.to_string().contains("ModuleNotFoundError: cv2"));
    assert!(err.to_string().contains("exit code 2"));
}

#[tokio::test]
async fn unparseable_report_is_rejected() {
    let fake = FakeProcessAdapter::new();
    fake.push_run(RunScript::exit(0, "loading model...", ""));
    let (detector, _rx) = detector(&fake, &MemoryStore::new());

    let err = detector.detect("1", "a.jpg").await.unwrap_err();

    assert!(matches!(err, DetectionError::MalformedReport(_)));
}
