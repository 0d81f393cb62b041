// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cw_adapters::{FakeProcessAdapter, ProcessCall, RunScript};
use cw_core::{ResultSource, RouteRecord};
use cw_storage::MemoryStore;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Harness {
    dir: TempDir,
    fake: FakeProcessAdapter,
    store: MemoryStore,
    updates: mpsc::UnboundedReceiver<Arc<str>>,
    invoker: ComputationInvoker<FakeProcessAdapter>,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let fake = FakeProcessAdapter::new();
    let store = MemoryStore::new();
    let broadcaster = Broadcaster::new();
    let (tx, updates) = mpsc::unbounded_channel();
    broadcaster.subscribe(tx);
    let config = InvokerConfig::new(dir.path(), "python").args(["mainAlgo.py"]);
    let invoker = ComputationInvoker::new(
        fake.clone(),
        broadcaster,
        Arc::new(store.clone()),
        config,
    );
    Harness {
        dir,
        fake,
        store,
        updates,
        invoker,
    }
}

fn request() -> ComputationRequest {
    ComputationRequest::new(vec![
        RouteRecord {
            route: "North".into(),
            signal_serial_numbers: vec!["1".into(), "4".into()],
            distance_time: "3 km / 9 min".into(),
        },
        RouteRecord {
            route: "Ring \"road\"".into(),
            signal_serial_numbers: vec!["2".into()],
            distance_time: "5 km / 8 min".into(),
        },
    ])
}

fn published(rx: &mut mpsc::UnboundedReceiver<Arc<str>>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        out.push(serde_json::from_str(&text).unwrap());
    }
    out
}

#[tokio::test]
async fn writes_input_artifact_and_parses_stdout() {
    let mut h = harness();
    h.fake
        .push_run(RunScript::exit(0, "{\"fastest\": \"North\"}\n", "[Warning] slow"));

    let result = h
        .invoker
        .invoke(&request(), &CallerRole::new("public"))
        .await
        .unwrap();

    assert_eq!(result.result, json!({ "fastest": "North" }));
    assert_eq!(result.source, ResultSource::Stdout);
    assert_eq!(result.stderr, "[Warning] slow");

    let artifact = std::fs::read_to_string(h.dir.path().join("routeSignal.csv")).unwrap();
    assert_eq!(
        artifact,
        "route,signal_serial_numbers,distance_time\n\
         \"North\",\"1;4\",\"3 km / 9 min\"\n\
         \"Ring road\",\"2\",\"5 km / 8 min\"\n"
    );

    match &h.fake.calls()[0] {
        ProcessCall::Run { spec } => {
            assert_eq!(spec.command_line(), "python mainAlgo.py");
            assert_eq!(spec.cwd, h.dir.path());
        }
        other => panic!("unexpected call: {:?}", other),
    }

    let seen = published(&mut h.updates);
    assert_eq!(
        seen,
        vec![json!({ "type": "route_update", "data": { "fastest": "North" } })]
    );
}

#[tokio::test]
async fn falls_back_to_result_artifact() {
    let mut h = harness();
    h.fake.push_run(
        RunScript::exit(0, "Evaluating 2 routes...\n", "")
            .writes("fastest_route.json", r#"{"fastest": "Ring"}"#),
    );

    let result = h
        .invoker
        .invoke(&request(), &CallerRole::new("public"))
        .await
        .unwrap();

    assert_eq!(result.source, ResultSource::ResultArtifact);
    assert_eq!(result.result["fastest"], "Ring");
    assert_eq!(published(&mut h.updates).len(), 1);
}

#[tokio::test]
async fn stale_result_artifact_is_not_reused() {
    let mut h = harness();
    std::fs::write(h.dir.path().join("fastest_route.json"), r#"{"old": true}"#).unwrap();
    h.fake.push_run(RunScript::exit(0, "", ""));

    let err = h
        .invoker
        .invoke(&request(), &CallerRole::new("public"))
        .await
        .unwrap_err();

    assert!(matches!(err, InvocationError::Unresolved { .. }));
    assert!(published(&mut h.updates).is_empty());
}

#[tokio::test]
async fn non_zero_exit_carries_stderr_and_publishes_nothing() {
    let mut h = harness();
    h.fake
        .push_run(RunScript::exit(1, "", "Traceback: KeyError 'route'"));

    let err = h
        .invoker
        .invoke(&request(), &CallerRole::emergency())
        .await
        .unwrap_err();

    match &err {
        InvocationError::NonZeroExit { code, stderr } => {
            assert_eq!(*code, Some(1));
            assert!(stderr.contains("KeyError"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.stderr(), Some("Traceback: KeyError 'route'"));
    assert!(published(&mut h.updates).is_empty());
    assert!(h.store.read_all(EMERGENCY_ROUTES).unwrap().is_empty());
}

#[tokio::test]
async fn unresolved_result_reports_both_attempts() {
    let mut h = harness();
    h.fake.push_run(RunScript::exit(0, "done", "note"));

    let err = h
        .invoker
        .invoke(&request(), &CallerRole::new("public"))
        .await
        .unwrap_err();

    match &err {
        InvocationError::Unresolved { attempts, stderr } => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].source, ResultSource::Stdout);
            assert_eq!(attempts[1].source, ResultSource::ResultArtifact);
            assert_eq!(stderr, "note");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("stdout:"));
    assert!(published(&mut h.updates).is_empty());
}

#[tokio::test]
async fn spawn_failure_is_a_process_error() {
    let h = harness();
    h.fake.push_run(RunScript::spawn_failure("python: not found"));

    let err = h
        .invoker
        .invoke(&request(), &CallerRole::new("public"))
        .await
        .unwrap_err();

    assert!(matches!(err, InvocationError::Process(_)));
    assert_eq!(err.stderr(), None);
}

#[tokio::test]
async fn emergency_requests_are_recorded() {
    let h = harness();
    h.fake.push_run(RunScript::exit(0, r#"{"fastest": "North"}"#, ""));
    h.fake.push_run(RunScript::exit(0, r#"{"fastest": "Ring"}"#, ""));

    h.invoker
        .invoke(&request(), &CallerRole::new(" Emergency "))
        .await
        .unwrap();
    h.invoker
        .invoke(&request(), &CallerRole::new("public"))
        .await
        .unwrap();

    let history = h.store.read_all(EMERGENCY_ROUTES).unwrap();
    assert_eq!(history.len(), 1);
    let record = &history[0].record;
    assert_eq!(record["role"], " Emergency ");
    assert_eq!(record["result"]["fastest"], "North");
    assert_eq!(record["routes"][0]["route"], "North");
    assert_eq!(record["source"], "stdout");
}

#[tokio::test]
async fn missing_script_root_fails_before_running() {
    let h = harness();
    let config = InvokerConfig::new(h.dir.path().join("absent"), "python");
    let invoker = ComputationInvoker::new(
        h.fake.clone(),
        Broadcaster::new(),
        Arc::new(MemoryStore::new()),
        config,
    );

    let err = invoker
        .invoke(&request(), &CallerRole::new("public"))
        .await
        .unwrap_err();

    assert!(matches!(err, InvocationError::WriteInput { .. }));
    assert!(h.fake.calls().is_empty());
}
