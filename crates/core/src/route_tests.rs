// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn record(route: &str, signals: &[&str], distance_time: &str) -> RouteRecord {
    RouteRecord {
        route: route.to_string(),
        signal_serial_numbers: signals.iter().map(|s| s.to_string()).collect(),
        distance_time: distance_time.to_string(),
    }
}

#[test]
fn artifact_has_header_and_one_row_per_route() {
    let request = ComputationRequest::new(vec![
        record("Route A", &["1", "4", "7"], "4.2 km / 11 min"),
        record("Route B", &["2"], "3.0 km / 9 min"),
    ]);

    let artifact = request.to_input_artifact();
    let lines: Vec<&str> = artifact.lines().collect();

    assert_eq!(
        lines,
        vec![
            "route,signal_serial_numbers,distance_time",
            "\"Route A\",\"1;4;7\",\"4.2 km / 11 min\"",
            "\"Route B\",\"2\",\"3.0 km / 9 min\"",
        ]
    );
}

#[test]
fn embedded_quotes_are_stripped() {
    let request = ComputationRequest::new(vec![record(
        "The \"fast\" one",
        &["1\""],
        "\"2 km\" / 5 min",
    )]);

    let artifact = request.to_input_artifact();
    let row = artifact.lines().nth(1).unwrap();

    assert_eq!(row, "\"The fast one\",\"1\",\"2 km / 5 min\"");
}

#[test]
fn line_breaks_do_not_split_rows() {
    let request = ComputationRequest::new(vec![record("two\nlines", &[], "1 min")]);

    let artifact = request.to_input_artifact();

    assert_eq!(artifact.lines().count(), 2);
    assert!(artifact.contains("\"two lines\",\"\",\"1 min\""));
}

#[test]
fn empty_request_renders_header_only() {
    let artifact = ComputationRequest::default().to_input_artifact();
    assert_eq!(artifact, format!("{}\n", INPUT_ARTIFACT_HEADER));
}

#[test]
fn result_serializes_with_source_tag() {
    let result = ComputationResult {
        result: serde_json::json!({"fastest": "Route A"}),
        stderr: String::new(),
        source: ResultSource::ResultArtifact,
    };

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["source"], "result_artifact");
    assert_eq!(value["result"]["fastest"], "Route A");
}
