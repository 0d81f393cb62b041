// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn signal_update_envelope() {
    let msg = BroadcastMessage::SignalUpdate {
        signal_id: "3".to_string(),
        data: json!({"state": "GREEN", "green_time": 12}),
    };

    let value: Value = serde_json::from_str(msg.to_frame().unwrap().text()).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "signal_update",
            "signal_id": "3",
            "data": {"state": "GREEN", "green_time": 12}
        })
    );
}

#[test]
fn initial_signals_envelope_lists_every_location() {
    let msg = BroadcastMessage::InitialSignals {
        signals: vec![LocationDescriptor {
            id: "1".to_string(),
            name: "MG Road".to_string(),
            latitude: 12.5,
            longitude: 77.25,
        }],
    };

    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["type"], "initial_signals");
    assert_eq!(value["signals"][0]["id"], "1");
    assert_eq!(value["signals"][0]["latitude"], 12.5);
    assert!(value.get("data").is_none());
}

#[test]
fn alert_without_location_omits_signal_id() {
    let msg = BroadcastMessage::NewAlert {
        signal_id: None,
        data: json!({"id": "a-1"}),
    };

    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value, json!({"type": "new_alert", "data": {"id": "a-1"}}));
    assert_eq!(msg.signal_id(), None);
}

#[test]
fn frame_kind_matches_type_tag() {
    let messages = vec![
        BroadcastMessage::InitialSignals { signals: vec![] },
        BroadcastMessage::SignalUpdate {
            signal_id: "1".to_string(),
            data: json!({}),
        },
        BroadcastMessage::RouteUpdate { data: json!({}) },
        BroadcastMessage::IncidentAlert {
            signal_id: "1".to_string(),
            data: json!({}),
        },
        BroadcastMessage::NewAlert {
            signal_id: Some("1".to_string()),
            data: json!({}),
        },
        BroadcastMessage::AlertCleared {
            signal_id: None,
            data: json!({}),
        },
    ];

    for msg in messages {
        let frame = msg.to_frame().unwrap();
        let value: Value = serde_json::from_str(frame.text()).unwrap();
        assert_eq!(value["type"], frame.kind());
    }
}

#[test]
fn envelope_parses_back() {
    let text = r#"{"type":"incident_alert","signal_id":"9","data":{"accident":true}}"#;
    let msg: BroadcastMessage = serde_json::from_str(text).unwrap();

    assert_eq!(msg.kind(), "incident_alert");
    assert_eq!(msg.signal_id(), Some("9"));
}
