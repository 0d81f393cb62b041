// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages fanned out to live subscribers
//!
//! Every message serializes to the envelope
//! `{ "type": ..., "signal_id"?: ..., "data"?: ..., "signals"?: [...] }`.

use crate::location::LocationDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A message published through the broadcaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
    /// Registry snapshot sent to a subscriber when it connects
    InitialSignals { signals: Vec<LocationDescriptor> },
    /// One record emitted by a supervised signal worker
    SignalUpdate { signal_id: String, data: Value },
    /// Result of a route computation
    RouteUpdate { data: Value },
    /// Incident detected at a location
    IncidentAlert { signal_id: String, data: Value },
    /// Alert raised by an operator or another collaborator
    NewAlert {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal_id: Option<String>,
        data: Value,
    },
    /// Previously raised alert was cleared
    AlertCleared {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal_id: Option<String>,
        data: Value,
    },
}

impl BroadcastMessage {
    /// Wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            BroadcastMessage::InitialSignals { .. } => "initial_signals",
            BroadcastMessage::SignalUpdate { .. } => "signal_update",
            BroadcastMessage::RouteUpdate { .. } => "route_update",
            BroadcastMessage::IncidentAlert { .. } => "incident_alert",
            BroadcastMessage::NewAlert { .. } => "new_alert",
            BroadcastMessage::AlertCleared { .. } => "alert_cleared",
        }
    }

    /// Location this message concerns, if any
    pub fn signal_id(&self) -> Option<&str> {
        match self {
            BroadcastMessage::SignalUpdate { signal_id, .. }
            | BroadcastMessage::IncidentAlert { signal_id, .. } => Some(signal_id),
            BroadcastMessage::NewAlert { signal_id, .. }
            | BroadcastMessage::AlertCleared { signal_id, .. } => signal_id.as_deref(),
            BroadcastMessage::InitialSignals { .. } | BroadcastMessage::RouteUpdate { .. } => None,
        }
    }

    /// Serialize into an immutable frame ready for delivery
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        let text = serde_json::to_string(self)?;
        Ok(Frame {
            kind: self.kind(),
            text: Arc::from(text),
        })
    }
}

/// A fully serialized message.
///
/// Frames are built before fan-out begins and shared between subscribers,
/// so every subscriber sees the same complete payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: &'static str,
    text: Arc<str>,
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
