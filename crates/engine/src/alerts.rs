// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator alerts: raised and cleared, recorded and fanned out

use crate::broadcast::Broadcaster;
use cw_core::BroadcastMessage;
use cw_storage::{RecordStore, StoreError, ALERTS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// An alert that has been raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
    pub data: Value,
}

/// Entries in the alerts collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum AlertEntry {
    Raised(Alert),
    Cleared { id: String },
}

#[derive(Clone)]
pub struct AlertBoard {
    broadcaster: Broadcaster,
    store: Arc<dyn RecordStore>,
}

impl AlertBoard {
    pub fn new(broadcaster: Broadcaster, store: Arc<dyn RecordStore>) -> Self {
        Self { broadcaster, store }
    }

    /// Record a new alert and publish it as `new_alert`
    pub fn raise(&self, signal_id: Option<String>, data: Value) -> Result<Alert, StoreError> {
        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            signal_id,
            data,
        };
        self.store
            .append(ALERTS, serde_json::to_value(AlertEntry::Raised(alert.clone()))?)?;

        tracing::info!(alert_id = %alert.id, signal_id = ?alert.signal_id, "alert raised");
        self.broadcaster.publish(&BroadcastMessage::NewAlert {
            signal_id: alert.signal_id.clone(),
            data: json!({ "id": alert.id, "details": alert.data }),
        });
        Ok(alert)
    }

    /// Clear an active alert and publish `alert_cleared`.
    ///
    /// Returns `None` when no active alert has this id.
    pub fn clear(&self, id: &str) -> Result<Option<Alert>, StoreError> {
        let Some(alert) = self.active()?.into_iter().find(|a| a.id == id) else {
            return Ok(None);
        };

        let entry = AlertEntry::Cleared {
            id: alert.id.clone(),
        };
        self.store.append(ALERTS, serde_json::to_value(entry)?)?;

        tracing::info!(alert_id = %alert.id, "alert cleared");
        self.broadcaster.publish(&BroadcastMessage::AlertCleared {
            signal_id: alert.signal_id.clone(),
            data: json!({ "id": alert.id }),
        });
        Ok(Some(alert))
    }

    /// Alerts raised and not yet cleared, oldest first
    pub fn active(&self) -> Result<Vec<Alert>, StoreError> {
        let mut active: Vec<Alert> = Vec::new();
        for stored in self.store.read_all(ALERTS)? {
            match serde_json::from_value::<AlertEntry>(stored.record) {
                Ok(AlertEntry::Raised(alert)) => active.push(alert),
                Ok(AlertEntry::Cleared { id }) => active.retain(|a| a.id != id),
                Err(e) => tracing::warn!(seq = stored.seq, error = %e, "skipping unreadable alert entry"),
            }
        }
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_storage::MemoryStore;
    use tokio::sync::mpsc;

    fn board() -> (AlertBoard, MemoryStore, mpsc::UnboundedReceiver<Arc<str>>) {
        let store = MemoryStore::new();
        let broadcaster = Broadcaster::new();
        let (tx, rx) = mpsc::unbounded_channel();
        broadcaster.subscribe(tx);
        (
            AlertBoard::new(broadcaster, Arc::new(store.clone())),
            store,
            rx,
        )
    }

    fn next(rx: &mut mpsc::UnboundedReceiver<Arc<str>>) -> Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn raise_records_and_publishes() {
        let (board, store, mut rx) = board();

        let alert = board
            .raise(Some("3".into()), json!({ "text": "road closed" }))
            .unwrap();

        let frame = next(&mut rx);
        assert_eq!(frame["type"], "new_alert");
        assert_eq!(frame["signal_id"], "3");
        assert_eq!(frame["data"]["id"], alert.id.as_str());
        assert_eq!(frame["data"]["details"]["text"], "road closed");
        assert_eq!(store.read_all(ALERTS).unwrap()[0].record["action"], "raised");
        assert_eq!(board.active().unwrap(), vec![alert]);
    }

    #[test]
    fn clear_removes_from_active() {
        let (board, store, mut rx) = board();
        let kept = board.raise(None, json!("fog")).unwrap();
        let gone = board.raise(Some("1".into()), json!("crash")).unwrap();
        let _ = next(&mut rx);
        let _ = next(&mut rx);

        let cleared = board.clear(&gone.id).unwrap();

        assert_eq!(cleared, Some(gone));
        let frame = next(&mut rx);
        assert_eq!(frame["type"], "alert_cleared");
        assert_eq!(frame["signal_id"], "1");
        assert_eq!(board.active().unwrap(), vec![kept]);
        assert_eq!(store.read_all(ALERTS).unwrap().len(), 3);
    }

    #[test]
    fn clearing_unknown_alert_is_none() {
        let (board, store, mut rx) = board();
        assert_eq!(board.clear("missing").unwrap(), None);
        assert!(rx.try_recv().is_err());
        assert!(store.read_all(ALERTS).unwrap().is_empty());
    }
}
