// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory record store for tests and ephemeral runs

use crate::{validate_collection, RecordStore, StoreError, StoredRecord};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<String, Vec<StoredRecord>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, collection: &str, record: Value) -> Result<StoredRecord, StoreError> {
        validate_collection(collection)?;
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let records = collections.entry(collection.to_string()).or_default();
        let stored = StoredRecord {
            seq: records.len() as u64 + 1,
            recorded_at: Utc::now(),
            record,
        };
        records.push(stored.clone());
        Ok(stored)
    }

    fn read_all(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError> {
        validate_collection(collection)?;
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_collections() {
        let store = MemoryStore::new();
        let clone = store.clone();

        store.append("alerts", json!({"id": 1})).unwrap();

        assert_eq!(clone.read_all("alerts").unwrap().len(), 1);
        assert!(clone.read_all("incidents").unwrap().is_empty());
    }
}
