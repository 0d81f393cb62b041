// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Append-only record collections for history, incidents and alerts

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Route requests made by emergency callers, with their results
pub const EMERGENCY_ROUTES: &str = "emergency_routes";
/// Detected incidents
pub const INCIDENTS: &str = "incidents";
/// Raised and cleared alerts
pub const ALERTS: &str = "alerts";

/// Errors that can occur in record store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),
}

/// A record as stored in a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Position within the collection, starting at 1
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    pub record: Value,
}

/// Named append-only collections of JSON records
pub trait RecordStore: Send + Sync + 'static {
    /// Append a record and return it as stored
    fn append(&self, collection: &str, record: Value) -> Result<StoredRecord, StoreError>;

    /// Every record in the collection, oldest first. Unknown collections are empty.
    fn read_all(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError>;
}

/// Collection names become file names, so keep them simple
pub(crate) fn validate_collection(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}
