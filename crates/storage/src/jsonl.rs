// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-lines file per collection

use crate::{validate_collection, RecordStore, StoreError, StoredRecord};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Stores each collection as `<dir>/<collection>.jsonl`
pub struct JsonlStore {
    dir: PathBuf,
    /// Last sequence number per collection, loaded lazily
    sequences: Mutex<HashMap<String, u64>>,
}

impl JsonlStore {
    /// Open or create a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            sequences: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", collection))
    }

    fn count_lines(path: &Path) -> Result<u64, StoreError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl std::fmt::Debug for JsonlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlStore").field("dir", &self.dir).finish()
    }
}

impl RecordStore for JsonlStore {
    fn append(&self, collection: &str, record: Value) -> Result<StoredRecord, StoreError> {
        validate_collection(collection)?;
        let path = self.path_for(collection);

        // Held across the write so concurrent appends get distinct sequence numbers
        let mut sequences = self.sequences.lock().unwrap_or_else(|e| e.into_inner());
        let last = match sequences.get(collection) {
            Some(seq) => *seq,
            None => Self::count_lines(&path)?,
        };

        let stored = StoredRecord {
            seq: last + 1,
            recorded_at: Utc::now(),
            record,
        };
        let line = serde_json::to_string(&stored)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", line)?;
        file.sync_all()?;

        sequences.insert(collection.to_string(), stored.seq);
        Ok(stored)
    }

    fn read_all(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError> {
        validate_collection(collection)?;
        let file = match File::open(self.path_for(collection)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
