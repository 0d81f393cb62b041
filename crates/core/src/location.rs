// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitored locations and the registry that loads them
//!
//! A location is a signalised crossing with an id, a display name and a
//! position. The registry reads them from a CSV file whose coordinate
//! columns hold degree/minute/second text such as `12°30'45"N`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

// Separators between the degree, minute and second components
#[allow(clippy::expect_used)]
static DMS_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[°º˚'′’"″”\s]+"#).expect("constant regex pattern is valid")
});

const ID_COLUMNS: &[&str] = &["sl_no", "id", "signal_id"];
const NAME_COLUMNS: &[&str] = &["name", "signal_name"];
const LATITUDE_COLUMNS: &[&str] = &["latitude", "lat"];
const LONGITUDE_COLUMNS: &[&str] = &["longitude", "lng", "lon", "long"];

/// A monitored location. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDescriptor {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Convert degree/minute/second text into signed decimal degrees.
///
/// The text must split into at least four tokens: degrees, minutes,
/// seconds and a hemisphere letter. Anything shorter yields `0.0`.
/// `S` and `W` negate the value; any other letter leaves it positive.
/// Numeric tokens that fail to parse count as zero.
pub fn parse_coordinate(text: &str) -> f64 {
    let tokens: Vec<&str> = DMS_SEPARATORS
        .split(text.trim())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() < 4 {
        return 0.0;
    }

    let component = |t: &str| t.parse::<f64>().unwrap_or(0.0);
    let magnitude =
        component(tokens[0]) + component(tokens[1]) / 60.0 + component(tokens[2]) / 3600.0;

    match tokens[3].to_ascii_uppercase().as_str() {
        "S" | "W" => -magnitude,
        _ => magnitude,
    }
}

/// Errors that abort a registry load
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to open location source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read location header: {0}")]
    Header(#[from] csv::Error),
}

/// Loads location descriptors from a CSV source.
///
/// Every call to [`LocationRegistry::load`] re-reads the file; nothing is
/// cached between loads.
#[derive(Debug, Clone)]
pub struct LocationRegistry {
    source: PathBuf,
}

impl LocationRegistry {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Read every usable row from the source file
    pub fn load(&self) -> Result<Vec<LocationDescriptor>, RegistryError> {
        let file = std::fs::File::open(&self.source).map_err(|source| RegistryError::Open {
            path: self.source.clone(),
            source,
        })?;
        let locations = Self::from_reader(file)?;
        tracing::info!(
            source = %self.source.display(),
            count = locations.len(),
            "loaded locations"
        );
        Ok(locations)
    }

    /// Parse descriptors from any CSV reader.
    ///
    /// Rows without an id or a name are dropped. Rows the CSV parser
    /// rejects are skipped with a warning.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<LocationDescriptor>, RegistryError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let column = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.contains(&h.to_ascii_lowercase().as_str()))
        };
        let id_col = column(ID_COLUMNS);
        let name_col = column(NAME_COLUMNS);
        let lat_col = column(LATITUDE_COLUMNS);
        let lon_col = column(LONGITUDE_COLUMNS);

        let mut locations = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(row = line + 1, error = %e, "skipping unreadable location row");
                    continue;
                }
            };
            let field = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("");

            let id = field(id_col);
            let name = field(name_col);
            if id.is_empty() || name.is_empty() {
                tracing::debug!(row = line + 1, "dropping location row without id or name");
                continue;
            }

            locations.push(LocationDescriptor {
                id: id.to_string(),
                name: name.to_string(),
                latitude: parse_coordinate(field(lat_col)),
                longitude: parse_coordinate(field(lon_col)),
            });
        }

        Ok(locations)
    }
}

#[cfg(test)]
#[path = "location_tests.rs"]
mod tests;
