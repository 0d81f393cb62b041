// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route computation requests and results

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header row of the route worker's input artifact
pub const INPUT_ARTIFACT_HEADER: &str = "route,signal_serial_numbers,distance_time";

/// Separator between signal serial numbers within one field
pub const SIGNAL_SEPARATOR: &str = ";";

/// A candidate route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub route: String,
    pub signal_serial_numbers: Vec<String>,
    /// Free-form distance and travel time, e.g. `"4.2 km / 11 min"`
    pub distance_time: String,
}

/// An ordered set of routes to evaluate in one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationRequest {
    pub routes: Vec<RouteRecord>,
}

impl ComputationRequest {
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    /// Render the CSV input artifact: a header and one row per route.
    ///
    /// Quote characters inside fields are removed before each field is
    /// wrapped in quotes, so literal quotes in route names are lost. Line
    /// breaks are flattened to spaces to keep one route per row.
    pub fn to_input_artifact(&self) -> String {
        let mut out = String::with_capacity(64 * (self.routes.len() + 1));
        out.push_str(INPUT_ARTIFACT_HEADER);
        out.push('\n');

        for record in &self.routes {
            let signals = record.signal_serial_numbers.join(SIGNAL_SEPARATOR);
            let fields = [
                quote_field(&record.route),
                quote_field(&signals),
                quote_field(&record.distance_time),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }

        out
    }
}

fn quote_field(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '"')
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("\"{}\"", cleaned)
}

/// Where a computation result was recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Stdout,
    ResultArtifact,
}

/// Outcome of a successful one-shot invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationResult {
    /// Parsed JSON value produced by the worker
    pub result: Value,
    /// Everything the worker wrote to stderr
    pub stderr: String,
    pub source: ResultSource,
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
