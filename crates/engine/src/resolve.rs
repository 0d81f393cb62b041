// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered strategies for recovering a worker's JSON result

use cw_core::ResultSource;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// One place a result may be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The whole of stdout is one JSON value
    Stdout,
    /// A JSON file the worker leaves behind
    Artifact(PathBuf),
}

impl Resolution {
    pub fn source(&self) -> ResultSource {
        match self {
            Resolution::Stdout => ResultSource::Stdout,
            Resolution::Artifact(_) => ResultSource::ResultArtifact,
        }
    }

    async fn attempt(&self, stdout: &str) -> Result<Value, String> {
        match self {
            Resolution::Stdout => {
                let text = stdout.trim();
                if text.is_empty() {
                    return Err("stdout is empty".to_string());
                }
                serde_json::from_str(text).map_err(|e| e.to_string())
            }
            Resolution::Artifact(path) => read_artifact(path).await,
        }
    }
}

async fn read_artifact(path: &Path) -> Result<Value, String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("{} is not JSON: {}", path.display(), e))
}

/// Why one strategy did not yield a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub source: ResultSource,
    pub message: String,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.source {
            ResultSource::Stdout => "stdout",
            ResultSource::ResultArtifact => "result artifact",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

/// Try each strategy in order; the first that parses wins.
///
/// On failure every attempt is reported, in order.
pub async fn resolve(
    stdout: &str,
    strategies: &[Resolution],
) -> Result<(Value, ResultSource), Vec<ResolutionFailure>> {
    let mut failures = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        match strategy.attempt(stdout).await {
            Ok(value) => return Ok((value, strategy.source())),
            Err(message) => failures.push(ResolutionFailure {
                source: strategy.source(),
                message,
            }),
        }
    }
    Err(failures)
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
