// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incident detection on a still image from a location

use crate::broadcast::Broadcaster;
use crate::error::DetectionError;
use cw_adapters::{ProcessAdapter, ProcessSpec};
use cw_core::{interpolate, BroadcastMessage};
use cw_storage::{RecordStore, INCIDENTS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    pub script_root: PathBuf,
    pub program: String,
    /// Argument templates; `{image}` and `{id}` expand per request
    pub args: Vec<String>,
}

impl DetectorConfig {
    pub fn new(script_root: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            script_root: script_root.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn process_spec(&self, signal_id: &str, image: &str) -> ProcessSpec {
        let vars = [("image", image), ("id", signal_id)];
        ProcessSpec::new(self.program.clone(), self.script_root.clone())
            .args(self.args.iter().map(|arg| interpolate(arg, &vars)))
    }
}

/// Verdict of one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub signal_id: String,
    pub image: String,
    pub accident: bool,
    /// Detector-specific detail, e.g. the reason and vehicle counts
    pub info: Value,
}

#[derive(Deserialize)]
struct DetectorOutput {
    accident: bool,
    #[serde(default)]
    info: Value,
}

#[derive(Deserialize)]
struct DetectorFailure {
    error: String,
}

pub struct IncidentDetector<P: ProcessAdapter> {
    adapter: P,
    broadcaster: Broadcaster,
    store: Arc<dyn RecordStore>,
    config: DetectorConfig,
}

impl<P: ProcessAdapter> IncidentDetector<P> {
    pub fn new(
        adapter: P,
        broadcaster: Broadcaster,
        store: Arc<dyn RecordStore>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            adapter,
            broadcaster,
            store,
            config,
        }
    }

    /// Run the detector on `image` for the location `signal_id`.
    ///
    /// A detected accident is published as an `incident_alert` and recorded;
    /// a clean image produces a report and nothing else.
    pub async fn detect(&self, signal_id: &str, image: &str) -> Result<IncidentReport, DetectionError> {
        let output = self
            .adapter
            .run(&self.config.process_spec(signal_id, image))
            .await?;

        if !output.success() {
            let message = serde_json::from_str::<DetectorFailure>(output.stdout.trim())
                .map(|f| f.error)
                .unwrap_or_else(|_| {
                    let stderr = output.stderr.trim();
                    if stderr.is_empty() {
                        output.stdout.trim().to_string()
                    } else {
                        stderr.to_string()
                    }
                });
            tracing::warn!(signal_id, code = ?output.code, %message, "incident detector failed");
            return Err(DetectionError::Failed {
                code: output.code,
                message,
            });
        }

        let parsed: DetectorOutput =
            serde_json::from_str(output.stdout.trim()).map_err(DetectionError::MalformedReport)?;
        let report = IncidentReport {
            signal_id: signal_id.to_string(),
            image: image.to_string(),
            accident: parsed.accident,
            info: parsed.info,
        };

        if report.accident {
            tracing::warn!(signal_id, info = %report.info, "incident detected");
            self.broadcaster.publish(&BroadcastMessage::IncidentAlert {
                signal_id: report.signal_id.clone(),
                data: json!({
                    "accident": true,
                    "image": report.image,
                    "info": report.info,
                }),
            });
            let record = json!({
                "signal_id": report.signal_id,
                "image": report.image,
                "info": report.info,
            });
            if let Err(e) = self.store.append(INCIDENTS, record) {
                tracing::error!(signal_id, error = %e, "failed to record incident");
            }
        } else {
            tracing::info!(signal_id, "no incident detected");
        }

        Ok(report)
    }
}

#[cfg(test)]
#[path = "incident_tests.rs"]
mod tests;
