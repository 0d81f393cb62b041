// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot route computations
//!
//! A request is written to the input artifact in the script root, the route
//! worker runs to completion, and its JSON result is recovered from stdout
//! or, failing that, from the result artifact it leaves behind.

use crate::broadcast::Broadcaster;
use crate::error::InvocationError;
use crate::resolve::{resolve, Resolution};
use cw_adapters::{ProcessAdapter, ProcessSpec};
use cw_core::{BroadcastMessage, CallerRole, ComputationRequest, ComputationResult};
use cw_storage::{RecordStore, EMERGENCY_ROUTES};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// How the route worker is run and where its artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerConfig {
    pub script_root: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    /// Input artifact, relative to `script_root`
    pub input_artifact: PathBuf,
    /// Fallback result artifact, relative to `script_root`
    pub result_artifact: PathBuf,
}

impl InvokerConfig {
    pub fn new(script_root: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            script_root: script_root.into(),
            program: program.into(),
            args: Vec::new(),
            input_artifact: PathBuf::from("routeSignal.csv"),
            result_artifact: PathBuf::from("fastest_route.json"),
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

    pub fn artifacts(mut self, input: impl Into<PathBuf>, result: impl Into<PathBuf>) -> Self {
        self.input_artifact = input.into();
        self.result_artifact = result.into();
        self
    }

    pub fn input_path(&self) -> PathBuf {
        self.script_root.join(&self.input_artifact)
    }

    pub fn result_path(&self) -> PathBuf {
        self.script_root.join(&self.result_artifact)
    }

    /// Result recovery order: stdout first, then the result artifact
    pub fn strategies(&self) -> Vec<Resolution> {
        vec![Resolution::Stdout, Resolution::Artifact(self.result_path())]
    }

    fn process_spec(&self) -> ProcessSpec {
        ProcessSpec::new(self.program.clone(), self.script_root.clone()).args(self.args.clone())
    }
}

/// Runs route computations one at a time
pub struct ComputationInvoker<P: ProcessAdapter> {
    adapter: P,
    broadcaster: Broadcaster,
    store: Arc<dyn RecordStore>,
    config: InvokerConfig,
    /// Artifacts are fixed paths, so runs must not overlap
    serial: Mutex<()>,
}

impl<P: ProcessAdapter> ComputationInvoker<P> {
    pub fn new(
        adapter: P,
        broadcaster: Broadcaster,
        store: Arc<dyn RecordStore>,
        config: InvokerConfig,
    ) -> Self {
        Self {
            adapter,
            broadcaster,
            store,
            config,
            serial: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Run one computation.
    ///
    /// On success the result is published as a `route_update`, and requests
    /// from emergency callers are appended to the emergency route history.
    /// On failure nothing is published or recorded.
    pub async fn invoke(
        &self,
        request: &ComputationRequest,
        role: &CallerRole,
    ) -> Result<ComputationResult, InvocationError> {
        let _serial = self.serial.lock().await;
        tracing::info!(routes = request.routes.len(), role = %role, "route computation requested");

        let input = self.config.input_path();
        tokio::fs::write(&input, request.to_input_artifact())
            .await
            .map_err(|source| InvocationError::WriteInput {
                path: input.clone(),
                source,
            })?;

        // A result artifact left by an earlier run must not be mistaken for this one
        let result_path = self.config.result_path();
        match tokio::fs::remove_file(&result_path).await {
            Ok(()) => tracing::debug!(path = %result_path.display(), "removed stale result artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %result_path.display(),
                error = %e,
                "could not remove stale result artifact"
            ),
        }

        let output = self.adapter.run(&self.config.process_spec()).await?;
        if !output.success() {
            tracing::warn!(code = ?output.code, "route worker failed");
            return Err(InvocationError::NonZeroExit {
                code: output.code,
                stderr: output.stderr,
            });
        }

        let strategies = self.config.strategies();
        let (result, source) = match resolve(&output.stdout, &strategies).await {
            Ok(resolved) => resolved,
            Err(attempts) => {
                tracing::warn!(attempts = attempts.len(), "route worker result unresolved");
                return Err(InvocationError::Unresolved {
                    attempts,
                    stderr: output.stderr,
                });
            }
        };

        let computed = ComputationResult {
            result,
            stderr: output.stderr,
            source,
        };
        tracing::info!(source = ?computed.source, "route computation finished");

        self.broadcaster.publish(&BroadcastMessage::RouteUpdate {
            data: computed.result.clone(),
        });
        if role.is_emergency() {
            self.record_emergency(request, role, &computed);
        }

        Ok(computed)
    }

    fn record_emergency(
        &self,
        request: &ComputationRequest,
        role: &CallerRole,
        computed: &ComputationResult,
    ) {
        let record = json!({
            "role": role.as_str(),
            "routes": request.routes,
            "result": computed.result,
            "source": computed.source,
        });
        match self.store.append(EMERGENCY_ROUTES, record) {
            Ok(stored) => tracing::info!(seq = stored.seq, "emergency route recorded"),
            // History is best effort; the caller still gets its result
            Err(e) => tracing::error!(error = %e, "failed to record emergency route"),
        }
    }
}

#[cfg(test)]
#[path = "invoker_tests.rs"]
mod tests;
