// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrapper for consistent observability

use crate::process::{LineStream, ProcessAdapter, ProcessError, ProcessOutput, ProcessSpec};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any ProcessAdapter
#[derive(Clone)]
pub struct TracedProcessAdapter<P> {
    inner: P,
}

impl<P> TracedProcessAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

fn check_cwd(spec: &ProcessSpec) -> Result<(), ProcessError> {
    if !spec.cwd.is_dir() {
        tracing::error!("working directory does not exist");
        return Err(ProcessError::MissingWorkingDir(spec.cwd.clone()));
    }
    Ok(())
}

#[async_trait]
impl<P: ProcessAdapter> ProcessAdapter for TracedProcessAdapter<P> {
    async fn spawn_streaming(&self, spec: &ProcessSpec) -> Result<LineStream, ProcessError> {
        let span = tracing::info_span!(
            "process.spawn",
            command = %spec.command_line(),
            cwd = %spec.cwd.display()
        );

        async {
            tracing::info!(env_count = spec.env.len(), "starting");
            check_cwd(spec)?;

            let start = std::time::Instant::now();
            let result = self.inner.spawn_streaming(spec).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(stream) => tracing::info!(
                    pid = ?stream.pid(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "process started"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "spawn failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        let span = tracing::info_span!(
            "process.run",
            command = %spec.command_line(),
            cwd = %spec.cwd.display()
        );

        async {
            tracing::info!("starting");
            check_cwd(spec)?;

            let start = std::time::Instant::now();
            let result = self.inner.run(spec).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(output) => tracing::info!(
                    code = ?output.code,
                    stdout_len = output.stdout.len(),
                    stderr_len = output.stderr.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "process finished"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "run failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
