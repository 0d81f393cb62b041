// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use crate::resolve::ResolutionFailure;
use cw_adapters::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from starting supervised workers
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("location {location_id} has no resource directory at {}", path.display())]
    MissingResource { location_id: String, path: PathBuf },
}

/// Errors from one-shot route computations
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("failed to write input artifact {}: {source}", path.display())]
    WriteInput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("route worker could not run: {0}")]
    Process(#[from] ProcessError),
    #[error("route worker exited with {}: {stderr}", exit_label(*code))]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("route worker produced no usable result ({})", describe(attempts))]
    Unresolved {
        attempts: Vec<ResolutionFailure>,
        stderr: String,
    },
}

impl InvocationError {
    /// Worker stderr captured alongside the failure, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            InvocationError::NonZeroExit { stderr, .. }
            | InvocationError::Unresolved { stderr, .. } => Some(stderr),
            InvocationError::WriteInput { .. } | InvocationError::Process(_) => None,
        }
    }
}

/// Errors from incident detection runs
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("incident detector could not run: {0}")]
    Process(#[from] ProcessError),
    #[error("incident detector failed with {}: {message}", exit_label(*code))]
    Failed { code: Option<i32>, message: String },
    #[error("incident detector output is not a report: {0}")]
    MalformedReport(#[source] serde_json::Error),
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

fn describe(attempts: &[ResolutionFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
