// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External worker process adapters

mod system;

pub use system::SystemProcessAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProcessAdapter, ProcessCall, RunScript, StreamScript};

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },
    #[error("working directory does not exist: {0}")]
    MissingWorkingDir(PathBuf),
    #[error("process {0} pipe was not captured")]
    MissingPipe(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What to launch and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program and arguments as one display string
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a process that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Line-by-line view of a running process's stdout.
///
/// Dropping the stream terminates the process.
#[derive(Debug)]
pub struct LineStream {
    pid: Option<u32>,
    lines: mpsc::Receiver<String>,
    exit: oneshot::Receiver<Option<i32>>,
    /// Exit code once observed
    exited: Option<Option<i32>>,
    kill: Option<oneshot::Sender<()>>,
}

impl LineStream {
    /// Assemble a stream from the channels fed by a process pump task
    pub fn new(
        pid: Option<u32>,
        lines: mpsc::Receiver<String>,
        exit: oneshot::Receiver<Option<i32>>,
        kill: oneshot::Sender<()>,
    ) -> Self {
        Self {
            pid,
            lines,
            exit,
            exited: None,
            kill: Some(kill),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next stdout line without its terminator, `None` once stdout closes
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Ask the process to terminate. Idempotent.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// Unread lines are discarded; a process that keeps writing to stdout
    /// after this point is terminated. Cancel safe: dropping the future
    /// leaves the stream usable, so it can still be killed and waited on.
    pub async fn wait(&mut self) -> Option<i32> {
        if let Some(code) = self.exited {
            return code;
        }
        self.lines.close();
        let code = (&mut self.exit).await.unwrap_or(None);
        self.exited = Some(code);
        code
    }
}

/// Adapter for launching external worker processes
#[async_trait]
pub trait ProcessAdapter: Clone + Send + Sync + 'static {
    /// Launch a long-running process and stream its stdout line by line
    async fn spawn_streaming(&self, spec: &ProcessSpec) -> Result<LineStream, ProcessError>;

    /// Run a process to completion with stdin closed, capturing all output
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError>;
}
