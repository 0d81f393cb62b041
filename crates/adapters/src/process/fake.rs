// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LineStream, ProcessAdapter, ProcessError, ProcessOutput, ProcessSpec};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

/// Recorded process call
#[derive(Debug, Clone)]
pub enum ProcessCall {
    SpawnStreaming { spec: ProcessSpec, pid: u32 },
    Run { spec: ProcessSpec },
    Kill { pid: u32 },
}

/// Scripted behaviour of one streaming process
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    pub lines: Vec<String>,
    pub exit_code: Option<i32>,
    /// Keep running after the last line until killed
    pub hold_open: bool,
    /// With `hold_open`, close stdout after the last line but keep running
    pub close_stdout: bool,
    pub spawn_error: Option<String>,
}

impl StreamScript {
    /// Emit the given lines, then exit with code 0
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn exit_with(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Close stdout after the last line and run until killed
    pub fn close_stdout(mut self) -> Self {
        self.hold_open = true;
        self.close_stdout = true;
        self
    }

    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            spawn_error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Scripted behaviour of one run-to-completion process
#[derive(Debug, Clone, Default)]
pub struct RunScript {
    pub output: ProcessOutput,
    /// Files written into the working directory before the process "exits"
    pub files: Vec<(PathBuf, String)>,
    pub spawn_error: Option<String>,
}

impl RunScript {
    pub fn exit(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            output: ProcessOutput {
                code: Some(code),
                stdout: stdout.into(),
                stderr: stderr.into(),
            },
            ..Self::default()
        }
    }

    pub fn writes(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            spawn_error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct LiveCounts {
    live: HashMap<String, usize>,
    peak: HashMap<String, usize>,
}

/// Fake process adapter for testing
///
/// Streaming scripts are matched by substring against the spawned command
/// line; an unmatched spawn behaves like a silent worker that runs until
/// killed. Run scripts are consumed in order.
#[derive(Clone, Default)]
pub struct FakeProcessAdapter {
    streams: Arc<Mutex<Vec<(String, StreamScript)>>>,
    runs: Arc<Mutex<VecDeque<RunScript>>>,
    calls: Arc<Mutex<Vec<ProcessCall>>>,
    counts: Arc<Mutex<LiveCounts>>,
    next_pid: Arc<AtomicU32>,
}

impl FakeProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next spawn whose command line contains `matcher`
    pub fn push_stream(&self, matcher: impl Into<String>, script: StreamScript) {
        self.streams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((matcher.into(), script));
    }

    /// Queue a script for the next `run`
    pub fn push_run(&self, script: RunScript) {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(script);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ProcessCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of streaming spawns whose command line contains `matcher`
    pub fn spawn_count(&self, matcher: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(c, ProcessCall::SpawnStreaming { spec, .. }
                    if spec.command_line().contains(matcher))
            })
            .count()
    }

    /// Number of kill requests observed
    pub fn kill_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProcessCall::Kill { .. }))
            .count()
    }

    /// Streaming processes currently alive for this exact command line
    pub fn live_count(&self, command_line: &str) -> usize {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.live.get(command_line).copied().unwrap_or(0)
    }

    /// Highest number of simultaneously alive processes for this command line
    pub fn peak_live(&self, command_line: &str) -> usize {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.peak.get(command_line).copied().unwrap_or(0)
    }

    fn record(&self, call: ProcessCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn take_stream_script(&self, command_line: &str) -> Option<StreamScript> {
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        let idx = streams
            .iter()
            .position(|(matcher, _)| command_line.contains(matcher.as_str()))?;
        Some(streams.remove(idx).1)
    }

    fn mark_started(&self, command_line: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let live = counts.live.entry(command_line.to_string()).or_insert(0);
        *live += 1;
        let now = *live;
        let peak = counts.peak.entry(command_line.to_string()).or_insert(0);
        *peak = (*peak).max(now);
    }

    fn mark_exited(&self, command_line: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(live) = counts.live.get_mut(command_line) {
            *live = live.saturating_sub(1);
        }
    }
}

#[async_trait]
impl ProcessAdapter for FakeProcessAdapter {
    async fn spawn_streaming(&self, spec: &ProcessSpec) -> Result<LineStream, ProcessError> {
        let command_line = spec.command_line();
        let script = self
            .take_stream_script(&command_line)
            .unwrap_or_else(|| StreamScript::default().hold_open());

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(ProcessCall::SpawnStreaming {
            spec: spec.clone(),
            pid,
        });

        if let Some(message) = script.spawn_error {
            return Err(ProcessError::SpawnFailed {
                program: spec.program.clone(),
                message,
            });
        }

        self.mark_started(&command_line);

        let (line_tx, line_rx) = mpsc::channel(script.lines.len().max(1));
        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        let adapter = self.clone();
        tokio::spawn(async move {
            for line in script.lines {
                if line_tx.send(line).await.is_err() {
                    break;
                }
            }

            let line_tx = if script.close_stdout {
                drop(line_tx);
                None
            } else {
                Some(line_tx)
            };

            let code = if script.hold_open {
                // Explicit kill or a dropped stream both end the process
                let _ = kill_rx.await;
                adapter.record(ProcessCall::Kill { pid });
                None
            } else {
                script.exit_code
            };

            drop(line_tx);
            adapter.mark_exited(&command_line);
            let _ = exit_tx.send(code);
        });

        Ok(LineStream::new(Some(pid), line_rx, exit_rx, kill_tx))
    }

    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        self.record(ProcessCall::Run { spec: spec.clone() });

        let script = self
            .runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| RunScript::exit(0, "", ""));

        if let Some(message) = script.spawn_error {
            return Err(ProcessError::SpawnFailed {
                program: spec.program.clone(),
                message,
            });
        }

        for (path, contents) in &script.files {
            std::fs::write(spec.cwd.join(path), contents)?;
        }

        Ok(script.output)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
