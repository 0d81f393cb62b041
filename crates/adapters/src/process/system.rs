// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS process adapter backed by `tokio::process`

use super::{LineStream, ProcessAdapter, ProcessError, ProcessOutput, ProcessSpec};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

/// Lines buffered between the stdout reader and the consumer
const LINE_BUFFER: usize = 256;

/// Launches real child processes
#[derive(Clone, Default)]
pub struct SystemProcessAdapter;

impl SystemProcessAdapter {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &ProcessSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(spec: &ProcessSpec, e: std::io::Error) -> ProcessError {
        ProcessError::SpawnFailed {
            program: spec.program.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ProcessAdapter for SystemProcessAdapter {
    async fn spawn_streaming(&self, spec: &ProcessSpec) -> Result<LineStream, ProcessError> {
        let mut child = Self::command(spec)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let pid = child.id();
        let stdout = child.stdout.take().ok_or(ProcessError::MissingPipe("stdout"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(pid, stderr));
        }

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(pump(child, stdout, line_tx, exit_tx, kill_rx));

        Ok(LineStream::new(pid, line_rx, exit_rx, kill_tx))
    }

    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        let mut child = Self::command(spec)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        // The worker reads its input from disk; close stdin straight away
        drop(child.stdin.take());

        let output = child.wait_with_output().await?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Forward stdout lines until EOF or a kill request, then report the exit code
async fn pump<R>(
    mut child: Child,
    stdout: R,
    lines: mpsc::Sender<String>,
    exit: oneshot::Sender<Option<i32>>,
    mut kill: oneshot::Receiver<()>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut killed = false;

    loop {
        buf.clear();
        tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => break,
                Ok(_) => {
                    // Invalid UTF-8 is replaced rather than ending the stream
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    // A full queue must not hide a kill request
                    tokio::select! {
                        sent = lines.send(line) => if sent.is_err() {
                            killed = true;
                            break;
                        },
                        _ = &mut kill => {
                            killed = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(pid = ?child.id(), error = %e, "stdout read failed");
                    break;
                }
            },
            // Fires on an explicit kill and when the stream is dropped
            _ = &mut kill => {
                killed = true;
                break;
            }
        }
    }

    if !killed {
        // stdout closed; the process may still be running
        tokio::select! {
            _ = child.wait() => {}
            _ = &mut kill => killed = true,
        }
    }

    if killed {
        if let Err(e) = child.start_kill() {
            tracing::debug!(error = %e, "kill failed (process may have exited)");
        }
    }

    let code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to reap process");
            None
        }
    };
    let _ = exit.send(code);
}

async fn log_stderr<R>(pid: Option<u32>, stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(pid = ?pid, stderr = %line, "worker stderr");
    }
}

#[cfg(all(test, unix))]
#[path = "system_tests.rs"]
mod tests;
