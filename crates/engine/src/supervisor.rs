// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision of one long-running worker process per location
//!
//! Each worker is driven by its own task that feeds the pure
//! [`WorkerLifecycle`] machine and carries out the actions it returns.
//! Every stdout line a worker prints is parsed as JSON and published as a
//! `signal_update` for its location.

use crate::broadcast::Broadcaster;
use crate::error::SupervisorError;
use cw_adapters::{LineStream, ProcessAdapter, ProcessSpec};
use cw_core::{
    interpolate, BroadcastMessage, LocationDescriptor, RestartPolicy, WorkerAction, WorkerEvent,
    WorkerLifecycle, WorkerPhase,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Longest slice of a malformed line echoed into the log
const MAX_LOGGED_LINE: usize = 200;

/// How workers are launched
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Working directory of every worker
    pub script_root: PathBuf,
    pub program: String,
    /// Argument templates; `{id}` and `{name}` expand per location
    pub args: Vec<String>,
    /// Directory, relative to `script_root`, that must exist before a
    /// location's worker is started
    pub resource_dir: Option<String>,
    pub restart: RestartPolicy,
}

impl WorkerConfig {
    pub fn new(script_root: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            script_root: script_root.into(),
            program: program.into(),
            args: Vec::new(),
            resource_dir: None,
            restart: RestartPolicy::default(),
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

    pub fn resource_dir(mut self, template: impl Into<String>) -> Self {
        self.resource_dir = Some(template.into());
        self
    }

    pub fn restart(mut self, policy: RestartPolicy) -> Self {
        self.restart = policy;
        self
    }

    /// Resource directory required for `location`, if one is configured
    pub fn resource_path(&self, location: &LocationDescriptor) -> Option<PathBuf> {
        let vars = template_vars(location);
        self.resource_dir
            .as_ref()
            .map(|template| self.script_root.join(interpolate(template, &vars)))
    }

    /// Process that serves `location`
    pub fn process_spec(&self, location: &LocationDescriptor) -> ProcessSpec {
        let vars = template_vars(location);
        ProcessSpec::new(self.program.clone(), self.script_root.clone())
            .args(self.args.iter().map(|arg| interpolate(arg, &vars)))
    }
}

fn template_vars(location: &LocationDescriptor) -> [(&str, &str); 2] {
    [("id", location.id.as_str()), ("name", location.name.as_str())]
}

/// A supervised worker owned by the [`WorkerSupervisor`]
pub struct WorkerHandle {
    location: LocationDescriptor,
    lifecycle: Arc<Mutex<WorkerLifecycle>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn location_id(&self) -> &str {
        &self.location.id
    }

    pub fn location(&self) -> &LocationDescriptor {
        &self.location
    }

    /// Snapshot of the worker's lifecycle
    pub fn lifecycle(&self) -> WorkerLifecycle {
        self.lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The driver task has ended and will not start another process
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the driver, wait for its process to be gone, and return the
    /// final lifecycle
    async fn stop(self) -> WorkerLifecycle {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(location_id = %self.location.id, error = %e, "worker driver failed");
        }
        self.lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("location_id", &self.location.id)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

/// Keeps exactly one worker process alive per supervised location
pub struct WorkerSupervisor<P: ProcessAdapter> {
    adapter: P,
    broadcaster: Broadcaster,
    config: WorkerConfig,
    workers: HashMap<String, WorkerHandle>,
}

impl<P: ProcessAdapter> WorkerSupervisor<P> {
    pub fn new(adapter: P, broadcaster: Broadcaster, config: WorkerConfig) -> Self {
        Self {
            adapter,
            broadcaster,
            config,
            workers: HashMap::new(),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Start supervising a worker for `location`.
    ///
    /// A location whose resource directory is missing is refused and nothing
    /// is spawned. Supervising an id that already has a worker replaces it:
    /// the old process is terminated before the new one starts.
    pub async fn supervise(
        &mut self,
        location: LocationDescriptor,
    ) -> Result<&WorkerHandle, SupervisorError> {
        if let Some(path) = self.config.resource_path(&location) {
            if !path.is_dir() {
                return Err(SupervisorError::MissingResource {
                    location_id: location.id.clone(),
                    path,
                });
            }
        }

        if let Some(previous) = self.workers.remove(&location.id) {
            tracing::info!(location_id = %location.id, "replacing existing worker");
            previous.stop().await;
        }

        let lifecycle = Arc::new(Mutex::new(WorkerLifecycle::new(
            location.id.clone(),
            self.config.restart,
        )));
        let cancel = CancellationToken::new();
        let driver = Driver {
            adapter: self.adapter.clone(),
            spec: self.config.process_spec(&location),
            location_id: location.id.clone(),
            broadcaster: self.broadcaster.clone(),
            lifecycle: Arc::clone(&lifecycle),
            cancel: cancel.clone(),
        };
        let span = tracing::info_span!("worker", location_id = %location.id);
        let task = tokio::spawn(driver.run().instrument(span));

        let id = location.id.clone();
        let handle = WorkerHandle {
            location,
            lifecycle,
            cancel,
            task,
        };
        Ok(self.workers.entry(id).or_insert(handle))
    }

    /// Supervise every location that has its resources, skipping the rest.
    ///
    /// Returns the number of workers started.
    pub async fn supervise_all(&mut self, locations: Vec<LocationDescriptor>) -> usize {
        let mut started = 0;
        for location in locations {
            match self.supervise(location).await {
                Ok(_) => started += 1,
                Err(e) => tracing::warn!(error = %e, "skipping location"),
            }
        }
        tracing::info!(started, "workers supervised");
        started
    }

    /// Stop the worker for `location_id` and wait for its process to end.
    ///
    /// Returns the final lifecycle, or `None` if nothing was supervised there.
    pub async fn shutdown(&mut self, location_id: &str) -> Option<WorkerLifecycle> {
        let handle = self.workers.remove(location_id)?;
        Some(handle.stop().await)
    }

    /// Stop every worker
    pub async fn shutdown_all(&mut self) {
        let handles: Vec<WorkerHandle> = self.workers.drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in &handles {
            handle.cancel.cancel();
        }
        for handle in handles {
            handle.stop().await;
        }
        tracing::info!(count, "all workers stopped");
    }

    pub fn handle(&self, location_id: &str) -> Option<&WorkerHandle> {
        self.workers.get(location_id)
    }

    pub fn status(&self, location_id: &str) -> Option<WorkerLifecycle> {
        self.workers.get(location_id).map(WorkerHandle::lifecycle)
    }

    /// Lifecycle of every supervised worker, ordered by location id
    pub fn statuses(&self) -> Vec<WorkerLifecycle> {
        let mut all: Vec<_> = self.workers.values().map(WorkerHandle::lifecycle).collect();
        all.sort_by(|a, b| a.location_id.cmp(&b.location_id));
        all
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

enum StreamEnd {
    /// stdout reached end of file
    Closed,
    Cancelled,
}

/// Task-side state for one worker
struct Driver<P> {
    adapter: P,
    spec: ProcessSpec,
    location_id: String,
    broadcaster: Broadcaster,
    lifecycle: Arc<Mutex<WorkerLifecycle>>,
    cancel: CancellationToken,
}

impl<P: ProcessAdapter> Driver<P> {
    async fn run(self) {
        let mut pending = VecDeque::from([WorkerAction::Spawn]);
        let mut stream: Option<LineStream> = None;

        while let Some(action) = pending.pop_front() {
            match action {
                WorkerAction::Spawn => {
                    if self.cancel.is_cancelled() {
                        pending.extend(self.apply(WorkerEvent::Shutdown));
                        continue;
                    }
                    let event = match self.adapter.spawn_streaming(&self.spec).await {
                        Ok(spawned) => {
                            let pid = spawned.pid();
                            stream = Some(spawned);
                            WorkerEvent::Spawned { pid }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "worker failed to start");
                            WorkerEvent::SpawnFailed {
                                reason: e.to_string(),
                            }
                        }
                    };
                    pending.extend(self.apply(event));
                }
                WorkerAction::ScheduleRestart { after } => {
                    let event = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => WorkerEvent::Shutdown,
                        _ = tokio::time::sleep(after) => WorkerEvent::CooldownElapsed,
                    };
                    pending.extend(self.apply(event));
                }
                WorkerAction::Kill => {
                    if let Some(mut running) = stream.take() {
                        running.kill();
                        let code = running.wait().await;
                        tracing::debug!(?code, "worker process terminated");
                    }
                }
            }

            // A live stream means the lifecycle is Running
            if let Some(running) = stream.as_mut() {
                let event = match self.forward_output(running).await {
                    StreamEnd::Cancelled => WorkerEvent::Shutdown,
                    StreamEnd::Closed => self.await_exit(running).await,
                };
                // On shutdown the stream stays put for the Kill action to reap
                if matches!(event, WorkerEvent::Exited { .. }) {
                    stream = None;
                }
                pending.extend(self.apply(event));
            }
        }

        tracing::debug!("worker driver finished");
    }

    /// Publish each stdout line until the stream closes or shutdown is requested
    async fn forward_output(&self, stream: &mut LineStream) -> StreamEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamEnd::Cancelled,
                line = stream.next_line() => match line {
                    Some(line) => self.publish_line(&line),
                    None => return StreamEnd::Closed,
                },
            }
        }
    }

    async fn await_exit(&self, stream: &mut LineStream) -> WorkerEvent {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => WorkerEvent::Shutdown,
            code = stream.wait() => WorkerEvent::Exited { code },
        }
    }

    fn publish_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(data) => {
                self.broadcaster.publish(&BroadcastMessage::SignalUpdate {
                    signal_id: self.location_id.clone(),
                    data,
                });
            }
            Err(e) => tracing::warn!(
                error = %e,
                line = %truncate(line, MAX_LOGGED_LINE),
                "discarding malformed worker output"
            ),
        }
    }

    /// Feed one event through the lifecycle and return the resulting actions
    fn apply(&self, event: WorkerEvent) -> Vec<WorkerAction> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        let (next, actions) = lifecycle.transition(event);

        if next.phase != lifecycle.phase {
            match next.phase {
                WorkerPhase::Starting => {
                    tracing::info!(restarts = next.restarts, "restarting worker")
                }
                WorkerPhase::Running { pid } => {
                    tracing::info!(?pid, command = %self.spec.command_line(), "worker running")
                }
                WorkerPhase::Exited { code } => tracing::warn!(
                    ?code,
                    cooldown_ms = next.policy().cooldown.as_millis() as u64,
                    "worker exited, restart scheduled"
                ),
                WorkerPhase::GaveUp => tracing::error!(
                    restarts = next.restarts,
                    last_exit = ?next.last_exit,
                    "worker reached its restart limit, giving up"
                ),
                WorkerPhase::ShutdownRequested => tracing::info!("worker shutting down"),
            }
        }

        *lifecycle = next;
        actions
    }
}

fn truncate(line: &str, max: usize) -> &str {
    match line.char_indices().nth(max) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
