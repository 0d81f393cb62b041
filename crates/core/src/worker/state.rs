// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle state machine
//!
//! ```text
//! Starting ──spawned──► Running ──exited──► Exited ──cooldown──► Starting
//!     │                                        │
//!     └──spawn failed──────────────────────────┘
//!
//! any state ──shutdown──► ShutdownRequested (absorbing)
//! ```
//!
//! The machine is pure: transitions return the actions the driver must
//! perform and never touch processes or timers themselves.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default pause between a worker exiting and its restart
pub const DEFAULT_RESTART_COOLDOWN: Duration = Duration::from_secs(5);

/// How a supervised worker is restarted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Fixed delay before every restart. Never grows.
    pub cooldown: Duration,
    /// Stop restarting after this many restarts. `None` restarts forever.
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_RESTART_COOLDOWN,
            max_restarts: None,
        }
    }
}

/// Lifecycle phase of one supervised worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkerPhase {
    /// Process is being launched
    Starting,
    /// Process is alive and streaming output
    Running { pid: Option<u32> },
    /// Process ended; a restart is pending
    Exited { code: Option<i32> },
    /// Restart cap reached; no further restarts
    GaveUp,
    /// Shutdown was requested; nothing else happens
    ShutdownRequested,
}

/// Inputs that drive the lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Spawned { pid: Option<u32> },
    SpawnFailed { reason: String },
    Exited { code: Option<i32> },
    CooldownElapsed,
    Shutdown,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerAction {
    /// Launch a new process
    Spawn,
    /// Wait, then feed back [`WorkerEvent::CooldownElapsed`]
    ScheduleRestart { after: Duration },
    /// Terminate the running process
    Kill,
}

/// Lifecycle of the worker for one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerLifecycle {
    pub location_id: String,
    pub phase: WorkerPhase,
    /// Number of restarts so far
    pub restarts: u64,
    /// Exit code of the most recent process, if it reported one
    pub last_exit: Option<i32>,
    #[serde(skip)]
    policy: RestartPolicy,
}

impl WorkerLifecycle {
    /// Create a lifecycle in the `Starting` phase
    pub fn new(location_id: impl Into<String>, policy: RestartPolicy) -> Self {
        Self {
            location_id: location_id.into(),
            phase: WorkerPhase::Starting,
            restarts: 0,
            last_exit: None,
            policy,
        }
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// No further events will change this lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.phase,
            WorkerPhase::ShutdownRequested | WorkerPhase::GaveUp
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, WorkerPhase::Running { .. })
    }

    /// Pure transition function - returns new lifecycle and actions
    pub fn transition(&self, event: WorkerEvent) -> (WorkerLifecycle, Vec<WorkerAction>) {
        if self.is_terminal() {
            return (self.clone(), vec![]);
        }

        match (&self.phase, event) {
            // Shutdown wins from every live phase
            (WorkerPhase::Running { .. }, WorkerEvent::Shutdown) => (
                self.with_phase(WorkerPhase::ShutdownRequested),
                vec![WorkerAction::Kill],
            ),
            (_, WorkerEvent::Shutdown) => (self.with_phase(WorkerPhase::ShutdownRequested), vec![]),

            // Starting → Running
            (WorkerPhase::Starting, WorkerEvent::Spawned { pid }) => {
                (self.with_phase(WorkerPhase::Running { pid }), vec![])
            }

            // Starting → Exited (spawn failures are restarted like exits)
            (WorkerPhase::Starting, WorkerEvent::SpawnFailed { .. }) => self.exited(None),

            // Running → Exited
            (WorkerPhase::Running { .. }, WorkerEvent::Exited { code }) => self.exited(code),

            // Exited → Starting
            (WorkerPhase::Exited { .. }, WorkerEvent::CooldownElapsed) => {
                let next = WorkerLifecycle {
                    phase: WorkerPhase::Starting,
                    restarts: self.restarts + 1,
                    ..self.clone()
                };
                (next, vec![WorkerAction::Spawn])
            }

            // Anything else is out of order and ignored
            _ => (self.clone(), vec![]),
        }
    }

    fn exited(&self, code: Option<i32>) -> (WorkerLifecycle, Vec<WorkerAction>) {
        if let Some(max) = self.policy.max_restarts {
            if self.restarts >= u64::from(max) {
                let next = WorkerLifecycle {
                    phase: WorkerPhase::GaveUp,
                    last_exit: code,
                    ..self.clone()
                };
                return (next, vec![]);
            }
        }

        let next = WorkerLifecycle {
            phase: WorkerPhase::Exited { code },
            last_exit: code,
            ..self.clone()
        };
        (
            next,
            vec![WorkerAction::ScheduleRestart {
                after: self.policy.cooldown,
            }],
        )
    }

    fn with_phase(&self, phase: WorkerPhase) -> WorkerLifecycle {
        WorkerLifecycle {
            phase,
            ..self.clone()
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
