// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised worker lifecycle

mod state;

pub use state::{RestartPolicy, WorkerAction, WorkerEvent, WorkerLifecycle, WorkerPhase};
