// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Crossway orchestration engine
//!
//! Long-running signal workers, one-shot route and incident computations,
//! and the fan-out that carries their results to live subscribers.

mod alerts;
mod broadcast;
mod error;
mod incident;
mod invoker;
mod resolve;
mod supervisor;

pub use alerts::{Alert, AlertBoard};
pub use broadcast::{Broadcaster, DeliveryError, PublishReport, Subscriber, SubscriptionId};
pub use error::{DetectionError, InvocationError, SupervisorError};
pub use incident::{DetectorConfig, IncidentDetector, IncidentReport};
pub use invoker::{ComputationInvoker, InvokerConfig};
pub use resolve::{resolve, Resolution, ResolutionFailure};
pub use supervisor::{WorkerConfig, WorkerHandle, WorkerSupervisor};
