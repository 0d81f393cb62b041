// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cw-core: Core types for the crossway signal daemon
//!
//! This crate provides:
//! - Location descriptors and the CSV registry that loads them
//! - The broadcast message envelope and pre-serialized frames
//! - Route computation requests and the input artifact codec
//! - The pure lifecycle state machine for supervised workers

pub mod location;
pub mod message;
pub mod role;
pub mod route;
pub mod template;
pub mod worker;

pub use location::{parse_coordinate, LocationDescriptor, LocationRegistry, RegistryError};
pub use message::{BroadcastMessage, Frame};
pub use role::CallerRole;
pub use route::{ComputationRequest, ComputationResult, ResultSource, RouteRecord};
pub use template::interpolate;
pub use worker::{RestartPolicy, WorkerAction, WorkerEvent, WorkerLifecycle, WorkerPhase};
