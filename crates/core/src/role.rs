// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller role supplied by the gateway
//!
//! Authentication happens upstream; the role is an opaque label here.

use serde::{Deserialize, Serialize};

const EMERGENCY: &str = "emergency";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerRole(pub String);

impl CallerRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn emergency() -> Self {
        Self(EMERGENCY.to_string())
    }

    /// Emergency callers get their route requests recorded in history
    pub fn is_emergency(&self) -> bool {
        self.0.trim().eq_ignore_ascii_case(EMERGENCY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallerRole {
    fn from(s: &str) -> Self {
        CallerRole(s.to_string())
    }
}
