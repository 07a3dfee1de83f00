// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Reasons the host driver stops before the active set drains.
//!
//! None of these are failures of individual nodes; a rejected node is a normal
//! terminal state and never surfaces here.

use crate::engine::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Nothing ran, settled, or waited on a timer for `passes` passes in a row
    #[error("no progress after {passes} consecutive passes; {} node(s) still active", .active.len())]
    Stalled { passes: u32, active: Vec<NodeId> },

    #[error("pass limit of {limit} reached with {active} node(s) still active")]
    PassLimitExceeded { limit: u64, active: usize },

    #[error("driver cancelled after {passes} passes with {active} node(s) still active")]
    Cancelled { passes: u64, active: usize },
}
