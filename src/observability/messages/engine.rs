// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for scheduler passes and host driver events.
//!
//! This module contains message types for logging events related to:
//! * Individual `tick_all` passes and compaction
//! * Changes in the set of active nodes
//! * Driver lifecycle (start, completion, stall, cancellation)

use crate::engine::NodeId;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// One scheduler pass finished.
///
/// # Log Level
/// `trace!` - Fires on every pass
///
/// # Example
/// ```
/// use the_tickwork::observability::messages::engine::PassCompleted;
///
/// let msg = PassCompleted {
///     visited: 3,
///     ticked: 1,
///     gated: 0,
///     removed: 1,
///     remaining: 2,
/// };
///
/// tracing::trace!("{}", msg);
/// ```
pub struct PassCompleted {
    pub visited: usize,
    pub ticked: usize,
    pub gated: usize,
    pub removed: usize,
    pub remaining: usize,
}

impl Display for PassCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pass complete: visited={}, ticked={}, gated={}, removed={}, remaining={}",
            self.visited, self.ticked, self.gated, self.removed, self.remaining
        )
    }
}

impl StructuredLog for PassCompleted {
    fn log(&self) {
        tracing::trace!(
            visited = self.visited,
            ticked = self.ticked,
            gated = self.gated,
            removed = self.removed,
            remaining = self.remaining,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "pass",
            span_name = name,
            visited = self.visited,
            remaining = self.remaining,
        )
    }
}

/// The set of active node ids differs from the previous pass.
///
/// # Log Level
/// `info!` - What the host watches to follow progress
///
/// # Example
/// ```
/// use the_tickwork::engine::NodeId;
/// use the_tickwork::observability::messages::engine::ActiveSetChanged;
///
/// let ids = [NodeId(3), NodeId(5)];
/// let msg = ActiveSetChanged { active: &ids };
///
/// assert_eq!(msg.to_string(), "Active nodes (2): 3 5");
/// ```
pub struct ActiveSetChanged<'a> {
    pub active: &'a [NodeId],
}

impl Display for ActiveSetChanged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Active nodes ({}):", self.active.len())?;
        for id in self.active {
            write!(f, " {}", id)?;
        }
        Ok(())
    }
}

impl StructuredLog for ActiveSetChanged<'_> {
    fn log(&self) {
        tracing::info!(active_count = self.active.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "active_set",
            span_name = name,
            active_count = self.active.len(),
        )
    }
}

/// Driver loop starting.
///
/// # Log Level
/// `info!` - Important operational event
pub struct DriverStarted {
    pub tick_interval: std::time::Duration,
    pub active_count: usize,
}

impl Display for DriverStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Driver starting: {} active nodes, tick every {:?}",
            self.active_count, self.tick_interval
        )
    }
}

impl StructuredLog for DriverStarted {
    fn log(&self) {
        tracing::info!(
            active_count = self.active_count,
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "driver",
            span_name = name,
            tick_interval = ?self.tick_interval,
        )
    }
}

/// Active set drained; the driver is returning.
///
/// # Log Level
/// `info!` - Important operational event
pub struct DriverFinished {
    pub passes: u64,
    pub handlers_run: u64,
    pub duration: std::time::Duration,
}

impl Display for DriverFinished {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Driver finished: {} passes, {} handlers run in {:?}",
            self.passes, self.handlers_run, self.duration
        )
    }
}

impl StructuredLog for DriverFinished {
    fn log(&self) {
        tracing::info!(
            passes = self.passes,
            handlers_run = self.handlers_run,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "driver_finished",
            span_name = name,
            passes = self.passes,
            duration = ?self.duration,
        )
    }
}

/// Driver gave up: nothing moved for too many passes.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct DriverStalled<'a> {
    pub idle_passes: u32,
    pub active: &'a [NodeId],
}

impl Display for DriverStalled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "No progress for {} passes with {} nodes still pending",
            self.idle_passes,
            self.active.len()
        )
    }
}

impl StructuredLog for DriverStalled<'_> {
    fn log(&self) {
        tracing::error!(
            idle_passes = self.idle_passes,
            active_count = self.active.len(),
            active = ?self.active,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "driver_stalled",
            span_name = name,
            idle_passes = self.idle_passes,
        )
    }
}
