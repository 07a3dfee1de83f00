// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for node lifecycle events.
//!
//! Node events fire on every registration and settlement, so most of them log
//! at `debug!`/`trace!`. The one exception is [`NodeAlreadySettled`], which
//! points at a handler calling `resolve`/`reject` twice.

use crate::engine::{NodeId, NodeState};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Node inserted into the active set.
///
/// # Log Level
/// `trace!` - High-volume bookkeeping
pub struct NodeRegistered {
    pub node_id: NodeId,
    pub active_count: usize,
}

impl Display for NodeRegistered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node {} registered ({} active)",
            self.node_id, self.active_count
        )
    }
}

/// Node left Pending.
///
/// # Log Level
/// `debug!` - Per-node state transition
///
/// # Example
/// ```
/// use the_tickwork::engine::{NodeId, NodeState};
/// use the_tickwork::observability::messages::node::NodeSettled;
///
/// let msg = NodeSettled {
///     node_id: NodeId(7),
///     state: NodeState::Resolved,
///     with_payload: true,
///     child_count: 2,
/// };
///
/// assert_eq!(msg.to_string(), "Node 7 resolved (payload, 2 children)");
/// ```
pub struct NodeSettled {
    pub node_id: NodeId,
    pub state: NodeState,
    pub with_payload: bool,
    pub child_count: usize,
}

impl Display for NodeSettled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node {} {} ({}, {} children)",
            self.node_id,
            self.state,
            if self.with_payload { "payload" } else { "no payload" },
            self.child_count
        )
    }
}

impl StructuredLog for NodeSettled {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id.0,
            state = %self.state,
            with_payload = self.with_payload,
            child_count = self.child_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node_settled",
            span_name = name,
            node_id = self.node_id.0,
            state = %self.state,
        )
    }
}

/// `resolve`/`reject` called on a node that is already terminal. The call is ignored.
///
/// # Log Level
/// `warn!` - Usually a handler settling its node twice
pub struct NodeAlreadySettled<'a> {
    pub node_id: NodeId,
    pub state: NodeState,
    pub attempted: &'a str,
}

impl Display for NodeAlreadySettled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring {} on node {}: already {}",
            self.attempted, self.node_id, self.state
        )
    }
}

impl StructuredLog for NodeAlreadySettled<'_> {
    fn log(&self) {
        tracing::warn!(
            node_id = self.node_id.0,
            state = %self.state,
            attempted = self.attempted,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "node_already_settled",
            span_name = name,
            node_id = self.node_id.0,
            attempted = self.attempted,
        )
    }
}

/// Tail-call resolution moved a node's dependents onto a continuation.
///
/// # Log Level
/// `debug!` - Graph rewrite
pub struct NodeSpliced {
    pub node_id: NodeId,
    pub continuation_id: NodeId,
    pub moved_children: usize,
}

impl Display for NodeSpliced {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node {} continues as node {} ({} dependents moved)",
            self.node_id, self.continuation_id, self.moved_children
        )
    }
}

impl StructuredLog for NodeSpliced {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id.0,
            continuation_id = self.continuation_id.0,
            moved_children = self.moved_children,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node_spliced",
            span_name = name,
            node_id = self.node_id.0,
            continuation_id = self.continuation_id.0,
        )
    }
}

/// Rejection pushed down to a node's pending children.
pub struct RejectionCascaded {
    pub node_id: NodeId,
    pub rejected_children: usize,
    pub skipped_children: usize,
}

impl Display for RejectionCascaded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node {} rejection cascaded to {} children ({} already settled)",
            self.node_id, self.rejected_children, self.skipped_children
        )
    }
}

/// Timer node armed.
pub struct TimerArmed {
    pub node_id: NodeId,
    pub delay: Duration,
}

impl Display for TimerArmed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Timer node {} armed for {:?}", self.node_id, self.delay)
    }
}
