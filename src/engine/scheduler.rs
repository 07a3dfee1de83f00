// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The active set and the polling pass that advances it.
//!
//! [`Scheduler`] is the explicit context every node lives in: factories register
//! the nodes they create, continuations spliced in by `resolve_with` and
//! children attached by `then` are registered transitively, and
//! [`Scheduler::tick_all`] advances everything one step.
//!
//! # Pass Protocol
//!
//! 1. Visit the active set in registration order. Nodes registered while the
//!    pass is running are appended and visited later in the same pass.
//! 2. Tick every ready node (pending, parent settled or gone).
//! 3. Drop the parent link of every node that is now terminal.
//! 4. Remove all terminal nodes in one compaction, keeping survivors in order.
//!
//! Each pass is O(n) in the number of active nodes. There is no priority and
//! no backoff; a node that never settles is revisited on every pass.
//!
//! Registering a node also registers every node already chained below it, so
//! a graph built before it reaches the scheduler is polled as a whole.
//!
//! The scheduler is `!Send`: registration and passes must happen on one thread.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::Serialize;

use super::handler::{HandlerKind, IntoHandler};
use super::node::{Node, NodeId, NodeState, Registrar};
use super::timer::TimerNode;
use crate::observability::messages::engine::PassCompleted;
use crate::observability::messages::node::NodeRegistered;
use crate::observability::messages::StructuredLog;
use crate::traits::{Clock, SystemClock};

struct ActiveSet {
    this: Weak<ActiveSet>,
    entries: RefCell<Vec<Node>>,
    clock: Rc<dyn Clock>,
}

impl ActiveSet {
    /// Register `node` and every not-yet-registered node below it, parents
    /// before children.
    fn insert(&self, node: &Node) {
        let mut pending = vec![node.clone()];
        while let Some(node) = pending.pop() {
            if node.is_registered() {
                continue;
            }
            let this: Weak<dyn Registrar> = self.this.clone();
            node.mark_registered(this);

            let active_count = {
                let mut entries = self.entries.borrow_mut();
                entries.push(node.clone());
                entries.len()
            };
            tracing::trace!(
                "{}",
                NodeRegistered {
                    node_id: node.id(),
                    active_count,
                }
            );

            // Reversed so siblings are registered in attachment order.
            pending.extend(node.children().into_iter().rev());
        }
    }
}

impl Registrar for ActiveSet {
    fn enroll(&self, node: &Node) {
        self.insert(node);
    }
}

/// Outcome of one [`Scheduler::tick_all`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Nodes looked at, including ones registered during the pass.
    pub visited: usize,
    /// Handlers executed.
    pub ticked: usize,
    /// Ready timers that were not due yet.
    pub gated: usize,
    /// Terminal nodes compacted away.
    pub removed: usize,
    /// Nodes left in the active set.
    pub remaining: usize,
}

/// Diagnostic view of one active node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub label: Option<String>,
    pub state: NodeState,
    pub handler: HandlerKind,
    pub handler_ran: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub timer: bool,
}

impl From<&Node> for NodeSnapshot {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id(),
            label: node.label(),
            state: node.state(),
            handler: node.handler_kind(),
            handler_ran: node.handler_ran(),
            parent: node.parent_id(),
            children: node.children_ids(),
            timer: node.gate().is_timer(),
        }
    }
}

/// Handle to an active set. Clones share it.
#[derive(Clone)]
pub struct Scheduler {
    set: Rc<ActiveSet>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    /// Scheduler whose timers read `clock`.
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self {
            set: Rc::new_cyclic(|this| ActiveSet {
                this: this.clone(),
                entries: RefCell::new(Vec::new()),
                clock,
            }),
        }
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.set.clock)
    }

    /// Add `node` to the active set unless it is already registered.
    pub fn register(&self, node: &Node) -> Node {
        self.set.insert(node);
        node.clone()
    }

    /// Registered node without a handler.
    pub fn node(&self) -> Node {
        self.register(&Node::new())
    }

    /// Registered node running `handler`.
    pub fn node_with<M>(&self, handler: impl IntoHandler<M>) -> Node {
        self.register(&Node::with_handler(handler))
    }

    /// Registered timer due `delay` from now on this scheduler's clock.
    pub fn timer(&self, delay: Duration) -> TimerNode {
        let timer = TimerNode::new(self.clock(), delay);
        self.register(&timer);
        timer
    }

    pub fn timer_with<M>(&self, delay: Duration, handler: impl IntoHandler<M>) -> TimerNode {
        let timer = TimerNode::with_handler(self.clock(), delay, handler);
        self.register(&timer);
        timer
    }

    /// Run one scheduling pass. See the module docs for the protocol.
    pub fn tick_all(&self) -> PassStats {
        let mut stats = PassStats::default();

        let mut index = 0;
        loop {
            // Handlers may register nodes, so never hold the borrow across a tick.
            let entry = self.set.entries.borrow().get(index).cloned();
            let Some(node) = entry else { break };
            index += 1;
            stats.visited += 1;

            if node.is_ready() {
                if node.tick() {
                    stats.ticked += 1;
                } else if !node.is_gate_open() {
                    stats.gated += 1;
                }
            }

            if node.is_done() {
                node.clear_parent();
            }
        }

        {
            let mut entries = self.set.entries.borrow_mut();
            let before = entries.len();
            entries.retain(|node| !node.is_done());
            stats.removed = before - entries.len();
            stats.remaining = entries.len();
        }

        PassCompleted {
            visited: stats.visited,
            ticked: stats.ticked,
            gated: stats.gated,
            removed: stats.removed,
            remaining: stats.remaining,
        }
        .log();

        stats
    }

    pub fn active_count(&self) -> usize {
        self.set.entries.borrow().len()
    }

    /// Nothing left to poll.
    pub fn is_idle(&self) -> bool {
        self.set.entries.borrow().is_empty()
    }

    /// Ids of active nodes, in registration order.
    pub fn active_ids(&self) -> Vec<NodeId> {
        self.set.entries.borrow().iter().map(Node::id).collect()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.set.entries.borrow().iter().any(|n| n.ptr_eq(node))
    }

    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.set.entries.borrow().iter().map(NodeSnapshot::from).collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("active_count", &self.active_count())
            .field("active_ids", &self.active_ids())
            .finish()
    }
}
