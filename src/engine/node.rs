// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Promise-style nodes: state machine, chaining and result propagation.
//!
//! A [`Node`] is a cheaply clonable handle to one unit of deferred work. Nodes
//! form a DAG through [`Node::then`]: the child waits (is not *ready*) until its
//! parent has settled, then runs its [`Handler`] exactly once.
//!
//! # Ownership
//!
//! ```text
//!   parent ──children (Rc)──▶ child
//!   parent ◀──parent (Weak)── child
//! ```
//!
//! Children are owned by their parent so results can be pushed down to them;
//! the back-link is weak and is also cleared by the scheduler once the child is
//! terminal, so a settled chain is freed as soon as the scheduler and the
//! application stop holding it.
//!
//! # Propagation
//!
//! * Resolving copies the node's `result` into every child's `received` slot.
//!   Children are not ticked here; the next scheduler pass picks them up.
//! * Rejecting cascades eagerly: every pending descendant is rejected with the
//!   same payload before the call returns.
//! * Resolving *with* another node ([`Node::resolve_with`]) splices that node in
//!   as the source of this node's eventual outcome: everything that was waiting
//!   on this node waits on the continuation instead.
//!
//! Terminal states are final. Settling a node that has already settled is
//! ignored and reported as a warning.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use super::handler::{Handler, HandlerKind, IntoHandler};
use super::timer::Gate;
use crate::observability::messages::node::{
    NodeAlreadySettled, NodeSettled, NodeSpliced, RejectionCascaded,
};
use crate::observability::messages::StructuredLog;

/// Opaque value carried between nodes.
pub type Payload = Rc<dyn Any>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Creation-ordered node identity, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Resolved,
    Rejected,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        self != NodeState::Pending
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Pending => "pending",
            NodeState::Resolved => "resolved",
            NodeState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Where continuation nodes get registered. Implemented by the scheduler's
/// active set; kept as a trait so nodes do not depend on the scheduler.
pub(crate) trait Registrar {
    fn enroll(&self, node: &Node);
}

pub(crate) struct NodeInner {
    id: NodeId,
    label: RefCell<Option<String>>,
    state: Cell<NodeState>,
    handler: RefCell<Handler>,
    handler_kind: HandlerKind,
    handler_ran: Cell<bool>,
    result: RefCell<Option<Payload>>,
    received: RefCell<Option<Payload>>,
    parent: RefCell<Option<Weak<NodeInner>>>,
    children: RefCell<Vec<Node>>,
    registered: Cell<bool>,
    registrar: RefCell<Option<Weak<dyn Registrar>>>,
    gate: Gate,
}

/// Handle to a node. Clones share the same node.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    /// Pending node without a handler; it resolves on its first tick.
    pub fn new() -> Self {
        Self::build(Handler::None, Gate::Open)
    }

    /// Pending node running `handler` on its first tick.
    ///
    /// # Examples
    /// ```
    /// use the_tickwork::engine::{HandlerKind, Node, NodeState};
    ///
    /// let node = Node::with_handler(|n: &Node| n.resolve_with_value(41 + 1));
    /// assert_eq!(node.handler_kind(), HandlerKind::Manual);
    ///
    /// node.tick();
    /// assert_eq!(node.state(), NodeState::Resolved);
    /// assert_eq!(node.result_as::<i32>().as_deref(), Some(&42));
    /// ```
    pub fn with_handler<M>(handler: impl IntoHandler<M>) -> Self {
        Self::build(handler.into_handler(), Gate::Open)
    }

    pub(crate) fn build(handler: Handler, gate: Gate) -> Self {
        let handler_kind = handler.kind();
        Self {
            inner: Rc::new(NodeInner {
                id: NodeId::next(),
                label: RefCell::new(None),
                state: Cell::new(NodeState::Pending),
                handler: RefCell::new(handler),
                handler_kind,
                handler_ran: Cell::new(false),
                result: RefCell::new(None),
                received: RefCell::new(None),
                parent: RefCell::new(None),
                children: RefCell::new(Vec::new()),
                registered: Cell::new(false),
                registrar: RefCell::new(None),
                gate,
            }),
        }
    }

    /// Builder-style [`Node::set_label`].
    pub fn labeled(self, label: impl Into<String>) -> Self {
        self.set_label(label);
        self
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.inner.label.borrow_mut() = Some(label.into());
    }

    pub fn label(&self) -> Option<String> {
        self.inner.label.borrow().clone()
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn state(&self) -> NodeState {
        self.inner.state.get()
    }

    /// Resolved or rejected.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn handler_kind(&self) -> HandlerKind {
        self.inner.handler_kind
    }

    pub fn handler_ran(&self) -> bool {
        self.inner.handler_ran.get()
    }

    pub fn is_registered(&self) -> bool {
        self.inner.registered.get()
    }

    /// Pending, and the parent (if still linked) has settled.
    ///
    /// A rejected parent does not block readiness; by the time the parent is
    /// rejected the cascade has usually settled this node already.
    ///
    /// The parent link is weak. A registered parent stays alive in the active
    /// set until it settles, but the parent of a detached graph can be dropped
    /// while pending, and its child then counts as ready.
    pub fn is_ready(&self) -> bool {
        if self.is_done() {
            return false;
        }
        match self.parent() {
            Some(parent) => parent.is_done(),
            None => true,
        }
    }

    /// Earliest instant a time-gated node may run; `None` for plain nodes.
    pub fn not_before(&self) -> Option<Instant> {
        self.inner.gate.not_before()
    }

    /// Whether a time gate (if any) currently lets [`Node::tick`] through.
    pub fn is_gate_open(&self) -> bool {
        self.inner.gate.is_open()
    }

    /// Run the handler if it has not run yet.
    ///
    /// Returns `true` when this call executed the handler. A closed time gate
    /// makes the call a no-op without consuming the handler.
    pub fn tick(&self) -> bool {
        if !self.inner.gate.is_open() || self.inner.handler_ran.get() {
            return false;
        }
        // Marked before running so a handler touching its own node cannot re-enter.
        self.inner.handler_ran.set(true);

        let handler = std::mem::take(&mut *self.inner.handler.borrow_mut());
        match handler {
            Handler::Manual(f) => f(self),
            Handler::Auto(f) => {
                f();
                self.resolve();
            }
            Handler::None => self.resolve(),
        }
        true
    }

    /// Settle as resolved and hand `result` (if any) to every child.
    pub fn resolve(&self) {
        if !self.settle(NodeState::Resolved, "resolve") {
            return;
        }

        let result = self.inner.result.borrow().clone();
        let children = self.inner.children.borrow();
        if let Some(result) = &result {
            for child in children.iter() {
                *child.inner.received.borrow_mut() = Some(Rc::clone(result));
            }
        }

        NodeSettled {
            node_id: self.id(),
            state: NodeState::Resolved,
            with_payload: result.is_some(),
            child_count: children.len(),
        }
        .log();
    }

    /// Store `value` as this node's result, then [`Node::resolve`].
    pub fn resolve_with_value<T: Any>(&self, value: T) {
        self.resolve_with_payload(Rc::new(value));
    }

    pub fn resolve_with_payload(&self, payload: Payload) {
        if self.warn_if_settled("resolve") {
            return;
        }
        *self.inner.result.borrow_mut() = Some(payload);
        self.resolve();
    }

    /// Resolve by handing this node's dependents over to `next`.
    ///
    /// `next` is registered with this node's scheduler, inherits all of this
    /// node's children (which are reparented onto it), and becomes this node's
    /// only child so it still receives this node's result. This node then
    /// resolves immediately.
    ///
    /// If `next` has no parent of its own, its parent becomes this node. A
    /// `next` that already waits on another node keeps that dependency, so a
    /// continuation chained off a pending timer still waits for the timer.
    ///
    /// # Examples
    /// ```
    /// use the_tickwork::engine::{Node, Scheduler};
    ///
    /// let scheduler = Scheduler::new();
    /// let step = scheduler.node_with(|n: &Node| n.resolve());
    /// let after = step.then(|| {});
    /// let next = scheduler.node();
    ///
    /// step.resolve_with(&next);
    ///
    /// assert_eq!(after.parent_id(), Some(next.id()));
    /// assert_eq!(step.children_ids(), vec![next.id()]);
    /// ```
    pub fn resolve_with(&self, next: &Node) {
        if self.warn_if_settled("resolve") {
            return;
        }
        if next.ptr_eq(self) {
            tracing::warn!(node_id = %self.id(), "Node cannot continue into itself; resolving plainly");
            self.resolve();
            return;
        }
        self.enroll(next);

        let moved: Vec<Node> = std::mem::take(&mut *self.inner.children.borrow_mut())
            .into_iter()
            .filter(|child| !child.ptr_eq(next))
            .collect();
        let moved_children = moved.len();
        for child in &moved {
            child.set_parent(Some(next));
        }
        next.inner.children.borrow_mut().extend(moved);

        *self.inner.children.borrow_mut() = vec![next.clone()];
        if next.parent().is_none() {
            next.set_parent(Some(self));
        }

        NodeSpliced {
            node_id: self.id(),
            continuation_id: next.id(),
            moved_children,
        }
        .log();

        self.resolve();
    }

    /// Wrap `handler` in a fresh node and [`Node::resolve_with`] it. Returns the new node.
    pub fn resolve_with_handler<M>(&self, handler: impl IntoHandler<M>) -> Node {
        let next = Node::with_handler(handler);
        self.resolve_with(&next);
        next
    }

    /// Settle as rejected and reject every pending descendant.
    ///
    /// The current `result` (if any) is passed down as the failure payload.
    pub fn reject(&self) {
        if !self.settle(NodeState::Rejected, "reject") {
            return;
        }

        let payload = self.inner.result.borrow().clone();
        let children: Vec<Node> = self.inner.children.borrow().clone();

        NodeSettled {
            node_id: self.id(),
            state: NodeState::Rejected,
            with_payload: payload.is_some(),
            child_count: children.len(),
        }
        .log();

        let mut rejected = 0;
        for child in &children {
            // A settled child answers only to its own dependents now.
            if child.is_done() {
                continue;
            }
            *child.inner.result.borrow_mut() = payload.clone();
            child.reject();
            rejected += 1;
        }

        if !children.is_empty() {
            tracing::debug!(
                "{}",
                RejectionCascaded {
                    node_id: self.id(),
                    rejected_children: rejected,
                    skipped_children: children.len() - rejected,
                }
            );
        }
    }

    /// Store `value` as the failure payload, then [`Node::reject`].
    pub fn reject_with_value<T: Any>(&self, value: T) {
        self.reject_with_payload(Rc::new(value));
    }

    pub fn reject_with_payload(&self, payload: Payload) {
        if self.warn_if_settled("reject") {
            return;
        }
        *self.inner.result.borrow_mut() = Some(payload);
        self.reject();
    }

    /// Attach a new child running `handler` and return it.
    ///
    /// # Examples
    /// ```
    /// use the_tickwork::engine::{Node, Scheduler};
    ///
    /// let scheduler = Scheduler::new();
    /// let last = scheduler
    ///     .node_with(|| {})
    ///     .then(|n: &Node| n.resolve_with_value("hello"))
    ///     .then(|| {});
    ///
    /// while !scheduler.is_idle() {
    ///     scheduler.tick_all();
    /// }
    /// assert_eq!(last.received_as::<&str>().as_deref(), Some(&"hello"));
    /// ```
    pub fn then<M>(&self, handler: impl IntoHandler<M>) -> Node {
        self.then_node(&Node::with_handler(handler))
    }

    /// Attach an existing node as a child and return it.
    ///
    /// A child attached to a parent that has already resolved gets the
    /// parent's result at once. A parent that has already rejected passes
    /// nothing down; the cascade only reaches children attached before the
    /// rejection, so a late child is simply ready and runs its handler.
    pub fn then_node(&self, child: &Node) -> Node {
        self.enroll(child);
        self.inner.children.borrow_mut().push(child.clone());
        child.set_parent(Some(self));

        if self.state() == NodeState::Resolved {
            if let Some(result) = self.result() {
                *child.inner.received.borrow_mut() = Some(result);
            }
        }
        child.clone()
    }

    /// Value produced by this node (or its failure payload).
    pub fn result(&self) -> Option<Payload> {
        self.inner.result.borrow().clone()
    }

    /// Value handed down by the parent when it resolved.
    pub fn received(&self) -> Option<Payload> {
        self.inner.received.borrow().clone()
    }

    pub fn result_as<T: Any>(&self) -> Option<Rc<T>> {
        self.result().and_then(|p| p.downcast::<T>().ok())
    }

    pub fn received_as<T: Any>(&self) -> Option<Rc<T>> {
        self.received().and_then(|p| p.downcast::<T>().ok())
    }

    pub fn parent(&self) -> Option<Node> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Node { inner })
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent().map(|p| p.id())
    }

    pub fn has_parent(&self) -> bool {
        self.parent().is_some()
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    pub fn children_ids(&self) -> Vec<NodeId> {
        self.inner.children.borrow().iter().map(Node::id).collect()
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn clear_parent(&self) {
        *self.inner.parent.borrow_mut() = None;
    }

    pub(crate) fn mark_registered(&self, registrar: Weak<dyn Registrar>) {
        self.inner.registered.set(true);
        *self.inner.registrar.borrow_mut() = Some(registrar);
    }

    pub(crate) fn gate(&self) -> &Gate {
        &self.inner.gate
    }

    fn set_parent(&self, parent: Option<&Node>) {
        *self.inner.parent.borrow_mut() = parent.map(|p| Rc::downgrade(&p.inner));
    }

    /// Register `node` wherever this node is registered. A detached node has
    /// nowhere to register; its subtree is picked up when it gets registered.
    fn enroll(&self, node: &Node) {
        let registrar = self.inner.registrar.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(registrar) = registrar {
            registrar.enroll(node);
        }
    }

    fn settle(&self, state: NodeState, attempted: &str) -> bool {
        if self.warn_if_settled(attempted) {
            return false;
        }
        self.inner.state.set(state);
        true
    }

    fn warn_if_settled(&self, attempted: &str) -> bool {
        if !self.is_done() {
            return false;
        }
        NodeAlreadySettled {
            node_id: self.id(),
            state: self.state(),
            attempted,
        }
        .log();
        true
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("label", &self.inner.label.borrow())
            .field("state", &self.state())
            .field("handler", &self.handler_kind())
            .field("handler_ran", &self.handler_ran())
            .field("parent", &self.parent_id())
            .field("children", &self.children_ids())
            .finish()
    }
}
