// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Time-gated nodes.
//!
//! A [`TimerNode`] is an ordinary [`Node`] carrying a not-before instant. Until
//! the clock reaches that instant, ticking it does nothing: the handler is not
//! consumed and the node stays Pending. From then on it behaves like any other
//! node. Wake-up precision is bounded by how often the host calls `tick_all`,
//! not by the timer itself.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::handler::{Handler, IntoHandler};
use super::node::Node;
use crate::observability::messages::node::TimerArmed;
use crate::traits::Clock;

/// Per-node gate checked at the top of every tick.
pub(crate) enum Gate {
    Open,
    NotBefore { target: Instant, clock: Rc<dyn Clock> },
}

impl Gate {
    pub(crate) fn is_open(&self) -> bool {
        match self {
            Gate::Open => true,
            Gate::NotBefore { target, clock } => clock.now() >= *target,
        }
    }

    pub(crate) fn is_timer(&self) -> bool {
        matches!(self, Gate::NotBefore { .. })
    }

    pub(crate) fn not_before(&self) -> Option<Instant> {
        match self {
            Gate::Open => None,
            Gate::NotBefore { target, .. } => Some(*target),
        }
    }

    /// Time until the gate opens; zero when it is open.
    pub(crate) fn remaining(&self) -> Duration {
        match self {
            Gate::Open => Duration::ZERO,
            Gate::NotBefore { target, clock } => target.saturating_duration_since(clock.now()),
        }
    }
}

/// A node that refuses to run before `now + delay`.
///
/// Derefs to [`Node`], so chaining and settlement work as on any node. The
/// deadline itself lives on the node ([`Node::not_before`]) and survives
/// [`TimerNode::into_node`].
///
/// # Examples
/// ```
/// use std::rc::Rc;
/// use std::time::Duration;
/// use the_tickwork::engine::{NodeState, Scheduler};
/// use the_tickwork::traits::ManualClock;
///
/// let clock = Rc::new(ManualClock::new());
/// let scheduler = Scheduler::with_clock(clock.clone());
/// let timer = scheduler.timer(Duration::from_secs(3));
///
/// scheduler.tick_all();
/// assert_eq!(timer.state(), NodeState::Pending);
///
/// clock.advance(Duration::from_secs(3));
/// scheduler.tick_all();
/// assert_eq!(timer.state(), NodeState::Resolved);
/// ```
#[derive(Clone)]
pub struct TimerNode {
    node: Node,
    delay: Duration,
}

impl TimerNode {
    /// Timer without a handler: it simply resolves once due.
    pub fn new(clock: Rc<dyn Clock>, delay: Duration) -> Self {
        Self::build(clock, delay, Handler::None)
    }

    pub fn with_handler<M>(clock: Rc<dyn Clock>, delay: Duration, handler: impl IntoHandler<M>) -> Self {
        Self::build(clock, delay, handler.into_handler())
    }

    fn build(clock: Rc<dyn Clock>, delay: Duration, handler: Handler) -> Self {
        let target = clock.now() + delay;
        let node = Node::build(handler, Gate::NotBefore { target, clock });
        tracing::trace!(
            "{}",
            TimerArmed {
                node_id: node.id(),
                delay,
            }
        );
        Self { node, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time left until due; zero once due.
    pub fn remaining(&self) -> Duration {
        self.node.gate().remaining()
    }

    pub fn is_due(&self) -> bool {
        self.node.gate().is_open()
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }
}

impl Deref for TimerNode {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl From<TimerNode> for Node {
    fn from(timer: TimerNode) -> Self {
        timer.node
    }
}

impl fmt::Debug for TimerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerNode")
            .field("node", &self.node)
            .field("delay", &self.delay)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NodeState;
    use crate::traits::ManualClock;
    use std::cell::Cell;

    fn clock() -> (Rc<ManualClock>, Rc<dyn Clock>) {
        let manual = Rc::new(ManualClock::new());
        let shared: Rc<dyn Clock> = manual.clone();
        (manual, shared)
    }

    #[test]
    fn tick_before_due_changes_nothing() {
        let (manual, clock) = clock();
        let timer = TimerNode::new(clock, Duration::from_millis(100));

        manual.advance(Duration::from_millis(99));
        assert!(!timer.tick());
        assert_eq!(timer.state(), NodeState::Pending);
        assert!(!timer.handler_ran());
        assert_eq!(timer.remaining(), Duration::from_millis(1));
    }

    #[test]
    fn due_exactly_at_target() {
        let (manual, clock) = clock();
        let timer = TimerNode::new(clock, Duration::from_millis(100));

        manual.advance(Duration::from_millis(100));
        assert!(timer.is_due());
        assert!(timer.tick());
        assert_eq!(timer.state(), NodeState::Resolved);
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[test]
    fn manual_handler_runs_once_after_due() {
        let (manual, clock) = clock();
        let runs = Rc::new(Cell::new(0));
        let counted = Rc::clone(&runs);
        let timer = TimerNode::with_handler(clock, Duration::from_secs(1), move |n: &Node| {
            counted.set(counted.get() + 1);
            n.resolve_with_value("done");
        });

        timer.tick();
        assert_eq!(runs.get(), 0);

        manual.advance(Duration::from_secs(5));
        timer.tick();
        timer.tick();
        assert_eq!(runs.get(), 1);
        assert_eq!(timer.result_as::<&str>().as_deref(), Some(&"done"));
    }

    #[test]
    fn zero_delay_is_due_immediately() {
        let (_, clock) = clock();
        let timer = TimerNode::new(clock, Duration::ZERO);
        assert!(timer.is_due());
        assert!(timer.node().gate().is_timer());
    }

    #[test]
    fn deadline_is_read_from_the_clock_at_creation() {
        let (manual, clock) = clock();
        let start = manual.now();
        let timer = TimerNode::new(clock, Duration::from_secs(2));

        assert_eq!(timer.not_before(), Some(start + Duration::from_secs(2)));
        assert_eq!(timer.delay(), Duration::from_secs(2));

        manual.advance(Duration::from_millis(500));
        assert_eq!(timer.remaining(), Duration::from_millis(1500));
        assert_eq!(Node::new().not_before(), None);
    }

    #[test]
    fn into_node_keeps_gate() {
        let (manual, clock) = clock();
        let timer = TimerNode::new(clock, Duration::from_secs(1));
        let deadline = timer.not_before();
        let node: Node = timer.into();
        assert_eq!(node.not_before(), deadline);
        assert!(!node.is_gate_open());
        manual.advance(Duration::from_secs(1));
        assert!(node.is_gate_open());
    }
}
