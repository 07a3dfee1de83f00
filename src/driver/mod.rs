// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host driver that polls a [`Scheduler`] at a fixed cadence.
//!
//! The scheduler never drives itself; something outside it has to call
//! [`Scheduler::tick_all`] until the active set drains. [`Driver`] is that
//! something for tokio hosts: it waits on a `tokio::time::interval` between
//! passes, reports changes in the active set, and gives up when the set stops
//! moving or a pass budget runs out.
//!
//! # Progress
//!
//! A pass counts as progress when it ran a handler, removed a settled node,
//! held back a timer that is not due yet, or changed the set of active ids.
//! Waiting timers count so that a long delay is never mistaken for a stall.
//!
//! # Runtime
//!
//! Nodes are `!Send`, so the futures returned here are too. Run them on a
//! current-thread runtime or inside a `tokio::task::LocalSet`.
//!
//! # Example
//!
//! ```rust
//! use the_tickwork::config::DriverConfig;
//! use the_tickwork::driver::Driver;
//! use the_tickwork::engine::Scheduler;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::new();
//! scheduler.node_with(|| println!("hello")).then(|| println!("world"));
//!
//! let config = DriverConfig {
//!     tick_interval_ms: 1,
//!     ..DriverConfig::default()
//! };
//! let report = Driver::new(scheduler, config).run().await?;
//! assert_eq!(report.handlers_run, 2);
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::DriverConfig;
use crate::engine::{NodeId, PassStats, Scheduler};
use crate::errors::DriverError;
use crate::observability::messages::engine::{
    ActiveSetChanged, DriverFinished, DriverStalled, DriverStarted,
};
use crate::observability::messages::StructuredLog;

/// Summary of a driver run that drained its scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverReport {
    pub passes: u64,
    pub elapsed: Duration,
    pub handlers_run: u64,
    /// Largest number of nodes seen in a single pass.
    pub peak_active: usize,
}

pub struct Driver {
    scheduler: Scheduler,
    config: DriverConfig,
}

/// Bookkeeping carried across passes.
struct RunState {
    passes: u64,
    handlers_run: u64,
    peak_active: usize,
    idle_passes: u32,
    last_active: Vec<NodeId>,
}

impl RunState {
    fn new(active: Vec<NodeId>) -> Self {
        Self {
            passes: 0,
            handlers_run: 0,
            peak_active: active.len(),
            idle_passes: 0,
            last_active: active,
        }
    }

    /// Fold one pass in. Returns true when the active ids changed.
    fn record(&mut self, stats: &PassStats, active: Vec<NodeId>) -> bool {
        self.passes += 1;
        self.handlers_run += stats.ticked as u64;
        self.peak_active = self.peak_active.max(stats.visited);

        let changed = active != self.last_active;
        if changed {
            self.last_active = active;
        }

        let progressed = stats.ticked > 0 || stats.removed > 0 || stats.gated > 0 || changed;
        if progressed {
            self.idle_passes = 0;
        } else {
            self.idle_passes = self.idle_passes.saturating_add(1);
        }
        changed
    }
}

impl Driver {
    pub fn new(scheduler: Scheduler, config: DriverConfig) -> Self {
        Self { scheduler, config }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Poll until the active set is empty.
    pub async fn run(&self) -> Result<DriverReport, DriverError> {
        self.drive(None).await
    }

    /// Poll until the active set is empty or `token` is cancelled.
    ///
    /// Cancellation is checked before every pass, so a handler that cancels
    /// the token stops the loop before the next pass starts.
    pub async fn run_until_cancelled(
        &self,
        token: &CancellationToken,
    ) -> Result<DriverReport, DriverError> {
        self.drive(Some(token)).await
    }

    async fn drive(&self, token: Option<&CancellationToken>) -> Result<DriverReport, DriverError> {
        let start = DriverStarted {
            tick_interval: self.config.tick_interval(),
            active_count: self.scheduler.active_count(),
        };
        let span = start.span("drive");
        self.poll_loop(token, start).instrument(span).await
    }

    async fn poll_loop(
        &self,
        token: Option<&CancellationToken>,
        start: DriverStarted,
    ) -> Result<DriverReport, DriverError> {
        start.log();
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut run = RunState::new(self.scheduler.active_ids());

        while !self.scheduler.is_idle() {
            if let Some(limit) = self.config.max_passes {
                if run.passes >= limit {
                    tracing::warn!(
                        limit,
                        active_count = self.scheduler.active_count(),
                        "Pass limit reached before the active set drained"
                    );
                    return Err(DriverError::PassLimitExceeded {
                        limit,
                        active: self.scheduler.active_count(),
                    });
                }
            }

            match token {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            tracing::info!(
                                passes = run.passes,
                                active_count = self.scheduler.active_count(),
                                "Driver cancelled"
                            );
                            return Err(DriverError::Cancelled {
                                passes: run.passes,
                                active: self.scheduler.active_count(),
                            });
                        }
                        _ = ticker.tick() => {}
                    }
                }
                None => {
                    ticker.tick().await;
                }
            }

            let stats = self.scheduler.tick_all();
            let changed = run.record(&stats, self.scheduler.active_ids());

            if changed && self.config.log_active_changes {
                ActiveSetChanged {
                    active: &run.last_active,
                }
                .log();
            }

            let limit = self.config.stall_passes;
            if limit > 0 && run.idle_passes >= limit {
                DriverStalled {
                    idle_passes: run.idle_passes,
                    active: &run.last_active,
                }
                .log();
                return Err(DriverError::Stalled {
                    passes: run.idle_passes,
                    active: run.last_active,
                });
            }
        }

        let report = DriverReport {
            passes: run.passes,
            elapsed: started.elapsed(),
            handlers_run: run.handlers_run,
            peak_active: run.peak_active,
        };

        DriverFinished {
            passes: report.passes,
            handlers_run: report.handlers_run,
            duration: report.elapsed,
        }
        .log();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Node;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config() -> DriverConfig {
        DriverConfig {
            tick_interval_ms: 1,
            ..DriverConfig::default()
        }
    }

    #[tokio::test]
    async fn test_empty_scheduler_finishes_without_passes() {
        let driver = Driver::new(Scheduler::new(), fast_config());
        let report = driver.run().await.unwrap();
        assert_eq!(report.passes, 0);
        assert_eq!(report.handlers_run, 0);
        assert_eq!(report.peak_active, 0);
    }

    #[tokio::test]
    async fn test_chain_drains() {
        let scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = log.clone();
        let l2 = log.clone();
        let l3 = log.clone();
        scheduler
            .node_with(move || l1.borrow_mut().push("first"))
            .then(move || l2.borrow_mut().push("second"))
            .then(move || l3.borrow_mut().push("third"));

        let driver = Driver::new(scheduler.clone(), fast_config());
        let report = driver.run().await.unwrap();

        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
        assert_eq!(report.handlers_run, 3);
        assert_eq!(report.peak_active, 3);
        assert!(scheduler.is_idle());
    }

    #[tokio::test]
    async fn test_prebuilt_graph_runs_to_completion() {
        let scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let root = Node::new();
        let l1 = log.clone();
        let l2 = log.clone();
        let last = root
            .then(move || l1.borrow_mut().push("middle"))
            .then(move || l2.borrow_mut().push("last"));
        scheduler.register(&root);

        let report = Driver::new(scheduler, fast_config()).run().await.unwrap();

        assert_eq!(*log.borrow(), vec!["middle", "last"]);
        assert_eq!(report.handlers_run, 3);
        assert!(last.is_done());
    }

    #[tokio::test]
    async fn test_timer_is_not_a_stall() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(RefCell::new(false));
        let flag = fired.clone();
        scheduler.timer_with(Duration::from_millis(30), move || *flag.borrow_mut() = true);

        // Far more idle passes than allowed would elapse if waiting counted as idle.
        let config = DriverConfig {
            tick_interval_ms: 1,
            stall_passes: 2,
            ..DriverConfig::default()
        };
        let report = Driver::new(scheduler, config).run().await.unwrap();

        assert!(*fired.borrow());
        assert!(report.elapsed >= Duration::from_millis(30));
        assert!(report.passes >= 2);
    }

    #[tokio::test]
    async fn test_stall_detected() {
        let scheduler = Scheduler::new();
        // A manual handler that never settles its node.
        let stuck = scheduler.node_with(|_: &Node| {});
        let waiting = stuck.then(|| {});

        let config = DriverConfig {
            tick_interval_ms: 1,
            stall_passes: 3,
            ..DriverConfig::default()
        };
        let err = Driver::new(scheduler, config).run().await.unwrap_err();

        match err {
            DriverError::Stalled { passes, active } => {
                assert_eq!(passes, 3);
                assert_eq!(active, vec![stuck.id(), waiting.id()]);
            }
            other => panic!("expected stall, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pass_limit() {
        let scheduler = Scheduler::new();
        scheduler.node_with(|_: &Node| {});

        let config = DriverConfig {
            tick_interval_ms: 1,
            max_passes: Some(4),
            ..DriverConfig::default()
        };
        let err = Driver::new(scheduler, config).run().await.unwrap_err();
        assert_eq!(
            err,
            DriverError::PassLimitExceeded {
                limit: 4,
                active: 1
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_before_first_pass() {
        let scheduler = Scheduler::new();
        let node = scheduler.node();

        let token = CancellationToken::new();
        token.cancel();

        let err = Driver::new(scheduler, fast_config())
            .run_until_cancelled(&token)
            .await
            .unwrap_err();

        assert_eq!(err, DriverError::Cancelled { passes: 0, active: 1 });
        assert!(!node.is_done());
    }

    #[tokio::test]
    async fn test_handler_cancels_driver() {
        let scheduler = Scheduler::new();
        let token = CancellationToken::new();

        let inner = token.clone();
        let first = scheduler.node_with(move |_: &Node| inner.cancel());
        first.then(|| {});

        let err = Driver::new(scheduler, fast_config())
            .run_until_cancelled(&token)
            .await
            .unwrap_err();

        assert_eq!(err, DriverError::Cancelled { passes: 1, active: 2 });
    }

    #[tokio::test]
    async fn test_run_until_cancelled_drains_when_not_cancelled() {
        let scheduler = Scheduler::new();
        scheduler.node().then(|| {});

        let token = CancellationToken::new();
        let report = Driver::new(scheduler, fast_config())
            .run_until_cancelled(&token)
            .await
            .unwrap();

        assert_eq!(report.handlers_run, 2);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let scheduler = Scheduler::new();
        scheduler.node();
        let report = Driver::new(scheduler, fast_config()).run().await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["passes"], 1);
        assert_eq!(json["handlers_run"], 1);
        assert!(json["elapsed"].is_object());
    }
}
