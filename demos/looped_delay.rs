// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A loop written as recursion through timers.
//!
//! Each lap waits on a fresh timer, then tail-calls into the next lap with
//! `resolve_with`. The node waiting after the loop only runs once the last lap
//! settles, no matter how many continuations were spliced in between.
//!
//! Run with `cargo run --example looped_delay -- 4`.

use std::env;
use std::time::{Duration, Instant};

use anyhow::Context;
use the_tickwork::config::DriverConfig;
use the_tickwork::driver::Driver;
use the_tickwork::engine::{Node, Scheduler};
use tracing_subscriber::EnvFilter;

const LAP_DELAY: Duration = Duration::from_secs(2);

fn looped_delay(scheduler: &Scheduler, lap: u32, laps: u32) -> Node {
    if lap == laps {
        let done = scheduler.node();
        done.resolve();
        return done;
    }

    let spawner = scheduler.clone();
    scheduler.timer(LAP_DELAY).then(move |n: &Node| {
        tracing::info!(lap = lap + 1, of = laps, "lap finished");
        n.resolve_with(&looped_delay(&spawner, lap + 1, laps));
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let laps: u32 = match env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("lap count must be a number, got {:?}", arg))?,
        None => 4,
    };

    let scheduler = Scheduler::new();
    let begun = Instant::now();

    let s = scheduler.clone();
    scheduler
        .node()
        .then(move |n: &Node| n.resolve_with(&looped_delay(&s, 0, laps)))
        .then(move || tracing::info!(elapsed = ?begun.elapsed(), "loop complete"));

    let config = DriverConfig {
        tick_interval_ms: 50,
        log_active_changes: false,
        ..DriverConfig::default()
    };
    let report = Driver::new(scheduler, config).run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
