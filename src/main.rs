// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::time::Duration;

use anyhow::Context;
use the_tickwork::config::{load_and_validate_config, DriverConfig};
use the_tickwork::driver::Driver;
use the_tickwork::engine::{Node, Scheduler};
use tracing_subscriber::EnvFilter;

/// Build the demo graph:
///
/// ```text
/// hello -> i'll reject -> bye -> returning delay -> should resolve after
///              |            |          |
///        (before bye)  (3s timer)  (7s timer)
/// ```
///
/// The second node tail-calls into a fresh handler and then tries to reject,
/// which is ignored because it already resolved. `bye` settles itself from a
/// timer three seconds later, and `returning delay` hands its children to a
/// seven second timer.
fn build_demo(scheduler: &Scheduler) -> Node {
    let hello = scheduler.node_with(|n: &Node| {
        tracing::info!("hello");
        n.resolve();
    });

    let rejecter = hello
        .then(|n: &Node| {
            tracing::info!("i'll reject");
            n.resolve_with_handler(|next: &Node| {
                tracing::info!("before bye");
                next.resolve();
            });
            n.reject();
        })
        .labeled("rejecter");

    let s = scheduler.clone();
    let hanger = rejecter
        .then(move |n: &Node| {
            tracing::info!("bye");
            let outer = n.clone();
            s.timer_with(Duration::from_secs(3), move |t: &Node| {
                tracing::info!("done");
                t.resolve();
                outer.resolve();
            });
        })
        .labeled("hanger");

    let s = scheduler.clone();
    hanger
        .then(move |n: &Node| {
            tracing::info!("returning delay");
            n.resolve_with(&s.timer(Duration::from_secs(7)));
        })
        .then(|| tracing::info!("should resolve after"))
        .labeled("tail")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [driver-config.(yaml|toml)]", args[0]);
        std::process::exit(1);
    }

    let config = match args.get(1) {
        Some(path) => load_and_validate_config(path)
            .with_context(|| format!("failed to load driver config from {}", path))?,
        None => DriverConfig::default(),
    };

    let scheduler = Scheduler::new();
    let tail = build_demo(&scheduler);

    let driver = Driver::new(scheduler, config);
    let report = driver.run().await.context("demo graph did not drain")?;

    tracing::info!(tail = %tail.id(), state = %tail.state(), "demo finished");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
