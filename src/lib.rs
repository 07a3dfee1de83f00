// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;        // driver config + defaults
pub mod driver;        // tokio host loop
pub mod engine;        // nodes, timers, scheduler
pub mod errors;        // error handling
pub mod observability;
pub mod traits;        // clock abstraction
