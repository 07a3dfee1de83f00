// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod driver;

pub use config::ConfigError;
pub use driver::DriverError;
