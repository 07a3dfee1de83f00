// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and,
//! where the event carries fields worth indexing, [`StructuredLog`] to emit
//! those fields alongside the message at the right level.
//!
//! # Organization
//!
//! * `node` - Node lifecycle: registration, settlement, splicing, cascades, timers
//! * `engine` - Scheduler passes and host driver progress
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_tickwork::observability::messages::engine::PassCompleted;
//! use the_tickwork::observability::messages::StructuredLog;
//!
//! let msg = PassCompleted {
//!     visited: 4,
//!     ticked: 2,
//!     gated: 1,
//!     removed: 2,
//!     remaining: 2,
//! };
//!
//! msg.log();
//! ```

use std::fmt::Display;
use tracing::Span;

pub mod engine;
pub mod node;

/// A message that knows its own level and structured fields.
pub trait StructuredLog: Display {
    /// Emit the message as a tracing event with its fields attached.
    fn log(&self);

    /// Open a span carrying the same fields, for work scoped to this event.
    fn span(&self, name: &str) -> Span;
}
