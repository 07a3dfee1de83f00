// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Log events emitted by the scheduler and the host driver.
//!
//! Every event the crate logs is a small struct under [`messages`]. The
//! struct's `Display` output is the human-readable line, and its fields are
//! attached to the tracing event as well, so `node_id` or `active_count` can be
//! filtered on without parsing text. Node lifecycle events stay at `debug!`
//! and below, apart from the warning for settling a node twice. Driver start,
//! finish, stalls and active-set changes are logged at `info!` or higher.
//!
//! # Layout
//!
//! * `messages::node` - Node registration, settlement, splicing and cascades
//! * `messages::engine` - Scheduler passes and driver lifecycle
//!
//! # Usage
//!
//! ```rust
//! use the_tickwork::engine::NodeId;
//! use the_tickwork::observability::messages::node::NodeSpliced;
//!
//! let msg = NodeSpliced {
//!     node_id: NodeId(2),
//!     continuation_id: NodeId(9),
//!     moved_children: 1,
//! };
//!
//! tracing::debug!("{}", msg);
//! ```
//!
//! Installing a subscriber is left to the host binary; the library only emits events.

pub mod messages;
