// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Node handlers and their shape-based selection.
//!
//! A node runs one of three strategies when it is first ticked:
//!
//! * [`Handler::Manual`] - receives the node itself and is responsible for
//!   eventually calling `resolve*`/`reject*` on it (or never doing so).
//! * [`Handler::Auto`] - receives nothing; the node resolves as soon as it returns.
//! * [`Handler::None`] - the node resolves immediately.
//!
//! Closures are turned into the right variant by their signature through
//! [`IntoHandler`], so `|node: &Node| ...` becomes manual and `|| ...` becomes
//! automatic without the caller naming the variant.

use std::fmt;

use super::node::Node;

/// Marker for closures of shape `FnOnce(&Node)`.
pub struct ManualShape;

/// Marker for closures of shape `FnOnce()`.
pub struct AutoShape;

/// Execution strategy of a node. Consumed the first time the node is ticked.
#[derive(Default)]
pub enum Handler {
    Manual(Box<dyn FnOnce(&Node)>),
    Auto(Box<dyn FnOnce()>),
    #[default]
    None,
}

impl Handler {
    pub fn manual(f: impl FnOnce(&Node) + 'static) -> Self {
        Handler::Manual(Box::new(f))
    }

    pub fn auto(f: impl FnOnce() + 'static) -> Self {
        Handler::Auto(Box::new(f))
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::Manual(_) => HandlerKind::Manual,
            Handler::Auto(_) => HandlerKind::Auto,
            Handler::None => HandlerKind::None,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.kind())
    }
}

/// Payload-free view of [`Handler`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Manual,
    Auto,
    None,
}

/// Conversion into a [`Handler`], chosen by the closure's shape.
///
/// The `Marker` parameter only exists to keep the blanket impls for the two
/// closure shapes from overlapping; callers never name it.
///
/// # Examples
/// ```
/// use the_tickwork::engine::{Handler, HandlerKind, IntoHandler, Node};
///
/// let manual = (|node: &Node| node.resolve()).into_handler();
/// let auto = (|| println!("step")).into_handler();
///
/// assert_eq!(manual.kind(), HandlerKind::Manual);
/// assert_eq!(auto.kind(), HandlerKind::Auto);
/// assert_eq!(Handler::None.into_handler().kind(), HandlerKind::None);
/// ```
pub trait IntoHandler<Marker> {
    fn into_handler(self) -> Handler;
}

impl<F> IntoHandler<ManualShape> for F
where
    F: FnOnce(&Node) + 'static,
{
    fn into_handler(self) -> Handler {
        Handler::Manual(Box::new(self))
    }
}

impl<F> IntoHandler<AutoShape> for F
where
    F: FnOnce() + 'static,
{
    fn into_handler(self) -> Handler {
        Handler::Auto(Box::new(self))
    }
}

impl IntoHandler<()> for Handler {
    fn into_handler(self) -> Handler {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_shape_selects_variant() {
        assert_eq!(
            (|n: &Node| n.resolve()).into_handler().kind(),
            HandlerKind::Manual
        );
        assert_eq!((|| {}).into_handler().kind(), HandlerKind::Auto);
    }

    #[test]
    fn default_is_none() {
        assert_eq!(Handler::default().kind(), HandlerKind::None);
        assert_eq!(format!("{:?}", Handler::default()), "Handler::None");
    }

    #[test]
    fn explicit_handler_passes_through() {
        let handler = Handler::auto(|| {});
        assert_eq!(handler.into_handler().kind(), HandlerKind::Auto);
    }
}
