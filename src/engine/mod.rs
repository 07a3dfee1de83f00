pub mod handler;
pub mod node;
pub mod scheduler;
pub mod timer;

pub use handler::{AutoShape, Handler, HandlerKind, IntoHandler, ManualShape};
pub use node::{Node, NodeId, NodeState, Payload};
pub use scheduler::{NodeSnapshot, PassStats, Scheduler};
pub use timer::TimerNode;
