//! Runtime model: execution units and the call stack mirroring their nesting

mod node;
mod stack;

pub use node::{Attributes, NodeId, Phase, RuntimeNode, UnitKind};
pub use stack::CallStack;
