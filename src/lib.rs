//! rdb - breakpoint debugger for keyword-driven test runs
//!
//! A host engine reports every suite, case and keyword transition to an
//! [`ExecutionController`], which suspends the engine's thread whenever a
//! breakpoint matches the current call stack. A controller on another thread,
//! or another process through the control server, inspects the stack and
//! resumes or steps the run.

pub mod breakpoints;
pub mod cli;
pub mod commands;
pub mod common;
pub mod controller;
pub mod host;
pub mod ipc;
pub mod runtime;
pub mod server;
pub mod testing;

// Re-export commonly used types for tests and embedders
pub use breakpoints::{BreakPoint, BreakpointInfo, BreakpointSpec, PredicateError, StackPredicate};
pub use common::{Error, Result};
pub use controller::{DebugListener, ExecutionController, PauseInfo, Resumption, WaitOutcome};
pub use host::{DebugSession, HostAdapter};
pub use ipc::protocol::Command;
pub use runtime::{Attributes, NodeId, Phase, RuntimeNode, UnitKind};
pub use server::{DebugServer, ServerHandle, ServerOptions};
