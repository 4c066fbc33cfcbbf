//! IPC protocol message types
//!
//! Defines the request/response format between a controller and a running
//! session. Uses a simple length-prefixed JSON protocol.

use serde::{Deserialize, Serialize};

use crate::breakpoints::BreakpointSpec;
use crate::common::error::IpcError;
use crate::controller::{PauseInfo, WaitOutcome};

/// IPC request from a controller to the session
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for matching responses
    pub id: u64,
    /// The command to execute
    pub command: Command,
}

/// IPC response from the session to a controller
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response corresponds to
    pub id: u64,
    /// Whether the command succeeded
    pub success: bool,
    /// Result data on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcError>,
}

impl Response {
    /// Create a success response
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: u64, error: IpcError) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(error),
        }
    }

    /// Create a success response with no data
    pub fn ok(id: u64) -> Self {
        Self {
            id,
            success: true,
            result: Some(serde_json::json!({})),
            error: None,
        }
    }
}

/// Commands a controller can send to a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    // === Inspection ===
    /// Run state, depth and current pause
    Status,

    /// Snapshot of the call stack, outermost first
    CallStack,

    // === Breakpoints ===
    /// List all breakpoints
    BreakpointList,

    /// Add a breakpoint
    BreakpointAdd { spec: BreakpointSpec },

    /// Remove one breakpoint, or all of them
    BreakpointRemove { id: Option<String>, all: bool },

    /// Enable a breakpoint
    BreakpointEnable { id: String },

    /// Disable a breakpoint
    BreakpointDisable { id: String },

    /// Flip a breakpoint, addressed by id or by its pattern text
    BreakpointToggle {
        id: String,
        #[serde(default)]
        by_pattern: bool,
    },

    // === Execution Control ===
    /// Resume until the next breakpoint
    Continue,

    /// Pause at the next unit start at any depth
    StepInto,

    /// Run the current unit to completion
    StepOver,

    /// Run until the enclosing unit ends
    StepReturn,

    /// Pause after N unit starts
    Step { count: u32 },

    /// Pause at the next transition
    Pause,

    /// Terminate the run
    Abort,

    // === Async ===
    /// Wait for the next pause
    Await { timeout_secs: u64 },

    // === Shutdown ===
    /// Stop the control server (the run continues)
    Shutdown,
}

impl Command {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::CallStack => "call_stack",
            Self::BreakpointList => "breakpoint_list",
            Self::BreakpointAdd { .. } => "breakpoint_add",
            Self::BreakpointRemove { .. } => "breakpoint_remove",
            Self::BreakpointEnable { .. } => "breakpoint_enable",
            Self::BreakpointDisable { .. } => "breakpoint_disable",
            Self::BreakpointToggle { .. } => "breakpoint_toggle",
            Self::Continue => "continue",
            Self::StepInto => "step_into",
            Self::StepOver => "step_over",
            Self::StepReturn => "step_return",
            Self::Step { .. } => "step",
            Self::Pause => "pause",
            Self::Abort => "abort",
            Self::Await { .. } => "await",
            Self::Shutdown => "shutdown",
        }
    }
}

// === Result types for responses ===

/// Result of `BreakpointRemove`
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResult {
    pub removed: usize,
}

/// Result of `BreakpointToggle`
#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResult {
    pub id: String,
    pub active: bool,
}

/// Result of `Await`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AwaitResult {
    Paused { pause: PauseInfo },
    Finished,
    Aborted,
}

impl AwaitResult {
    /// `None` for a timed out wait
    pub fn from_outcome(outcome: WaitOutcome) -> Option<Self> {
        match outcome {
            WaitOutcome::Paused(pause) => Some(Self::Paused { pause }),
            WaitOutcome::Finished => Some(Self::Finished),
            WaitOutcome::Aborted => Some(Self::Aborted),
            WaitOutcome::TimedOut => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Phase;

    #[test]
    fn test_command_wire_format() {
        let json = r#"{"type":"breakpoint_add","spec":{"type":"call_stack","patterns":["S*","Log"],"phase":"done"}}"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        match cmd {
            Command::BreakpointAdd {
                spec: BreakpointSpec::CallStack { patterns, phase, id },
            } => {
                assert_eq!(patterns, vec!["S*", "Log"]);
                assert_eq!(phase, Phase::Done);
                assert!(id.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_toggle_defaults_to_id() {
        let cmd: Command =
            serde_json::from_str(r#"{"type":"breakpoint_toggle","id":"bp1"}"#).unwrap();
        assert!(matches!(cmd, Command::BreakpointToggle { by_pattern: false, .. }));
        assert_eq!(cmd.name(), "breakpoint_toggle");
    }

    #[test]
    fn test_await_result_tagging() {
        let value = serde_json::to_value(AwaitResult::Finished).unwrap();
        assert_eq!(value["outcome"], "finished");
        assert!(AwaitResult::from_outcome(WaitOutcome::TimedOut).is_none());
    }
}
