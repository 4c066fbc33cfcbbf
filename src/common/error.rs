//! Error types for the debugger
//!
//! Errors fall into four groups: host contract violations (fatal to the run),
//! command errors reported back to the issuing controller, transport errors
//! between the CLI and a running session, and configuration/IO failures.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the debugger
#[derive(Error, Debug)]
pub enum Error {
    // === Host Contract Violations ===
    #[error("Host contract violation: {0}")]
    ContractViolation(String),

    #[error("Call stack is empty")]
    EmptyCallStack,

    #[error("Phase of {unit} cannot move from {from} back to {to}")]
    PhaseRegression {
        unit: String,
        from: String,
        to: String,
    },

    #[error("Run aborted by debugger")]
    RunAborted,

    // === Command Errors ===
    #[error("Breakpoint '{0}' not found")]
    BreakpointNotFound(String),

    #[error("Breakpoint '{0}' already exists")]
    DuplicateBreakpoint(String),

    #[error("Invalid step count {0}: must be at least 1")]
    InvalidStepCount(u32),

    #[error("Breakpoints cannot target the '{0}' phase")]
    InvalidTargetPhase(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Execution is not suspended. Use 'rdb pause' or wait for a breakpoint first")]
    NotSuspended,

    #[error("Cannot {action} while execution is {state}")]
    InvalidState { action: String, state: String },

    // === Session/Connection Errors ===
    #[error("No debug session listening. Start the test run with the debugger enabled")]
    SessionNotRunning,

    #[error("Failed to connect to debug session: {0}")]
    SessionConnectionFailed(#[source] io::Error),

    #[error("Session communication error: {0}")]
    SessionCommunication(String),

    #[error("Session '{0}' is already served by another process")]
    SessionInUse(String),

    // === Timeout Errors ===
    #[error("Await timed out after {0} seconds. The run may still be executing - use 'rdb status' to check")]
    AwaitTimeout(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: &str) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a contract violation error
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }

    /// Whether this error must terminate the run rather than be reported
    /// to a controller
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ContractViolation(_)
                | Self::EmptyCallStack
                | Self::PhaseRegression { .. }
                | Self::RunAborted
        )
    }
}

/// IPC-serializable error for session responses
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IpcError {
    pub code: String,
    pub message: String,
}

impl From<&Error> for IpcError {
    fn from(e: &Error) -> Self {
        let code = match e {
            Error::ContractViolation(_) | Error::EmptyCallStack | Error::PhaseRegression { .. } => {
                "CONTRACT_VIOLATION"
            }
            Error::RunAborted => "RUN_ABORTED",
            Error::BreakpointNotFound(_) => "BREAKPOINT_NOT_FOUND",
            Error::DuplicateBreakpoint(_) => "DUPLICATE_BREAKPOINT",
            Error::InvalidStepCount(_) => "INVALID_STEP_COUNT",
            Error::InvalidTargetPhase(_) => "INVALID_TARGET_PHASE",
            Error::InvalidPattern(_) => "INVALID_PATTERN",
            Error::NotSuspended => "NOT_SUSPENDED",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::AwaitTimeout(_) => "TIMEOUT",
            _ => "INTERNAL_ERROR",
        }
        .to_string();

        Self {
            code,
            message: e.to_string(),
        }
    }
}

impl From<IpcError> for Error {
    fn from(e: IpcError) -> Self {
        // Map IPC errors back to our error types where the payload survives
        match e.code.as_str() {
            "NOT_SUSPENDED" => Error::NotSuspended,
            "RUN_ABORTED" => Error::RunAborted,
            "TIMEOUT" => Error::AwaitTimeout(0),
            _ => Error::SessionCommunication(e.message),
        }
    }
}
