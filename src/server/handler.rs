//! Command handler for processing IPC requests
//!
//! Translates IPC commands into controller operations.

use std::time::Duration;

use serde_json::json;

use crate::common::{error::IpcError, Error, Result};
use crate::controller::ExecutionController;
use crate::ipc::protocol::{AwaitResult, Command, RemoveResult, Response, ToggleResult};

/// Handle an IPC command
pub async fn handle_command(controller: &ExecutionController, id: u64, command: Command) -> Response {
    let name = command.name();
    match handle_command_inner(controller, command).await {
        Ok(result) => Response::success(id, result),
        Err(e) => {
            tracing::debug!(command = name, error = %e, "command failed");
            Response::error(id, IpcError::from(&e))
        }
    }
}

async fn handle_command_inner(controller: &ExecutionController, command: Command) -> Result<serde_json::Value> {
    match command {
        // === Inspection ===
        Command::Status => Ok(serde_json::to_value(controller.status())?),

        Command::CallStack => Ok(serde_json::to_value(controller.call_stack())?),

        // === Breakpoints ===
        Command::BreakpointList => Ok(serde_json::to_value(controller.breakpoints())?),

        Command::BreakpointAdd { spec } => Ok(serde_json::to_value(controller.add_spec(&spec)?)?),

        Command::BreakpointRemove { id, all } => {
            let removed = if all {
                controller.remove_all()
            } else {
                let id = id.ok_or_else(|| Error::Internal("breakpoint id or --all required".to_string()))?;
                controller.remove(&id)?;
                1
            };
            Ok(serde_json::to_value(RemoveResult { removed })?)
        }

        Command::BreakpointEnable { id } => Ok(serde_json::to_value(controller.enable(&id)?)?),

        Command::BreakpointDisable { id } => Ok(serde_json::to_value(controller.disable(&id)?)?),

        Command::BreakpointToggle { id, by_pattern } => {
            let id = if by_pattern {
                controller
                    .find_by_pattern(&id)
                    .ok_or(Error::BreakpointNotFound(id))?
            } else {
                id
            };
            let active = controller.toggle(&id)?;
            Ok(serde_json::to_value(ToggleResult { id, active })?)
        }

        // === Execution Control ===
        Command::Continue => {
            controller.resume()?;
            Ok(json!({ "state": "running" }))
        }

        Command::StepInto => {
            controller.step_into()?;
            Ok(json!({ "state": "running" }))
        }

        Command::StepOver => {
            controller.step_over()?;
            Ok(json!({ "state": "running" }))
        }

        Command::StepReturn => {
            controller.step_return()?;
            Ok(json!({ "state": "running" }))
        }

        Command::Step { count } => {
            controller.step(count)?;
            Ok(json!({ "state": "running", "count": count }))
        }

        Command::Pause => {
            controller.pause()?;
            Ok(json!({ "state": "pause_requested" }))
        }

        Command::Abort => {
            controller.abort()?;
            Ok(json!({ "state": "aborted" }))
        }

        // === Async ===
        Command::Await { timeout_secs } => {
            // The wait blocks on a condvar, keep it off the async workers
            let waiter = controller.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                waiter.wait_for_pause(Some(Duration::from_secs(timeout_secs)))
            })
            .await
            .map_err(|e| Error::Internal(format!("await task failed: {}", e)))?;

            let result = AwaitResult::from_outcome(outcome).ok_or(Error::AwaitTimeout(timeout_secs))?;
            Ok(serde_json::to_value(result)?)
        }

        // Handled by the connection loop
        Command::Shutdown => Ok(json!({})),
    }
}
