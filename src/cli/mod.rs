//! CLI command handling
//!
//! Dispatches CLI commands to a running session and formats output.

use std::path::Path;

use crate::breakpoints::{BreakpointInfo, BreakpointSpec};
use crate::commands::{BreakCommands, Commands};
use crate::common::config::Config;
use crate::common::paths::DEFAULT_SESSION;
use crate::common::{logging, Error, Result};
use crate::controller::{PauseInfo, RunState, StatusInfo};
use crate::ipc::protocol::{AwaitResult, Command, RemoveResult, ToggleResult};
use crate::ipc::ControllerClient;
use crate::runtime::{NodeId, RuntimeNode};
use crate::testing;

/// Session to talk to: `--socket`, then the config file, then the default
pub fn resolve_session(socket: Option<String>, config: &Config) -> String {
    socket
        .or_else(|| {
            let configured = config.server.session.trim();
            (!configured.is_empty()).then(|| configured.to_string())
        })
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

/// Run a scenario file and report the result
pub fn run_test(path: &Path, verbose: bool) -> Result<()> {
    let result = testing::run_scenario(path, verbose)?;
    if result.passed {
        Ok(())
    } else {
        Err(Error::TestAssertion(format!(
            "'{}' failed at step {}/{}: {}",
            result.name,
            result.steps_run,
            result.steps_total,
            result.error.unwrap_or_default()
        )))
    }
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, socket: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let session = resolve_session(socket, &config);

    match command {
        Commands::Test { path, verbose } => {
            // Replays block on the controller, keep them off the async workers
            tokio::task::spawn_blocking(move || run_test(&path, verbose))
                .await
                .map_err(|e| Error::Internal(e.to_string()))?
        }

        Commands::Logs { lines, clear } => show_logs(lines, clear),

        Commands::Status => {
            match ControllerClient::connect(&session).await {
                Ok(mut client) => {
                    let status = client.status().await?;
                    print_status(&status);
                }
                Err(Error::SessionNotRunning) => {
                    println!("Session '{}': not running", session);
                }
                Err(e) => return Err(e),
            }
            Ok(())
        }

        Commands::Stack => {
            let mut client = ControllerClient::connect(&session).await?;
            let stack = client.call_stack().await?;

            if stack.is_empty() {
                println!("No units running");
            } else {
                for (depth, node) in stack.iter().enumerate().rev() {
                    print_unit(depth + 1, node);
                }
            }
            Ok(())
        }

        Commands::Break(bp_cmd) => dispatch_break(bp_cmd, &session).await,

        Commands::Continue => {
            let mut client = ControllerClient::connect(&session).await?;
            client.send_command(Command::Continue).await?;
            println!("Continuing execution...");
            Ok(())
        }

        Commands::Into => {
            let mut client = ControllerClient::connect(&session).await?;
            client.send_command(Command::StepInto).await?;
            println!("Stepping into...");
            Ok(())
        }

        Commands::Over => {
            let mut client = ControllerClient::connect(&session).await?;
            client.send_command(Command::StepOver).await?;
            println!("Stepping over...");
            Ok(())
        }

        Commands::Return => {
            let mut client = ControllerClient::connect(&session).await?;
            client.send_command(Command::StepReturn).await?;
            println!("Running to the end of the enclosing unit...");
            Ok(())
        }

        Commands::Step { count } => {
            let mut client = ControllerClient::connect(&session).await?;
            client.send_command(Command::Step { count }).await?;
            println!("Running {} more unit start(s)...", count);
            Ok(())
        }

        Commands::Pause => {
            let mut client = ControllerClient::connect(&session).await?;
            client.send_command(Command::Pause).await?;
            println!("Pause requested, execution stops at the next transition");
            Ok(())
        }

        Commands::Abort => {
            let mut client = ControllerClient::connect(&session).await?;
            client.send_command(Command::Abort).await?;
            println!("Run aborted");
            Ok(())
        }

        Commands::Await { timeout } => {
            let timeout = timeout.unwrap_or(config.timeouts.await_default_secs);
            let mut client = ControllerClient::connect(&session).await?;

            println!("Waiting for execution to pause (timeout: {}s)...", timeout);

            match client.await_pause(timeout).await? {
                AwaitResult::Paused { pause } => print_pause(&pause),
                AwaitResult::Finished => println!("Run finished"),
                AwaitResult::Aborted => println!("Run aborted"),
            }
            Ok(())
        }

        Commands::Shutdown => {
            let mut client = ControllerClient::connect(&session).await?;
            client.send_command(Command::Shutdown).await?;
            println!("Control server for '{}' stopped", session);
            Ok(())
        }
    }
}

async fn dispatch_break(command: BreakCommands, session: &str) -> Result<()> {
    let mut client = ControllerClient::connect(session).await?;

    match command {
        BreakCommands::Add { pattern, phase, id } => {
            let spec = BreakpointSpec::Keyword { pattern, phase, id };
            let info = client.add_breakpoint(spec).await?;
            println!("Breakpoint {} set: {}", info.id, info.description);
        }

        BreakCommands::Stack { patterns, phase, id } => {
            let spec = BreakpointSpec::CallStack { patterns, phase, id };
            let info = client.add_breakpoint(spec).await?;
            println!("Breakpoint {} set: {}", info.id, info.description);
        }

        BreakCommands::Unit { node, phase, id } => {
            let spec = BreakpointSpec::Runtime {
                node: NodeId(node),
                phase,
                id,
            };
            let info = client.add_breakpoint(spec).await?;
            println!("Breakpoint {} set: {}", info.id, info.description);
        }

        BreakCommands::List => {
            let breakpoints = client.breakpoints().await?;

            if breakpoints.is_empty() {
                println!("No breakpoints set");
            } else {
                println!("Breakpoints:");
                for bp in &breakpoints {
                    print_breakpoint(bp);
                }
            }
        }

        BreakCommands::Remove { id, all } => {
            if id.is_none() && !all {
                return Err(Error::Config("Give a breakpoint ID or --all".to_string()));
            }
            let result: RemoveResult = client
                .request(Command::BreakpointRemove { id: id.clone(), all })
                .await?;

            if all {
                println!("{} breakpoint(s) removed", result.removed);
            } else if let Some(id) = id {
                println!("Breakpoint {} removed", id);
            }
        }

        BreakCommands::Enable { id } => {
            client.send_command(Command::BreakpointEnable { id: id.clone() }).await?;
            println!("Breakpoint {} enabled", id);
        }

        BreakCommands::Disable { id } => {
            client.send_command(Command::BreakpointDisable { id: id.clone() }).await?;
            println!("Breakpoint {} disabled", id);
        }

        BreakCommands::Toggle { target, pattern } => {
            let result: ToggleResult = client
                .request(Command::BreakpointToggle {
                    id: target,
                    by_pattern: pattern,
                })
                .await?;
            let state = if result.active { "enabled" } else { "disabled" };
            println!("Breakpoint {} {}", result.id, state);
        }
    }

    Ok(())
}

fn show_logs(lines: usize, clear: bool) -> Result<()> {
    let Some(path) = logging::host_log_path() else {
        return Err(Error::Config("Cannot determine log directory".to_string()));
    };

    if clear {
        if path.exists() {
            std::fs::write(&path, "")?;
        }
        println!("Log file cleared");
        return Ok(());
    }

    if !path.exists() {
        println!("No log file at {}", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{}", line);
    }
    Ok(())
}

fn print_status(status: &StatusInfo) {
    println!("State: {}", status.state);
    println!("Depth: {}", status.depth);
    if let Some(current) = &status.current {
        println!("Current: {} ({})", current, current.phase());
    }
    if let Some(pause) = &status.paused_at {
        println!("Paused by: {} ({})", pause.breakpoint.id, pause.breakpoint.description);
    } else if status.state == RunState::Running {
        println!("Use 'rdb pause' to stop at the next transition");
    }
    println!("Breakpoints: {}", status.breakpoints);
    println!("Pauses so far: {}", status.pauses);
}

fn print_unit(depth: usize, node: &RuntimeNode) {
    println!("{:>3} {} {} [{}]", depth, node.id(), node, node.phase());
    if let Some(args) = node.attributes().get("args") {
        println!("      args = {}", args);
    }
}

fn print_pause(pause: &PauseInfo) {
    println!(
        "Paused #{} at {} ({}), depth {}",
        pause.seq,
        pause.unit,
        pause.unit.phase(),
        pause.depth
    );
    println!("  Breakpoint: {} - {}", pause.breakpoint.id, pause.breakpoint.description);
}

fn print_breakpoint(info: &BreakpointInfo) {
    let status = if info.active { "●" } else { "○" };

    let extras = [
        info.transient.then(|| "step".to_string()),
        info.expired.then(|| "expired".to_string()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ");

    if extras.is_empty() {
        println!("  {} {} {}", status, info.id, info.description);
    } else {
        println!("  {} {} {} ({})", status, info.id, info.description, extras);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_resolution_order() {
        let mut config = Config::default();
        config.server.session = "from-config".to_string();

        assert_eq!(resolve_session(Some("cli".to_string()), &config), "cli");
        assert_eq!(resolve_session(None, &config), "from-config");

        config.server.session = "  ".to_string();
        assert_eq!(resolve_session(None, &config), DEFAULT_SESSION);
    }
}
