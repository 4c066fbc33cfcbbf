//! Test runner implementation
//!
//! Replays a scenario's unit tree through a `HostAdapter` on an execution
//! thread while the scenario steps drive the controller from the calling
//! thread, through the same command handler the control server uses.

use std::path::Path;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use tokio::runtime::Runtime;

use crate::breakpoints::BreakpointSpec;
use crate::common::{Error, Result};
use crate::controller::{ExecutionController, WaitOutcome};
use crate::host::HostAdapter;
use crate::ipc::protocol::{AwaitResult, Command, Response};
use crate::runtime::{NodeId, Phase, RuntimeNode, UnitKind};
use crate::server::handle_command;

use super::config::{CommandExpectation, TestScenario, TestStep, UnitSpec};

/// Default wait for pause/finish expectations
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Result of a test run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// Run a test scenario from a YAML file
pub fn run_scenario(path: &Path, verbose: bool) -> Result<TestResult> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;

    let scenario: TestScenario = serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))?;

    run(scenario, verbose)
}

/// Run an already parsed scenario
pub fn run(scenario: TestScenario, verbose: bool) -> Result<TestResult> {
    let steps_total = scenario.steps.len();

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );

    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    for unit in &scenario.run {
        unit.validate()?;
    }

    let controller = ExecutionController::new();
    for spec in &scenario.breakpoints {
        let info = controller.add_spec(spec)?;
        if verbose {
            println!("  {} {}", info.id.dimmed(), info.description.dimmed());
        }
    }
    if scenario.pause_on_start {
        controller.pause()?;
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Execution thread
    let host = HostAdapter::new(controller.clone());
    let units = scenario.run;
    let execution = thread::Builder::new()
        .name("rdb-scenario".to_string())
        .spawn(move || {
            let result = units.iter().try_for_each(|unit| replay(&host, unit));
            host.close();
            result
        })?;

    println!("\n{}", "Steps:".cyan());

    let mut failure = None;
    let mut steps_run = 0;
    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;
        steps_run = step_num;

        if let Err(e) = execute_step(&rt, &controller, step, step_num, verbose) {
            println!("  {} Step {}: {}", "✗".red(), step_num, e);
            failure = Some(e.to_string());
            break;
        }
    }

    // The run must end on its own once the steps are exhausted
    if failure.is_none() {
        match controller.wait_for_pause(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS))) {
            WaitOutcome::Paused(pause) => {
                failure = Some(format!("Run paused at {} after the last step", pause.unit));
            }
            WaitOutcome::TimedOut => {
                failure = Some("Run did not finish after the last step".to_string());
            }
            WaitOutcome::Finished | WaitOutcome::Aborted => {}
        }
    }

    // Never leave the execution thread parked
    if failure.is_some() {
        let _ = controller.abort();
    }

    let replayed = execution
        .join()
        .map_err(|_| Error::Internal("execution thread panicked".to_string()))?;
    if failure.is_none() {
        match replayed {
            Ok(()) | Err(Error::RunAborted) => {}
            Err(e) => failure = Some(format!("run failed: {}", e)),
        }
    }

    if let Some(error) = failure {
        return Ok(TestResult {
            name: scenario.name,
            passed: false,
            steps_run,
            steps_total,
            error: Some(error),
        });
    }

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Test Passed".green().bold()
    );

    Ok(TestResult {
        name: scenario.name,
        passed: true,
        steps_run: steps_total,
        steps_total,
        error: None,
    })
}

/// Drive one unit and its children through the adapter
fn replay(host: &HostAdapter, unit: &UnitSpec) -> Result<()> {
    let (kind, name) = unit.identity()?;

    match kind {
        UnitKind::Suite => host.start_suite(name, unit.start_attributes())?,
        UnitKind::Case => host.start_test(name, unit.start_attributes())?,
        UnitKind::Keyword => host.start_keyword(name, unit.start_attributes())?,
    }

    for child in &unit.children {
        replay(host, child)?;
    }

    match kind {
        UnitKind::Suite => host.end_suite(name, unit.end_attributes()),
        UnitKind::Case => host.end_test(name, unit.end_attributes()),
        UnitKind::Keyword => host.end_keyword(name, unit.end_attributes()),
    }
}

/// Execute a single test step
fn execute_step(
    rt: &Runtime,
    controller: &ExecutionController,
    step: &TestStep,
    step_num: usize,
    verbose: bool,
) -> Result<()> {
    match step {
        TestStep::Command { command, expect } => {
            execute_command_step(rt, controller, command, expect.as_ref(), step_num)
        }
        TestStep::ExpectPause {
            timeout,
            unit,
            phase,
            breakpoint,
            depth,
        } => {
            let expected = PauseExpectation {
                unit: unit.as_deref(),
                phase: *phase,
                breakpoint: breakpoint.as_deref(),
                depth: *depth,
            };
            execute_pause_step(rt, controller, *timeout, &expected, step_num, verbose)
        }
        TestStep::ExpectStack { stack } => execute_stack_step(rt, controller, stack, step_num),
        TestStep::ExpectFinished { timeout, aborted } => {
            execute_finished_step(rt, controller, *timeout, *aborted, step_num)
        }
    }
}

fn send(rt: &Runtime, controller: &ExecutionController, command: Command) -> Response {
    rt.block_on(handle_command(controller, 0, command))
}

fn into_result(response: Response) -> Result<serde_json::Value> {
    match response.error {
        Some(error) => Err(error.into()),
        None => Ok(response.result.unwrap_or_default()),
    }
}

/// Execute a command step
fn execute_command_step(
    rt: &Runtime,
    controller: &ExecutionController,
    command_str: &str,
    expect: Option<&CommandExpectation>,
    step_num: usize,
) -> Result<()> {
    let cmd = parse_command(command_str)?;
    let response = send(rt, controller, cmd);

    let expect_failure = expect
        .map(|e| e.success == Some(false) || e.error_code.is_some())
        .unwrap_or(false);

    if let Some(exp) = expect {
        if let Some(should_succeed) = exp.success {
            if should_succeed != response.success {
                return Err(Error::TestAssertion(format!(
                    "Command '{}' expected success={}, got success={}",
                    command_str, should_succeed, response.success
                )));
            }
        }
        if let Some(code) = &exp.error_code {
            let actual = response.error.as_ref().map(|e| e.code.as_str()).unwrap_or("none");
            if actual != code {
                return Err(Error::TestAssertion(format!(
                    "Command '{}' expected error {}, got {}",
                    command_str, code, actual
                )));
            }
        }
    }

    if expect_failure {
        println!(
            "  {} Step {}: {} (expected failure)",
            "✓".green(),
            step_num,
            command_str.dimmed()
        );
        return Ok(());
    }

    into_result(response)?;

    println!(
        "  {} Step {}: {}",
        "✓".green(),
        step_num,
        command_str.dimmed()
    );

    Ok(())
}

struct PauseExpectation<'a> {
    unit: Option<&'a str>,
    phase: Option<Phase>,
    breakpoint: Option<&'a str>,
    depth: Option<usize>,
}

/// Wait for a pause and check where it happened
fn execute_pause_step(
    rt: &Runtime,
    controller: &ExecutionController,
    timeout: Option<u64>,
    expect: &PauseExpectation<'_>,
    step_num: usize,
    verbose: bool,
) -> Result<()> {
    let timeout_secs = timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
    let result = into_result(send(rt, controller, Command::Await { timeout_secs }))?;
    let outcome: AwaitResult = serde_json::from_value(result)
        .map_err(|e| Error::TestAssertion(format!("Failed to parse await result: {}", e)))?;

    let pause = match outcome {
        AwaitResult::Paused { pause } => pause,
        other => {
            return Err(Error::TestAssertion(format!(
                "Expected a pause, run ended instead ({:?})",
                other
            )))
        }
    };

    if let Some(unit) = expect.unit {
        let actual = pause.unit.to_string();
        if actual != unit {
            return Err(Error::TestAssertion(format!(
                "Expected pause at '{}', got '{}'",
                unit, actual
            )));
        }
    }

    if let Some(phase) = expect.phase {
        if pause.unit.phase() != phase {
            return Err(Error::TestAssertion(format!(
                "Expected phase {}, got {}",
                phase,
                pause.unit.phase()
            )));
        }
    }

    if let Some(id) = expect.breakpoint {
        if pause.breakpoint.id != id {
            return Err(Error::TestAssertion(format!(
                "Expected breakpoint '{}', got '{}'",
                id, pause.breakpoint.id
            )));
        }
    }

    if let Some(depth) = expect.depth {
        if pause.depth != depth {
            return Err(Error::TestAssertion(format!(
                "Expected depth {}, got {}",
                depth, pause.depth
            )));
        }
    }

    println!(
        "  {} Step {}: paused ({} at {})",
        "✓".green(),
        step_num,
        pause.breakpoint.id.dimmed(),
        format!("{} {}", pause.unit, pause.unit.phase()).dimmed()
    );
    if verbose {
        println!("      {}", pause.breakpoint.description.dimmed());
    }

    Ok(())
}

/// Compare the call stack
fn execute_stack_step(
    rt: &Runtime,
    controller: &ExecutionController,
    expected: &[String],
    step_num: usize,
) -> Result<()> {
    let result = into_result(send(rt, controller, Command::CallStack))?;
    let stack: Vec<RuntimeNode> = serde_json::from_value(result)?;
    let actual: Vec<String> = stack.iter().map(|n| n.to_string()).collect();

    if actual != expected {
        return Err(Error::TestAssertion(format!(
            "Expected stack [{}], got [{}]",
            expected.join(", "),
            actual.join(", ")
        )));
    }

    println!(
        "  {} Step {}: stack [{}]",
        "✓".green(),
        step_num,
        actual.join(" > ").dimmed()
    );

    Ok(())
}

/// Wait for the run to end
fn execute_finished_step(
    rt: &Runtime,
    controller: &ExecutionController,
    timeout: Option<u64>,
    aborted: bool,
    step_num: usize,
) -> Result<()> {
    let timeout_secs = timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
    let result = into_result(send(rt, controller, Command::Await { timeout_secs }))?;
    let outcome: AwaitResult = serde_json::from_value(result)
        .map_err(|e| Error::TestAssertion(format!("Failed to parse await result: {}", e)))?;

    let expected = if aborted { AwaitResult::Aborted } else { AwaitResult::Finished };
    match outcome {
        AwaitResult::Paused { pause } => {
            return Err(Error::TestAssertion(format!(
                "Expected the run to end, paused at {} instead",
                pause.unit
            )))
        }
        other if other != expected => {
            return Err(Error::TestAssertion(format!(
                "Expected {:?}, got {:?}",
                expected, other
            )))
        }
        _ => {}
    }

    println!(
        "  {} Step {}: run {}",
        "✓".green(),
        step_num,
        if aborted { "aborted" } else { "finished" }.dimmed()
    );

    Ok(())
}

/// Parse a command string into a controller command
fn parse_command(s: &str) -> Result<Command> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    if parts.is_empty() {
        return Err(Error::Config("Empty command".to_string()));
    }

    let cmd = parts[0].to_lowercase();
    let args = &parts[1..];

    match cmd.as_str() {
        "continue" | "c" => Ok(Command::Continue),
        "into" | "s" => Ok(Command::StepInto),
        "over" | "n" => Ok(Command::StepOver),
        "return" | "finish" => Ok(Command::StepReturn),
        "step" => {
            let count = match args.first() {
                Some(n) => n
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid step count: {}", n)))?,
                None => 1,
            };
            Ok(Command::Step { count })
        }
        "pause" => Ok(Command::Pause),
        "abort" => Ok(Command::Abort),
        "status" => Ok(Command::Status),
        "stack" | "bt" => Ok(Command::CallStack),
        "break" | "b" => parse_break(args),
        _ => Err(Error::Config(format!("Unknown command: {}", cmd))),
    }
}

/// Parse `break <subcommand> ...`
fn parse_break(args: &[&str]) -> Result<Command> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(Error::Config("break command requires a subcommand".to_string()));
    };

    // Split --phase/--id flags from positional arguments
    let mut positional = Vec::new();
    let mut phase = None;
    let mut id = None;
    let mut all = false;
    let mut by_pattern = false;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "--phase" => {
                let value = iter
                    .next()
                    .ok_or_else(|| Error::Config("--phase needs a value".to_string()))?;
                phase = Some(value.parse::<Phase>()?);
            }
            "--id" => {
                let value = iter
                    .next()
                    .ok_or_else(|| Error::Config("--id needs a value".to_string()))?;
                id = Some(value.to_string());
            }
            "--all" => all = true,
            "--pattern" => by_pattern = true,
            other => positional.push(other.to_string()),
        }
    }

    let single = |what: &str| -> Result<String> {
        if positional.is_empty() {
            return Err(Error::Config(format!("break {} requires {}", sub, what)));
        }
        Ok(positional.join(" "))
    };

    match *sub {
        "add" => Ok(Command::BreakpointAdd {
            spec: BreakpointSpec::Keyword {
                pattern: single("a pattern")?,
                phase: phase.unwrap_or(Phase::Start),
                id,
            },
        }),
        "stack" => {
            if positional.is_empty() {
                return Err(Error::Config("break stack requires patterns".to_string()));
            }
            Ok(Command::BreakpointAdd {
                spec: BreakpointSpec::CallStack {
                    patterns: positional.clone(),
                    phase: phase.unwrap_or(Phase::Start),
                    id,
                },
            })
        }
        "unit" => {
            let node = single("a unit number")?;
            let node = node
                .trim_start_matches('#')
                .parse()
                .map_err(|_| Error::Config(format!("Invalid unit number: {}", node)))?;
            Ok(Command::BreakpointAdd {
                spec: BreakpointSpec::Runtime {
                    node: NodeId(node),
                    phase: phase.unwrap_or(Phase::End),
                    id,
                },
            })
        }
        "list" => Ok(Command::BreakpointList),
        "remove" => Ok(Command::BreakpointRemove {
            id: positional.first().cloned(),
            all,
        }),
        "enable" => Ok(Command::BreakpointEnable { id: single("an id")? }),
        "disable" => Ok(Command::BreakpointDisable { id: single("an id")? }),
        "toggle" => Ok(Command::BreakpointToggle {
            id: single("an id or pattern")?,
            by_pattern,
        }),
        other => Err(Error::Config(format!("Unknown break subcommand: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_step_commands() {
        assert!(matches!(parse_command("over").unwrap(), Command::StepOver));
        assert!(matches!(parse_command("finish").unwrap(), Command::StepReturn));
        assert!(matches!(parse_command("step 3").unwrap(), Command::Step { count: 3 }));
        assert!(matches!(parse_command("step").unwrap(), Command::Step { count: 1 }));
        assert!(parse_command("step x").is_err());
        assert!(parse_command("jump").is_err());
    }

    #[test]
    fn test_parse_break_commands() {
        match parse_command("break add Get* --phase done --id g").unwrap() {
            Command::BreakpointAdd {
                spec: BreakpointSpec::Keyword { pattern, phase, id },
            } => {
                assert_eq!(pattern, "Get*");
                assert_eq!(phase, Phase::Done);
                assert_eq!(id.as_deref(), Some("g"));
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse_command("break stack suite:Root * Click").unwrap() {
            Command::BreakpointAdd {
                spec: BreakpointSpec::CallStack { patterns, .. },
            } => assert_eq!(patterns, vec!["suite:Root", "*", "Click"]),
            other => panic!("unexpected {:?}", other),
        }

        // Keyword names may contain spaces
        match parse_command("break add Open Browser").unwrap() {
            Command::BreakpointAdd {
                spec: BreakpointSpec::Keyword { pattern, .. },
            } => assert_eq!(pattern, "Open Browser"),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            parse_command("break toggle Log* --pattern").unwrap(),
            Command::BreakpointToggle { by_pattern: true, .. }
        ));
        assert!(matches!(
            parse_command("break remove --all").unwrap(),
            Command::BreakpointRemove { id: None, all: true }
        ));
        assert!(parse_command("break add").is_err());
        assert!(parse_command("break add X --phase running").is_ok());
    }
}
