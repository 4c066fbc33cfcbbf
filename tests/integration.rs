//! End-to-end integration tests for rdb
//!
//! These tests verify the complete debugging workflow by:
//! 1. Replaying a unit tree through the host adapter on an execution thread
//! 2. Driving the controller in-process and over the control socket
//! 3. Running the YAML scenarios and the CLI binary

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use rdb::controller::{RunState, StatusInfo};
use rdb::ipc::protocol::{AwaitResult, Command as IpcCommand};
use rdb::ipc::ControllerClient;
use rdb::{
    Attributes, BreakpointInfo, BreakpointSpec, DebugServer, Error, ExecutionController, HostAdapter, Phase,
    RuntimeNode, ServerOptions, WaitOutcome,
};

/// Test context with paths and cleanup
struct TestContext {
    /// Temporary directory for this test
    temp_dir: tempfile::TempDir,
    /// Path to the rdb binary
    rdb_bin: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().expect("Failed to create temp dir"),
            rdb_bin: PathBuf::from(env!("CARGO_BIN_EXE_rdb")),
        }
    }

    /// Socket path private to this test
    fn session(&self, name: &str) -> String {
        self.temp_dir
            .path()
            .join(format!("{}.sock", name))
            .to_string_lossy()
            .into_owned()
    }

    /// Run an rdb command with config isolated to the temp dir
    fn run_rdb(&self, args: &[&str]) -> RdbOutput {
        let output = Command::new(&self.rdb_bin)
            .args(args)
            .env("XDG_CONFIG_HOME", self.temp_dir.path().join("config"))
            .env("XDG_DATA_HOME", self.temp_dir.path().join("data"))
            .env("XDG_RUNTIME_DIR", self.temp_dir.path().join("runtime"))
            .output()
            .expect("Failed to run rdb");

        RdbOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }
}

/// Output from an rdb command
#[derive(Debug)]
struct RdbOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

/// Run Root > Login > [Open Browser, Input Text > Click] on a new thread
fn spawn_run(host: HostAdapter) -> thread::JoinHandle<rdb::Result<()>> {
    thread::spawn(move || {
        let result = (|| {
            host.start_suite("Root", Attributes::new())?;
            host.start_test("Login", Attributes::new())?;

            host.start_keyword("SeleniumLibrary.Open Browser", Attributes::new().with("args", vec!["chrome"]))?;
            host.end_keyword("SeleniumLibrary.Open Browser", Attributes::new().with("status", "PASS"))?;

            // The debugger's own keywords stay off the stack
            host.start_keyword("RDB.Break Here", Attributes::new())?;
            host.end_keyword("RDB.Break Here", Attributes::new())?;

            host.start_keyword("Input Text", Attributes::new())?;
            host.start_keyword("Click", Attributes::new())?;
            host.end_keyword("Click", Attributes::new().with("status", "PASS"))?;
            host.end_keyword("Input Text", Attributes::new().with("status", "PASS"))?;

            host.end_test("Login", Attributes::new().with("status", "PASS"))?;
            host.end_suite("Root", Attributes::new().with("status", "PASS"))
        })();
        host.close();
        result
    })
}

fn expect_pause(controller: &ExecutionController) -> rdb::PauseInfo {
    match controller.wait_for_pause(Some(Duration::from_secs(10))) {
        WaitOutcome::Paused(pause) => pause,
        other => panic!("Expected a pause, got {:?}", other),
    }
}

fn names(stack: &[RuntimeNode]) -> Vec<String> {
    stack.iter().map(|n| n.to_string()).collect()
}

// ============== Tests ==============

#[test]
fn test_threaded_run_with_keyword_breakpoint() {
    let controller = ExecutionController::new();
    controller
        .add_spec(&BreakpointSpec::Keyword {
            pattern: "open*".to_string(),
            phase: Phase::Start,
            id: None,
        })
        .unwrap();

    let run = spawn_run(HostAdapter::new(controller.clone()));

    let pause = expect_pause(&controller);
    assert_eq!(pause.unit.to_string(), "keyword:Open Browser");
    assert_eq!(pause.breakpoint.id, "bp1");
    assert_eq!(pause.depth, 3);
    assert_eq!(pause.unit.attributes().get("args"), Some(&serde_json::json!(["chrome"])));
    assert_eq!(
        names(&controller.call_stack()),
        vec!["suite:Root", "case:Login", "keyword:Open Browser"]
    );

    // Over the finished keyword, the hidden one is never seen
    controller.step_over().unwrap();
    let pause = expect_pause(&controller);
    assert_eq!(pause.unit.to_string(), "keyword:Input Text");
    assert_eq!(pause.unit.phase(), Phase::Start);

    controller.step_into().unwrap();
    let pause = expect_pause(&controller);
    assert_eq!(pause.unit.to_string(), "keyword:Click");
    assert_eq!(pause.depth, 4);

    controller.step_return().unwrap();
    let pause = expect_pause(&controller);
    assert_eq!(pause.unit.to_string(), "keyword:Input Text");
    assert_eq!(pause.unit.phase(), Phase::End);
    assert_eq!(pause.unit.attributes().text("status"), "PASS");

    controller.resume().unwrap();
    assert_eq!(controller.wait_for_pause(Some(Duration::from_secs(10))), WaitOutcome::Finished);
    assert!(run.join().unwrap().is_ok());
    assert!(controller.call_stack().is_empty());
    assert_eq!(controller.run_state(), RunState::Finished);
}

#[test]
fn test_abort_surfaces_to_host() {
    let controller = ExecutionController::new();
    controller.pause().unwrap();

    let run = spawn_run(HostAdapter::new(controller.clone()));

    let pause = expect_pause(&controller);
    assert_eq!(pause.unit.to_string(), "suite:Root");
    assert_eq!(pause.breakpoint.id, "pause");

    controller.abort().unwrap();
    assert!(matches!(run.join().unwrap(), Err(Error::RunAborted)));
    assert_eq!(controller.wait_for_pause(Some(Duration::from_secs(1))), WaitOutcome::Aborted);
    assert!(controller.resume().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_control_over_socket() {
    let ctx = TestContext::new();
    let session = ctx.session("e2e");

    let controller = ExecutionController::new();
    let server = DebugServer::spawn(controller.clone(), ServerOptions::new(session.clone())).unwrap();
    assert!(Path::new(&session).exists());

    let mut client = ControllerClient::connect(&session).await.unwrap();
    assert!(client.ping().await.unwrap());

    let info: BreakpointInfo = client
        .request(IpcCommand::BreakpointAdd {
            spec: BreakpointSpec::CallStack {
                patterns: vec!["Login".to_string(), "Click".to_string()],
                phase: Phase::Start,
                id: Some("click".to_string()),
            },
        })
        .await
        .unwrap();
    assert_eq!(info.id, "click");

    // Nothing is paused yet
    let err = client.send_command(IpcCommand::Continue).await.unwrap_err();
    assert!(matches!(err, Error::NotSuspended));

    let run = spawn_run(HostAdapter::new(controller.clone()));

    let result: AwaitResult = client.request(IpcCommand::Await { timeout_secs: 10 }).await.unwrap();
    let pause = match result {
        AwaitResult::Paused { pause } => pause,
        other => panic!("Expected a pause, got {:?}", other),
    };
    assert_eq!(pause.unit.to_string(), "keyword:Click");
    assert_eq!(pause.breakpoint.id, "click");

    let stack: Vec<RuntimeNode> = client.request(IpcCommand::CallStack).await.unwrap();
    assert_eq!(
        names(&stack),
        vec!["suite:Root", "case:Login", "keyword:Input Text", "keyword:Click"]
    );

    let status: StatusInfo = client.request(IpcCommand::Status).await.unwrap();
    assert_eq!(status.state, RunState::Paused);
    assert_eq!(status.depth, 4);

    client.send_command(IpcCommand::Continue).await.unwrap();
    let result: AwaitResult = client.request(IpcCommand::Await { timeout_secs: 10 }).await.unwrap();
    assert_eq!(result, AwaitResult::Finished);

    assert!(tokio::task::spawn_blocking(move || run.join()).await.unwrap().unwrap().is_ok());

    client.send_command(IpcCommand::Shutdown).await.unwrap();
    tokio::task::spawn_blocking(move || server.join()).await.unwrap();
    assert!(!Path::new(&session).exists());
}

#[test]
fn test_scenarios() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("scenarios");
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    paths.sort();
    assert!(!paths.is_empty());

    for path in paths {
        let result = rdb::testing::run_scenario(&path, false).unwrap();
        assert!(
            result.passed,
            "{} failed at step {}: {:?}",
            path.display(),
            result.steps_run,
            result.error
        );
    }
}

#[test]
fn test_status_no_session() {
    let ctx = TestContext::new();
    let session = ctx.session("missing");
    let output = ctx.run_rdb(&["--socket", &session, "status"]);

    assert!(output.success, "stderr: {}", output.stderr);
    assert!(
        output.stdout.contains("not running"),
        "Expected 'not running' in output: {}",
        output.stdout
    );
}

#[test]
fn test_command_without_session_fails() {
    let ctx = TestContext::new();
    let session = ctx.session("missing");
    let output = ctx.run_rdb(&["--socket", &session, "continue"]);

    assert!(!output.success);
    assert!(output.stderr.contains("Error:"), "stderr: {}", output.stderr);
}

#[test]
fn test_cli_runs_scenario() {
    let ctx = TestContext::new();
    let scenario = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("scenarios")
        .join("step_over.yaml");
    let output = ctx.run_rdb(&["test", &scenario.to_string_lossy()]);

    assert!(output.success, "stdout: {}\nstderr: {}", output.stdout, output.stderr);
    assert!(output.stdout.contains("Test Passed"));
}
