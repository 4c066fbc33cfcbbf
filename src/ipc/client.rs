//! Controller-side IPC client for driving a running session

use serde::de::DeserializeOwned;
use tokio::io::{ReadHalf, WriteHalf};

use crate::breakpoints::{BreakpointInfo, BreakpointSpec};
use crate::common::error::IpcError;
use crate::common::{Error, Result};
use crate::controller::StatusInfo;
use crate::runtime::RuntimeNode;

use super::protocol::{AwaitResult, Command, Request, Response};
use super::transport::{self, Stream};

/// Client for a session's control socket
///
/// Requests are strictly sequential: each call writes one frame and reads
/// the matching response before returning.
pub struct ControllerClient {
    reader: ReadHalf<Stream>,
    writer: WriteHalf<Stream>,
    next_id: u64,
}

impl ControllerClient {
    /// Connect to the session's control server
    pub async fn connect(session: &str) -> Result<Self> {
        let stream = transport::connect(session).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => Error::SessionNotRunning,
            _ => Error::SessionConnectionFailed(e),
        })?;
        tracing::debug!(session, "connected to control server");

        let (reader, writer) = tokio::io::split(stream);
        Ok(Self {
            reader,
            writer,
            next_id: 1,
        })
    }

    /// Send a command and return its raw result
    pub async fn send_command(&mut self, command: Command) -> Result<serde_json::Value> {
        let name = command.name();
        let response = self.roundtrip(command).await?;

        if response.success {
            return Ok(response.result.unwrap_or(serde_json::json!({})));
        }

        let error = response.error.unwrap_or_else(|| IpcError {
            code: "UNKNOWN".to_string(),
            message: format!("{} failed without an error", name),
        });
        tracing::debug!(command = name, code = %error.code, "command rejected");
        Err(error.into())
    }

    /// Send a command and decode its result
    pub async fn request<T: DeserializeOwned>(&mut self, command: Command) -> Result<T> {
        let name = command.name();
        let value = self.send_command(command).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::SessionCommunication(format!("Malformed {} result: {}", name, e)))
    }

    pub async fn status(&mut self) -> Result<StatusInfo> {
        self.request(Command::Status).await
    }

    /// Call stack, outermost unit first
    pub async fn call_stack(&mut self) -> Result<Vec<RuntimeNode>> {
        self.request(Command::CallStack).await
    }

    pub async fn breakpoints(&mut self) -> Result<Vec<BreakpointInfo>> {
        self.request(Command::BreakpointList).await
    }

    pub async fn add_breakpoint(&mut self, spec: BreakpointSpec) -> Result<BreakpointInfo> {
        self.request(Command::BreakpointAdd { spec }).await
    }

    /// Block until the run pauses or ends, failing with `AwaitTimeout`
    pub async fn await_pause(&mut self, timeout_secs: u64) -> Result<AwaitResult> {
        self.request(Command::Await { timeout_secs }).await.map_err(|e| match e {
            Error::AwaitTimeout(_) => Error::AwaitTimeout(timeout_secs),
            other => other,
        })
    }

    /// Check if the session is responding
    pub async fn ping(&mut self) -> Result<bool> {
        match self.send_command(Command::Status).await {
            Ok(_) => Ok(true),
            Err(Error::SessionNotRunning) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn roundtrip(&mut self, command: Command) -> Result<Response> {
        let id = self.next_id;
        self.next_id += 1;

        transport::send_json(&mut self.writer, &Request { id, command })
            .await
            .map_err(|e| Error::SessionCommunication(e.to_string()))?;

        let response: Response = transport::recv_json(&mut self.reader)
            .await
            .map_err(|e| Error::SessionCommunication(e.to_string()))?;

        if response.id != id {
            return Err(Error::SessionCommunication(format!(
                "Response ID mismatch: expected {}, got {}",
                id, response.id
            )));
        }
        Ok(response)
    }
}
