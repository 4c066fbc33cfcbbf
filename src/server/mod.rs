//! Control server exposing a controller on a local socket
//!
//! The server runs its own tokio runtime on a background thread so that the
//! host engine's execution thread stays fully synchronous. Each controller
//! connection is served on its own task; the execution thread itself never
//! touches the socket.

mod handler;

use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use interprocess::local_socket::traits::tokio::Listener as ListenerTrait;
use tokio::io::BufReader;
use tokio::sync::watch;

use crate::common::config::Config;
use crate::common::error::IpcError;
use crate::common::{paths, Error, Result};
use crate::controller::ExecutionController;
use crate::ipc::protocol::{Command, Request, Response};
use crate::ipc::transport;

pub use handler::handle_command;

/// Where and how the server listens
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Session name or explicit socket path
    pub session: String,
    /// Drop a connection after this long without a request
    pub client_idle: Duration,
}

impl ServerOptions {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            client_idle: Duration::from_secs(300),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            session: config.server.session.clone(),
            client_idle: Duration::from_secs(config.timeouts.client_idle_secs),
        }
    }
}

/// Entry point for starting a control server
pub struct DebugServer;

impl DebugServer {
    /// Start listening and return once the socket is ready
    pub fn spawn(controller: ExecutionController, options: ServerOptions) -> Result<ServerHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let server_shutdown = Arc::clone(&shutdown_tx);
        let session = options.session.clone();
        let thread = thread::Builder::new()
            .name("rdb-server".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };

                runtime.block_on(async move {
                    // Never take over a socket someone is still answering on
                    if transport::is_live(&options.session).await {
                        let _ = ready_tx.send(Err(Error::SessionInUse(options.session.clone())));
                        return;
                    }

                    let listener = match transport::create_listener(&options.session) {
                        Ok(listener) => listener,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.into()));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    tracing::info!(socket = %paths::socket_name(&options.session), "control server listening");

                    serve(listener, controller, options.client_idle, server_shutdown, shutdown_rx).await;

                    if let Err(e) = paths::remove_socket(&options.session) {
                        tracing::warn!("Failed to remove socket: {}", e);
                    }
                });

                // Pending awaits run on blocking threads that only return at their deadline
                runtime.shutdown_timeout(Duration::from_secs(1));
                tracing::info!("control server stopped");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(ServerHandle {
                session,
                shutdown: shutdown_tx,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::Internal("control server thread exited during startup".to_string()))
            }
        }
    }
}

/// Handle to a running control server; shuts it down when dropped
#[derive(Debug)]
pub struct ServerHandle {
    session: String,
    shutdown: Arc<watch::Sender<bool>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Session name or socket path the server listens on
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Ask the server to stop accepting connections
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Stop the server and wait for its thread to exit
    pub fn join(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("control server thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(
    listener: transport::Listener,
    controller: ExecutionController,
    client_idle: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accept_result = listener.accept() => {
                match accept_result {
                    Ok(stream) => {
                        let connection = Connection {
                            controller: controller.clone(),
                            client_idle,
                            shutdown_tx: Arc::clone(&shutdown_tx),
                            shutdown_rx: shutdown_rx.clone(),
                        };
                        tokio::spawn(async move {
                            if let Err(e) = connection.run(stream).await {
                                tracing::error!("Error handling client: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    }
                }
            }
        }
    }
}

struct Connection {
    controller: ExecutionController,
    client_idle: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Connection {
    /// Serve requests until the client disconnects, idles out, or the
    /// server shuts down
    async fn run(mut self, stream: transport::Stream) -> Result<()> {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        tracing::debug!("Client connected");

        loop {
            let request_data = tokio::select! {
                result = transport::recv_message(&mut reader) => {
                    match result {
                        Ok(data) => data,
                        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                            tracing::debug!("Client disconnected");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("Error reading request: {}", e);
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(self.client_idle) => {
                    tracing::debug!("Client timeout");
                    break;
                }
                _ = self.shutdown_rx.changed() => {
                    break;
                }
            };

            let request: Request = match serde_json::from_slice(&request_data) {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!("Invalid request: {}", e);
                    let response = Response::error(
                        0,
                        IpcError {
                            code: "INVALID_REQUEST".to_string(),
                            message: e.to_string(),
                        },
                    );
                    transport::send_json(&mut writer, &response).await?;
                    continue;
                }
            };

            tracing::debug!(id = request.id, command = request.command.name(), "Received command");

            if matches!(request.command, Command::Shutdown) {
                transport::send_json(&mut writer, &Response::ok(request.id)).await?;
                tracing::info!("Shutdown requested by client");
                self.shutdown_tx.send_replace(true);
                break;
            }

            let response = handle_command(&self.controller, request.id, request.command).await;
            transport::send_json(&mut writer, &response).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_session_not_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("live.sock").to_string_lossy().into_owned();

        let first = DebugServer::spawn(ExecutionController::new(), ServerOptions::new(session.clone())).unwrap();
        let err = DebugServer::spawn(ExecutionController::new(), ServerOptions::new(session.clone())).unwrap_err();
        assert!(matches!(err, Error::SessionInUse(_)));

        first.join();
        assert!(!paths::socket_path(&session).exists());
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_connection() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("frames.sock").to_string_lossy().into_owned();
        let server = DebugServer::spawn(ExecutionController::new(), ServerOptions::new(session.clone())).unwrap();
        assert!(transport::is_live(&session).await);

        let mut stream = transport::connect(&session).await.unwrap();
        transport::send_message(&mut stream, b"{\"id\": 1}").await.unwrap();
        let response: Response = transport::recv_json(&mut stream).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, "INVALID_REQUEST");

        let request = Request { id: 2, command: Command::Status };
        transport::send_json(&mut stream, &request).await.unwrap();
        let response: Response = transport::recv_json(&mut stream).await.unwrap();
        assert_eq!(response.id, 2);
        assert!(response.success);

        drop(stream);
        server.join();
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_socket_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"").unwrap();

        let session = path.to_string_lossy().into_owned();
        let server = DebugServer::spawn(ExecutionController::new(), ServerOptions::new(session)).unwrap();
        assert!(path.exists());
        server.join();
    }
}
