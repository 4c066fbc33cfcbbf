//! Logging and tracing configuration
//!
//! Provides structured logging for the CLI and for host processes that embed
//! the debugger. The host logs to a file since its stdout belongs to the
//! test engine.

use std::path::PathBuf;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::paths;

/// Name of the host log file inside the log directory
const HOST_LOG_FILE: &str = "host.log";

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rdb=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing inside a host process (file + stderr logging)
///
/// The host logs to both:
/// 1. `~/.local/share/rdb/logs/host.log`, with thread ids since transitions
///    and controller commands arrive on different threads
/// 2. stderr at warn level for early failures
///
/// Does nothing if the host already installed a global subscriber.
pub fn init_host() -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rdb=debug,info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .with_filter(LevelFilter::WARN);

    if let Some(log_dir) = paths::log_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_layer = fmt::layer()
                .with_writer(tracing_appender::rolling::never(&log_dir, HOST_LOG_FILE))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            let installed = tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(stderr_layer)
                .try_init()
                .is_ok();

            return installed.then(|| log_dir.join(HOST_LOG_FILE));
        }
    }

    // Fallback: stderr only
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true),
        )
        .try_init();

    None
}

/// Get the path to the host log file
pub fn host_log_path() -> Option<PathBuf> {
    paths::log_dir().map(|d| d.join(HOST_LOG_FILE))
}
