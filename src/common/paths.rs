//! Cross-platform socket and configuration paths
//!
//! Unix/macOS: Uses Unix domain sockets at $XDG_RUNTIME_DIR/rdb or /tmp/rdb-<uid>
//! Windows: Uses named pipes at \\.\pipe\rdb-<username>-<session>

use std::io;
use std::path::PathBuf;

/// Application name used for sockets, config and data directories
const APP_NAME: &str = "rdb";

/// Session name used when neither config nor CLI names one
pub const DEFAULT_SESSION: &str = "session";

/// Get the socket/pipe path for a debug session
///
/// A session containing a path separator is taken as an explicit socket path.
#[cfg(unix)]
pub fn socket_path(session: &str) -> PathBuf {
    if session.contains('/') {
        return PathBuf::from(session);
    }
    runtime_dir().join(format!("{}.sock", session))
}

#[cfg(unix)]
fn runtime_dir() -> PathBuf {
    // Try XDG_RUNTIME_DIR first (preferred on Linux)
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_NAME);
    }

    // Fallback to /tmp with uid for security
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid))
}

#[cfg(windows)]
pub fn socket_path(session: &str) -> PathBuf {
    // The interprocess crate handles the \\.\pipe\ prefix
    PathBuf::from(socket_name(session))
}

/// Get the socket name for interprocess local socket APIs
#[cfg(unix)]
pub fn socket_name(session: &str) -> String {
    socket_path(session).to_string_lossy().into_owned()
}

#[cfg(windows)]
pub fn socket_name(session: &str) -> String {
    let username = std::env::var("USERNAME").unwrap_or_else(|_| "default".to_string());
    format!("{}-{}-{}", APP_NAME, username, session)
}

/// Ensure the socket directory exists with proper permissions
///
/// On Unix, creates the directory with mode 0700 for security
#[cfg(unix)]
pub fn ensure_socket_dir(session: &str) -> io::Result<PathBuf> {
    let socket = socket_path(session);
    let dir = socket
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid socket path"))?;

    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(dir.to_path_buf())
}

#[cfg(windows)]
pub fn ensure_socket_dir(_session: &str) -> io::Result<PathBuf> {
    Ok(PathBuf::new())
}

/// Remove a stale socket file if it exists
#[cfg(unix)]
pub fn remove_socket(session: &str) -> io::Result<()> {
    let path = socket_path(session);
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    Ok(())
}

#[cfg(windows)]
pub fn remove_socket(_session: &str) -> io::Result<()> {
    // Named pipes are cleaned up by the OS
    Ok(())
}

/// Get the configuration directory path
///
/// - Linux: `~/.config/rdb/`
/// - macOS: `~/Library/Application Support/rdb/`
/// - Windows: `%APPDATA%\rdb\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_dir().join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_is_valid() {
        let path = socket_path(DEFAULT_SESSION);
        assert!(!path.as_os_str().is_empty());
        assert!(socket_name(DEFAULT_SESSION).contains(DEFAULT_SESSION));
    }

    #[cfg(unix)]
    #[test]
    fn test_explicit_socket_path() {
        let path = socket_path("/tmp/custom/run.sock");
        assert_eq!(path, PathBuf::from("/tmp/custom/run.sock"));
    }

    #[test]
    fn test_config_dir_is_valid() {
        let dir = config_dir();
        assert!(dir.is_some());
    }
}
