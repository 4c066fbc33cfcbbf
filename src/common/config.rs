//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::{config_path, DEFAULT_SESSION};
use super::Result;
use crate::runtime::Phase;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Control server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Host engine adapter settings
    #[serde(default)]
    pub host: HostConfig,

    /// Breakpoints installed when a run starts
    #[serde(default)]
    pub breakpoints: BreakpointDefaults,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Control server configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Whether the host should expose the controller on a local socket
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Session name (or explicit socket path) to listen on
    #[serde(default = "default_session")]
    pub session: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session: default_session(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

/// Host engine adapter configuration
#[derive(Debug, Deserialize)]
pub struct HostConfig {
    /// Keywords whose full name starts with this prefix never reach the call stack
    #[serde(default = "default_hidden_prefix")]
    pub hidden_prefix: String,

    /// Reduce `Library.Keyword` to `Keyword` before pushing
    #[serde(default = "default_true")]
    pub strip_library_prefix: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            hidden_prefix: default_hidden_prefix(),
            strip_library_prefix: true,
        }
    }
}

fn default_hidden_prefix() -> String {
    "RDB.".to_string()
}

/// Breakpoints configured ahead of the run
#[derive(Debug, Deserialize, Default)]
pub struct BreakpointDefaults {
    /// Pause on the very first transition of the run
    #[serde(default)]
    pub pause_on_start: bool,

    /// Keyword breakpoints, installed in order
    #[serde(default)]
    pub keywords: Vec<KeywordBreakConfig>,
}

/// A keyword breakpoint entry in the config file
#[derive(Debug, Deserialize, Clone)]
pub struct KeywordBreakConfig {
    /// Case-insensitive glob over keyword names
    pub pattern: String,

    /// Phase to stop at
    #[serde(default = "default_phase")]
    pub phase: Phase,
}

fn default_phase() -> Phase {
    Phase::Start
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Default timeout for the await command
    #[serde(default = "default_await")]
    pub await_default_secs: u64,

    /// Drop a control connection after this long without a request
    #[serde(default = "default_client_idle")]
    pub client_idle_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            await_default_secs: default_await(),
            client_idle_secs: default_client_idle(),
        }
    }
}

fn default_await() -> u64 {
    300
}
fn default_client_idle() -> u64 {
    300
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::parse("").unwrap();
        assert!(config.server.enabled);
        assert_eq!(config.server.session, DEFAULT_SESSION);
        assert_eq!(config.host.hidden_prefix, "RDB.");
        assert!(config.host.strip_library_prefix);
        assert!(config.breakpoints.keywords.is_empty());
        assert_eq!(config.timeouts.await_default_secs, 300);
    }

    #[test]
    fn test_keyword_breakpoints_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
session = "nightly"

[breakpoints]
pause_on_start = true

[[breakpoints.keywords]]
pattern = "Log*"

[[breakpoints.keywords]]
pattern = "Should Be Equal"
phase = "end"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.session, "nightly");
        assert!(config.breakpoints.pause_on_start);
        assert_eq!(config.breakpoints.keywords.len(), 2);
        assert_eq!(config.breakpoints.keywords[0].phase, Phase::Start);
        assert_eq!(config.breakpoints.keywords[1].phase, Phase::End);
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let err = Config::parse("[server\nenabled = ").unwrap_err();
        assert!(matches!(err, super::super::Error::ConfigParse(_)));
    }
}
