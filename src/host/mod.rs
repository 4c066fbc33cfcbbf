//! Host engine adapter
//!
//! Translates the test engine's listener callbacks into controller
//! transitions. Keywords belonging to the debugger's own library never reach
//! the call stack, and library-qualified keyword names are reduced to the
//! bare keyword name.

use crate::breakpoints::BreakpointSpec;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::controller::{ExecutionController, Resumption};
use crate::runtime::{Attributes, UnitKind};
use crate::server::{DebugServer, ServerHandle, ServerOptions};

/// Listener-side entry point for a test engine
#[derive(Debug, Clone)]
pub struct HostAdapter {
    controller: ExecutionController,
    hidden_prefix: String,
    strip_library_prefix: bool,
}

impl HostAdapter {
    pub fn new(controller: ExecutionController) -> Self {
        let host = Config::default().host;
        Self {
            controller,
            hidden_prefix: host.hidden_prefix,
            strip_library_prefix: host.strip_library_prefix,
        }
    }

    /// Apply the host settings and install the configured breakpoints
    pub fn from_config(controller: ExecutionController, config: &Config) -> Result<Self> {
        for entry in &config.breakpoints.keywords {
            let info = controller.add_spec(&BreakpointSpec::Keyword {
                pattern: entry.pattern.clone(),
                phase: entry.phase,
                id: None,
            })?;
            tracing::info!(breakpoint = %info.id, pattern = %entry.pattern, "installed configured breakpoint");
        }
        if config.breakpoints.pause_on_start {
            controller.pause()?;
        }

        Ok(Self {
            controller,
            hidden_prefix: config.host.hidden_prefix.clone(),
            strip_library_prefix: config.host.strip_library_prefix,
        })
    }

    pub fn controller(&self) -> &ExecutionController {
        &self.controller
    }

    pub fn start_suite(&self, name: &str, attributes: Attributes) -> Result<()> {
        tracing::debug!(name, "start_suite");
        check(self.controller.on_unit_start(UnitKind::Suite, name, attributes)?)
    }

    pub fn end_suite(&self, name: &str, attributes: Attributes) -> Result<()> {
        tracing::debug!(name, "end_suite");
        check(self.controller.on_unit_end(UnitKind::Suite, name, attributes)?)
    }

    pub fn start_test(&self, name: &str, attributes: Attributes) -> Result<()> {
        tracing::debug!(name, "start_test");
        check(self.controller.on_unit_start(UnitKind::Case, name, attributes)?)
    }

    pub fn end_test(&self, name: &str, attributes: Attributes) -> Result<()> {
        tracing::debug!(name, "end_test");
        check(self.controller.on_unit_end(UnitKind::Case, name, attributes)?)
    }

    pub fn start_keyword(&self, name: &str, attributes: Attributes) -> Result<()> {
        tracing::debug!(name, "start_keyword");
        match self.keyword_name(name) {
            Some(name) => check(self.controller.on_unit_start(UnitKind::Keyword, name, attributes)?),
            None => Ok(()),
        }
    }

    pub fn end_keyword(&self, name: &str, attributes: Attributes) -> Result<()> {
        tracing::debug!(name, "end_keyword");
        match self.keyword_name(name) {
            Some(name) => check(self.controller.on_unit_end(UnitKind::Keyword, name, attributes)?),
            None => Ok(()),
        }
    }

    /// The engine finished the whole run
    pub fn close(&self) {
        self.controller.close();
    }

    /// Name pushed for a keyword, `None` when hidden
    fn keyword_name<'a>(&self, full_name: &'a str) -> Option<&'a str> {
        if !self.hidden_prefix.is_empty() && full_name.starts_with(&self.hidden_prefix) {
            return None;
        }
        if self.strip_library_prefix {
            if let Some((_, keyword)) = full_name.split_once('.') {
                return Some(keyword);
            }
        }
        Some(full_name)
    }
}

/// Everything a host process needs to debug one run: the adapter its
/// listener calls into and, when enabled, the control server
pub struct DebugSession {
    adapter: HostAdapter,
    server: Option<ServerHandle>,
}

impl DebugSession {
    /// Set up logging, breakpoints and the control server from `config`
    pub fn start(config: &Config) -> Result<Self> {
        if let Some(log_path) = logging::init_host() {
            tracing::info!(log = %log_path.display(), "host logging initialized");
        }

        let controller = ExecutionController::new();
        let adapter = HostAdapter::from_config(controller.clone(), config)?;

        let server = if config.server.enabled {
            Some(DebugServer::spawn(controller, ServerOptions::from_config(config))?)
        } else {
            tracing::info!("control server disabled");
            None
        };

        Ok(Self { adapter, server })
    }

    pub fn adapter(&self) -> &HostAdapter {
        &self.adapter
    }

    /// Session the control server listens on
    pub fn server_session(&self) -> Option<&str> {
        self.server.as_ref().map(ServerHandle::session)
    }

    /// Close the run and stop the control server
    pub fn finish(mut self) {
        self.adapter.close();
        if let Some(server) = self.server.take() {
            server.join();
        }
    }
}

fn check(resumption: Resumption) -> Result<()> {
    match resumption {
        Resumption::Continue => Ok(()),
        Resumption::Abort => Err(Error::RunAborted),
    }
}
