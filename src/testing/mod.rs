//! Scenario runner
//!
//! Reads YAML scenarios that describe a run (a tree of suites, cases and
//! keywords) together with the controller steps to take while it executes,
//! and checks pauses and stacks against structured data.

mod config;
mod runner;

pub use config::*;
pub use runner::{run, run_scenario, TestResult};
