//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::breakpoints::BreakpointSpec;
use crate::common::{Error, Result};
use crate::runtime::{Attributes, Phase, UnitKind};

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Breakpoints installed before the run starts
    #[serde(default)]
    pub breakpoints: Vec<BreakpointSpec>,
    /// Pause on the very first transition
    #[serde(default)]
    pub pause_on_start: bool,
    /// Execution units replayed through the host adapter, in order
    pub run: Vec<UnitSpec>,
    /// The sequence of controller steps to execute
    pub steps: Vec<TestStep>,
}

/// One execution unit of the replayed run. Exactly one of `suite`, `case`
/// (or `test`) and `keyword` names the unit.
#[derive(Deserialize, Debug, Default)]
pub struct UnitSpec {
    pub suite: Option<String>,
    #[serde(alias = "test")]
    pub case: Option<String>,
    pub keyword: Option<String>,
    /// Attributes reported at start
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Status reported at end
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub children: Vec<UnitSpec>,
}

fn default_status() -> String {
    "PASS".to_string()
}

impl UnitSpec {
    /// Kind and name of the unit
    pub fn identity(&self) -> Result<(UnitKind, &str)> {
        match (&self.suite, &self.case, &self.keyword) {
            (Some(name), None, None) => Ok((UnitKind::Suite, name.as_str())),
            (None, Some(name), None) => Ok((UnitKind::Case, name.as_str())),
            (None, None, Some(name)) => Ok((UnitKind::Keyword, name.as_str())),
            _ => Err(Error::Config(
                "each unit needs exactly one of 'suite', 'case' or 'keyword'".to_string(),
            )),
        }
    }

    /// Check the whole subtree
    pub fn validate(&self) -> Result<()> {
        self.identity()?;
        self.children.iter().try_for_each(UnitSpec::validate)
    }

    pub fn start_attributes(&self) -> Attributes {
        self.attributes.clone().into_iter().collect()
    }

    pub fn end_attributes(&self) -> Attributes {
        self.start_attributes().with("status", self.status.clone())
    }
}

/// A single test step in the execution flow
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Execute a controller command
    Command {
        /// The command to execute (e.g., "break add Log*", "over")
        command: String,
        /// Optional expectations for the command result
        expect: Option<CommandExpectation>,
    },
    /// Wait for the run to pause
    ExpectPause {
        /// Timeout in seconds (default: 10)
        timeout: Option<u64>,
        /// Expected paused unit in `<kind>:<name>` form
        unit: Option<String>,
        /// Expected phase of the paused unit
        phase: Option<Phase>,
        /// Expected breakpoint identifier
        breakpoint: Option<String>,
        /// Expected stack depth
        depth: Option<usize>,
    },
    /// Compare the call stack, outermost first
    ExpectStack {
        /// Entries in `<kind>:<name>` form
        stack: Vec<String>,
    },
    /// Wait for the run to end
    ExpectFinished {
        /// Timeout in seconds (default: 10)
        timeout: Option<u64>,
        /// Expect the run to have been aborted instead
        #[serde(default)]
        aborted: bool,
    },
}

/// Expectations for a command result
#[derive(Deserialize, Debug)]
pub struct CommandExpectation {
    /// Whether the command should succeed
    pub success: Option<bool>,
    /// Error code the command should fail with
    pub error_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: sample
breakpoints:
  - type: keyword
    pattern: "Log*"
run:
  - suite: Root
    children:
      - test: Case
        children:
          - keyword: BuiltIn.Log
            attributes: { args: ["hi"] }
steps:
  - action: expect_pause
    unit: "keyword:Log"
    phase: start
  - action: command
    command: continue
  - action: expect_finished
"#;
        let scenario: TestScenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.breakpoints.len(), 1);
        assert_eq!(scenario.steps.len(), 3);

        let case = &scenario.run[0].children[0];
        assert_eq!(case.identity().unwrap(), (UnitKind::Case, "Case"));
        let keyword = &case.children[0];
        assert_eq!(keyword.end_attributes().text("status"), "PASS");
        assert!(scenario.run[0].validate().is_ok());
    }

    #[test]
    fn test_ambiguous_unit_rejected() {
        let unit = UnitSpec {
            suite: Some("S".to_string()),
            keyword: Some("K".to_string()),
            ..Default::default()
        };
        assert!(unit.identity().is_err());
        assert!(UnitSpec::default().validate().is_err());
    }
}
