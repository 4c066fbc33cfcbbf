//! Execution units as they appear on the call stack

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

/// Kind of execution unit reported by the host engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Suite,
    Case,
    Keyword,
}

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Suite => "suite",
            Self::Case => "case",
            Self::Keyword => "keyword",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = Error;

    /// Accepts the canonical names plus the host engine's `test` and `kw`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "suite" => Ok(Self::Suite),
            "case" | "test" => Ok(Self::Case),
            "keyword" | "kw" => Ok(Self::Keyword),
            other => Err(Error::InvalidPattern(format!("unknown unit kind '{}'", other))),
        }
    }
}

/// Lifecycle phase of a unit. Only ever advances in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Running,
    End,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Running => "running",
            Self::End => "end",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "running" => Ok(Self::Running),
            "end" => Ok(Self::End),
            "done" => Ok(Self::Done),
            other => Err(Error::InvalidTargetPhase(other.to_string())),
        }
    }
}

/// Identity of a node, unique for the lifetime of one controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata the host engine attaches to a unit (times, status, tags, args)
///
/// Lookups of missing keys yield an empty value rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, serde_json::Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Value rendered as text; strings are unquoted, missing keys are empty
    pub fn text(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, serde_json::Value>> for Attributes {
    fn from(map: BTreeMap<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, serde_json::Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One active execution unit
///
/// `kind`, `name` and `id` are fixed at creation; `phase` and `attributes`
/// change as the host reports progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeNode {
    id: NodeId,
    kind: UnitKind,
    name: String,
    phase: Phase,
    attributes: Attributes,
}

impl RuntimeNode {
    pub(crate) fn new(id: NodeId, kind: UnitKind, name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            phase: Phase::Start,
            attributes,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == UnitKind::Keyword
    }

    /// Whether this node is the unit the host identifies by `kind` and `name`
    pub fn is_unit(&self, kind: UnitKind, name: &str) -> bool {
        self.kind == kind && self.name == name
    }

    /// Move to `phase`; staying put is allowed, going back is not
    pub(crate) fn advance(&mut self, phase: Phase) -> Result<()> {
        if phase < self.phase {
            return Err(Error::PhaseRegression {
                unit: self.to_string(),
                from: self.phase.to_string(),
                to: phase.to_string(),
            });
        }
        self.phase = phase;
        Ok(())
    }

    pub(crate) fn replace_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }
}

/// `<kind>:<name>`, the key path-style breakpoints match against
impl fmt::Display for RuntimeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}
