//! Breakpoints: named, toggleable predicates over the call stack
//!
//! Every variant is evaluated against the whole stack once per transition.
//! Matching state (counters, arming, expiry) lives inside the variant and is
//! only ever changed by its own `matches`.

mod call_stack;
mod keyword;
mod pattern;
mod runtime;
mod semaphore;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use call_stack::CallStackBreakPoint;
pub use keyword::KeywordBreakPoint;
pub use pattern::Glob;
pub use runtime::RuntimeBreakPoint;
pub use semaphore::SemaphoreBreakPoint;

use crate::common::{Error, Result};
use crate::runtime::{NodeId, Phase, RuntimeNode};

/// Failure reported by a host-supplied predicate
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PredicateError(pub String);

/// Host-supplied matching logic
pub trait StackPredicate: Send + fmt::Debug {
    fn matches(&mut self, stack: &[RuntimeNode]) -> std::result::Result<bool, PredicateError>;

    /// Human readable summary shown by interfaces
    fn describe(&self) -> String;

    fn is_expired(&self) -> bool {
        false
    }
}

/// Variant tag exposed to interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointKind {
    Keyword,
    CallStack,
    Runtime,
    Semaphore,
    Custom,
    /// Synthetic match produced by an on-demand pause
    Pause,
}

#[derive(Debug)]
enum Matcher {
    Keyword(KeywordBreakPoint),
    CallStack(CallStackBreakPoint),
    Runtime(RuntimeBreakPoint),
    Semaphore(SemaphoreBreakPoint),
    Custom(Box<dyn StackPredicate>),
}

/// An installed breakpoint
#[derive(Debug)]
pub struct BreakPoint {
    id: String,
    active: bool,
    transient: bool,
    matcher: Matcher,
}

impl BreakPoint {
    fn with_matcher(id: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            id: id.into(),
            active: true,
            transient: false,
            matcher,
        }
    }

    pub fn keyword(id: impl Into<String>, pattern: &str, target: Phase) -> Result<Self> {
        Ok(Self::with_matcher(
            id,
            Matcher::Keyword(KeywordBreakPoint::new(pattern, target)?),
        ))
    }

    pub fn call_stack<I, S>(id: impl Into<String>, chain: I, target: Phase) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::with_matcher(
            id,
            Matcher::CallStack(CallStackBreakPoint::new(chain, target)?),
        ))
    }

    pub fn runtime(id: impl Into<String>, node: &RuntimeNode, target: Phase) -> Result<Self> {
        Ok(Self::with_matcher(
            id,
            Matcher::Runtime(RuntimeBreakPoint::new(node, target)?),
        ))
    }

    pub fn semaphore(id: impl Into<String>, count: u32) -> Result<Self> {
        Ok(Self::with_matcher(
            id,
            Matcher::Semaphore(SemaphoreBreakPoint::new(count)?),
        ))
    }

    pub fn custom(id: impl Into<String>, predicate: Box<dyn StackPredicate>) -> Self {
        Self::with_matcher(id, Matcher::Custom(predicate))
    }

    /// Mark as installed by a step command; removed at the next pause
    pub(crate) fn into_transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn is_expired(&self) -> bool {
        match &self.matcher {
            Matcher::Keyword(_) | Matcher::CallStack(_) => false,
            Matcher::Runtime(bp) => bp.is_expired(),
            Matcher::Semaphore(bp) => bp.is_expired(),
            Matcher::Custom(p) => p.is_expired(),
        }
    }

    pub fn kind(&self) -> BreakpointKind {
        match &self.matcher {
            Matcher::Keyword(_) => BreakpointKind::Keyword,
            Matcher::CallStack(_) => BreakpointKind::CallStack,
            Matcher::Runtime(_) => BreakpointKind::Runtime,
            Matcher::Semaphore(_) => BreakpointKind::Semaphore,
            Matcher::Custom(_) => BreakpointKind::Custom,
        }
    }

    /// Pattern text for name-pattern variants, used for lookup by pattern
    pub fn pattern(&self) -> Option<String> {
        match &self.matcher {
            Matcher::Keyword(bp) => Some(bp.pattern().to_string()),
            Matcher::CallStack(bp) => Some(bp.pattern()),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<Phase> {
        match &self.matcher {
            Matcher::Keyword(bp) => Some(bp.target()),
            Matcher::CallStack(bp) => Some(bp.target()),
            Matcher::Runtime(bp) => Some(bp.target()),
            Matcher::Semaphore(_) => Some(Phase::Start),
            Matcher::Custom(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match &self.matcher {
            Matcher::Keyword(bp) => format!("keyword '{}' at {}", bp.pattern(), bp.target()),
            Matcher::CallStack(bp) => format!("stack '{}' at {}", bp.pattern(), bp.target()),
            Matcher::Runtime(bp) => format!("{} {} at {}", bp.label(), bp.node(), bp.target()),
            Matcher::Semaphore(bp) => format!("{} of {} starts left", bp.remaining(), bp.initial()),
            Matcher::Custom(p) => p.describe(),
        }
    }

    /// Evaluate against the current stack. Inactive breakpoints never match.
    pub fn matches(&mut self, stack: &[RuntimeNode]) -> std::result::Result<bool, PredicateError> {
        if !self.active {
            return Ok(false);
        }
        Ok(match &mut self.matcher {
            Matcher::Keyword(bp) => bp.matches(stack),
            Matcher::CallStack(bp) => bp.matches(stack),
            Matcher::Runtime(bp) => bp.matches(stack),
            Matcher::Semaphore(bp) => bp.matches(stack),
            Matcher::Custom(p) => return p.matches(stack),
        })
    }

    pub fn info(&self) -> BreakpointInfo {
        BreakpointInfo {
            id: self.id.clone(),
            kind: self.kind(),
            description: self.describe(),
            target: self.target(),
            active: self.active,
            expired: self.is_expired(),
            transient: self.transient,
        }
    }
}

impl fmt::Display for BreakPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "break:{}, {}", self.id, self.describe())
    }
}

/// Read-only view of a breakpoint for interfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointInfo {
    pub id: String,
    pub kind: BreakpointKind,
    pub description: String,
    pub target: Option<Phase>,
    pub active: bool,
    pub expired: bool,
    pub transient: bool,
}

impl BreakpointInfo {
    /// The synthetic breakpoint reported for an on-demand pause
    pub fn pause() -> Self {
        Self {
            id: "pause".to_string(),
            kind: BreakpointKind::Pause,
            description: "paused on request".to_string(),
            target: None,
            active: true,
            expired: true,
            transient: true,
        }
    }
}

/// A breakpoint as described by a remote controller or a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BreakpointSpec {
    Keyword {
        pattern: String,
        #[serde(default = "default_phase")]
        phase: Phase,
        #[serde(default)]
        id: Option<String>,
    },
    CallStack {
        patterns: Vec<String>,
        #[serde(default = "default_phase")]
        phase: Phase,
        #[serde(default)]
        id: Option<String>,
    },
    Runtime {
        node: NodeId,
        #[serde(default = "default_phase")]
        phase: Phase,
        #[serde(default)]
        id: Option<String>,
    },
    Steps {
        count: u32,
        #[serde(default)]
        id: Option<String>,
    },
}

fn default_phase() -> Phase {
    Phase::Start
}

impl BreakpointSpec {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Keyword { id, .. }
            | Self::CallStack { id, .. }
            | Self::Runtime { id, .. }
            | Self::Steps { id, .. } => id.as_deref(),
        }
    }

    /// Build the breakpoint; `stack` resolves runtime bindings
    pub fn build(&self, id: String, stack: &[RuntimeNode]) -> Result<BreakPoint> {
        match self {
            Self::Keyword { pattern, phase, .. } => BreakPoint::keyword(id, pattern, *phase),
            Self::CallStack { patterns, phase, .. } => BreakPoint::call_stack(id, patterns, *phase),
            Self::Runtime { node, phase, .. } => {
                let bound = stack.iter().find(|n| n.id() == *node).ok_or_else(|| {
                    Error::invalid_state(
                        &format!("bind a breakpoint to unit {}", node),
                        "not running that unit",
                    )
                })?;
                BreakPoint::runtime(id, bound, *phase)
            }
            Self::Steps { count, .. } => BreakPoint::semaphore(id, *count),
        }
    }
}

/// Target phase for the name-pattern variants: `Done` means "about to
/// leave", which is observable only as `End`. `Running` is never observed.
pub(crate) fn pattern_target(target: Phase) -> Result<Phase> {
    match target {
        Phase::Running => Err(Error::InvalidTargetPhase(target.to_string())),
        Phase::Done => Ok(Phase::End),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Attributes, CallStack, UnitKind};

    #[derive(Debug)]
    struct Failing;

    impl StackPredicate for Failing {
        fn matches(&mut self, _stack: &[RuntimeNode]) -> std::result::Result<bool, PredicateError> {
            Err(PredicateError("lookup failed".to_string()))
        }

        fn describe(&self) -> String {
            "always fails".to_string()
        }
    }

    fn keyword_stack(name: &str) -> CallStack {
        let mut stack = CallStack::new();
        stack.push(UnitKind::Keyword, name, Attributes::new());
        stack
    }

    #[test]
    fn test_toggle_restores_behavior() {
        let stack = keyword_stack("GetValue");
        let mut bp = BreakPoint::keyword("bp1", "Get*", Phase::Start).unwrap();
        assert!(bp.matches(stack.nodes()).unwrap());

        bp.set_active(false);
        assert!(!bp.matches(stack.nodes()).unwrap());

        bp.set_active(true);
        assert!(bp.matches(stack.nodes()).unwrap());
    }

    #[test]
    fn test_custom_predicate_errors_surface() {
        let stack = keyword_stack("Anything");
        let mut bp = BreakPoint::custom("c1", Box::new(Failing));
        assert!(bp.matches(stack.nodes()).is_err());
        assert_eq!(bp.kind(), BreakpointKind::Custom);
        assert_eq!(bp.target(), None);
    }

    #[test]
    fn test_info_view() {
        let bp = BreakPoint::call_stack("bp2", &["Suite*", "Login"], Phase::Done)
            .unwrap()
            .into_transient();
        let info = bp.info();
        assert_eq!(info.id, "bp2");
        assert_eq!(info.kind, BreakpointKind::CallStack);
        assert_eq!(info.target, Some(Phase::End));
        assert!(info.transient);
        assert!(info.description.contains("Suite*;Login"));
        assert_eq!(bp.pattern().as_deref(), Some("Suite*;Login"));
    }

    #[test]
    fn test_spec_wire_format() {
        let spec: BreakpointSpec =
            serde_json::from_str(r#"{"type":"keyword","pattern":"Log*"}"#).unwrap();
        assert!(matches!(&spec, BreakpointSpec::Keyword { phase: Phase::Start, .. }));
        assert!(spec.id().is_none());

        let bp = spec.build("bp9".to_string(), &[]).unwrap();
        assert_eq!(bp.id(), "bp9");
    }

    #[test]
    fn test_runtime_spec_needs_live_node() {
        let stack = keyword_stack("Log");
        let top = stack.top().unwrap().id();

        let spec = BreakpointSpec::Runtime {
            node: top,
            phase: Phase::End,
            id: None,
        };
        assert!(spec.build("r1".to_string(), stack.nodes()).is_ok());
        assert!(spec.build("r2".to_string(), &[]).is_err());
    }
}
