//! Break on keywords by name

use super::pattern::Glob;
use super::pattern_target;
use crate::common::Result;
use crate::runtime::{Phase, RuntimeNode};

/// Matches when the running keyword's name fits a case-insensitive glob
#[derive(Debug, Clone)]
pub struct KeywordBreakPoint {
    glob: Glob,
    target: Phase,
}

impl KeywordBreakPoint {
    pub fn new(pattern: &str, target: Phase) -> Result<Self> {
        Ok(Self {
            glob: Glob::case_insensitive(pattern),
            target: pattern_target(target)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.glob.as_str()
    }

    pub fn target(&self) -> Phase {
        self.target
    }

    pub fn matches(&self, stack: &[RuntimeNode]) -> bool {
        match stack.last() {
            Some(top) => top.is_keyword() && top.phase() == self.target && self.glob.matches(top.name()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Attributes, CallStack, UnitKind};

    fn stack_with(kind: UnitKind, name: &str, phase: Phase) -> CallStack {
        let mut stack = CallStack::new();
        stack.push(UnitKind::Suite, "Suite", Attributes::new());
        stack.push(kind, name, Attributes::new());
        if phase >= Phase::Running {
            stack.set_top_phase(Phase::Running).unwrap();
        }
        if phase >= Phase::End {
            stack.advance_to_end(Attributes::new()).unwrap();
        }
        stack
    }

    #[test]
    fn test_start_target() {
        let bp = KeywordBreakPoint::new("Get*", Phase::Start).unwrap();
        assert!(bp.matches(stack_with(UnitKind::Keyword, "GetValue", Phase::Start).nodes()));
        assert!(!bp.matches(stack_with(UnitKind::Keyword, "GetValue", Phase::End).nodes()));
        assert!(!bp.matches(stack_with(UnitKind::Keyword, "SetValue", Phase::Start).nodes()));
    }

    #[test]
    fn test_end_target() {
        let bp = KeywordBreakPoint::new("Get*", Phase::End).unwrap();
        assert!(!bp.matches(stack_with(UnitKind::Keyword, "GetValue", Phase::Start).nodes()));
        assert!(bp.matches(stack_with(UnitKind::Keyword, "GetValue", Phase::End).nodes()));
    }

    #[test]
    fn test_done_target_is_end() {
        let bp = KeywordBreakPoint::new("Get*", Phase::Done).unwrap();
        assert_eq!(bp.target(), Phase::End);
        assert!(bp.matches(stack_with(UnitKind::Keyword, "getvalue", Phase::End).nodes()));
    }

    #[test]
    fn test_only_keywords_match() {
        let bp = KeywordBreakPoint::new("*", Phase::Start).unwrap();
        assert!(!bp.matches(stack_with(UnitKind::Case, "GetValue", Phase::Start).nodes()));
        assert!(!bp.matches(&[]));
    }

    #[test]
    fn test_running_target_rejected() {
        assert!(KeywordBreakPoint::new("Log", Phase::Running).is_err());
    }
}
