//! Break on one specific unit instance

use crate::common::{Error, Result};
use crate::runtime::{NodeId, Phase, RuntimeNode};

/// Bound to a single node by identity.
///
/// With a `Done` target the node is never seen on top in that phase, so its
/// `End` transition arms the breakpoint and the next `Start` anywhere on the
/// stack is reported as the match. Either way it fires at most once.
#[derive(Debug, Clone)]
pub struct RuntimeBreakPoint {
    node: NodeId,
    label: String,
    target: Phase,
    armed: bool,
    expired: bool,
}

impl RuntimeBreakPoint {
    pub fn new(node: &RuntimeNode, target: Phase) -> Result<Self> {
        if target == Phase::Running {
            return Err(Error::InvalidTargetPhase(target.to_string()));
        }

        Ok(Self {
            node: node.id(),
            label: node.to_string(),
            target,
            armed: false,
            expired: false,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Display form of the bound node at binding time
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn target(&self) -> Phase {
        self.target
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn matches(&mut self, stack: &[RuntimeNode]) -> bool {
        let Some(top) = stack.last() else {
            return false;
        };
        if self.expired {
            return false;
        }

        if self.armed {
            if top.phase() == Phase::Start {
                self.expired = true;
                return true;
            }
            return false;
        }

        if top.id() == self.node {
            if top.phase() == self.target {
                self.expired = true;
                return true;
            }
            if self.target == Phase::Done && top.phase() == Phase::End {
                self.armed = true;
                return false;
            }
        }

        // The node left the stack without ever reaching the target
        if !stack.iter().any(|n| n.id() == self.node) {
            self.expired = true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Attributes, CallStack, UnitKind};

    #[test]
    fn test_done_matches_on_next_start() {
        let mut stack = CallStack::new();
        stack.push(UnitKind::Case, "Case", Attributes::new());
        stack.set_top_phase(Phase::Running).unwrap();
        stack.push(UnitKind::Keyword, "First", Attributes::new());

        let mut bp = RuntimeBreakPoint::new(stack.top().unwrap(), Phase::Done).unwrap();
        assert!(!bp.matches(stack.nodes()));
        stack.set_top_phase(Phase::Running).unwrap();

        // Child of First
        stack.push(UnitKind::Keyword, "Nested", Attributes::new());
        assert!(!bp.matches(stack.nodes()));
        stack.set_top_phase(Phase::Running).unwrap();
        stack.advance_to_end(Attributes::new()).unwrap();
        assert!(!bp.matches(stack.nodes()));
        stack.pop().unwrap();

        // First ends: arms
        stack.advance_to_end(Attributes::new()).unwrap();
        assert!(!bp.matches(stack.nodes()));
        assert!(!bp.is_expired());
        stack.pop().unwrap();

        // Sibling starts: fires and expires
        stack.push(UnitKind::Keyword, "Second", Attributes::new());
        assert!(bp.matches(stack.nodes()));
        assert!(bp.is_expired());
        assert!(!bp.matches(stack.nodes()));
    }

    #[test]
    fn test_armed_ignores_end_transitions() {
        let mut stack = CallStack::new();
        stack.push(UnitKind::Suite, "S", Attributes::new());
        stack.set_top_phase(Phase::Running).unwrap();
        stack.push(UnitKind::Case, "Last", Attributes::new());

        let mut bp = RuntimeBreakPoint::new(stack.top().unwrap(), Phase::Done).unwrap();
        stack.set_top_phase(Phase::Running).unwrap();
        stack.advance_to_end(Attributes::new()).unwrap();
        assert!(!bp.matches(stack.nodes()));
        stack.pop().unwrap();

        // Parent ends next: no Start yet, so no match
        stack.advance_to_end(Attributes::new()).unwrap();
        assert!(!bp.matches(stack.nodes()));
        assert!(!bp.is_expired());
    }

    #[test]
    fn test_end_target_matches_bound_node_only() {
        let mut stack = CallStack::new();
        stack.push(UnitKind::Case, "Case", Attributes::new());
        let mut bp = RuntimeBreakPoint::new(stack.top().unwrap(), Phase::End).unwrap();
        stack.set_top_phase(Phase::Running).unwrap();

        stack.push(UnitKind::Keyword, "Inner", Attributes::new());
        stack.advance_to_end(Attributes::new()).unwrap();
        assert!(!bp.matches(stack.nodes()));
        stack.pop().unwrap();

        stack.advance_to_end(Attributes::new()).unwrap();
        assert!(bp.matches(stack.nodes()));
        assert!(bp.is_expired());
    }

    #[test]
    fn test_same_name_different_instance() {
        let mut stack = CallStack::new();
        stack.push(UnitKind::Keyword, "Retry", Attributes::new());
        let mut bp = RuntimeBreakPoint::new(stack.top().unwrap(), Phase::End).unwrap();
        stack.advance_to_end(Attributes::new()).unwrap();
        stack.pop().unwrap();
        assert!(!bp.matches(&[]));

        stack.push(UnitKind::Keyword, "Retry", Attributes::new());
        stack.advance_to_end(Attributes::new()).unwrap();
        assert!(!bp.matches(stack.nodes()));
        assert!(bp.is_expired());
    }
}
