//! The live call stack of nested execution units

use super::node::{Attributes, NodeId, Phase, RuntimeNode, UnitKind};
use crate::common::{Error, Result};

/// Ordered stack of active units; the last element is the running one.
///
/// Only the tail is ever pushed or popped, and a node is popped once it
/// reaches `Done`, so the top is never observed in the `Done` phase.
#[derive(Debug, Default)]
pub struct CallStack {
    nodes: Vec<RuntimeNode>,
    next_id: u64,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new unit in phase `Start`
    pub fn push(&mut self, kind: UnitKind, name: impl Into<String>, attributes: Attributes) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.push(RuntimeNode::new(id, kind, name, attributes));
        id
    }

    /// Move the top unit to `phase`
    pub fn set_top_phase(&mut self, phase: Phase) -> Result<()> {
        self.top_mut()?.advance(phase)
    }

    /// Transition the top unit to `End`, replacing its attributes wholesale
    pub fn advance_to_end(&mut self, final_attributes: Attributes) -> Result<()> {
        let top = self.top_mut()?;
        top.advance(Phase::End)?;
        top.replace_attributes(final_attributes);
        Ok(())
    }

    /// Remove the top unit, which must already have ended
    pub fn pop(&mut self) -> Result<RuntimeNode> {
        let top = self.top_mut()?;
        if top.phase() < Phase::End {
            return Err(Error::contract(format!(
                "cannot pop {} while it is still in phase {}",
                top,
                top.phase()
            )));
        }
        top.advance(Phase::Done)?;
        self.nodes.pop().ok_or(Error::EmptyCallStack)
    }

    pub fn top(&self) -> Option<&RuntimeNode> {
        self.nodes.last()
    }

    fn top_mut(&mut self) -> Result<&mut RuntimeNode> {
        self.nodes.last_mut().ok_or(Error::EmptyCallStack)
    }

    /// The unit enclosing the top one
    pub fn parent(&self) -> Option<&RuntimeNode> {
        self.nodes.len().checked_sub(2).and_then(|i| self.nodes.get(i))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bottom (outermost) first
    pub fn nodes(&self) -> &[RuntimeNode] {
        &self.nodes
    }

    /// Owned copy for interfaces, bottom first
    pub fn snapshot(&self) -> Vec<RuntimeNode> {
        self.nodes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_starts_in_start_phase() {
        let mut stack = CallStack::new();
        let suite = stack.push(UnitKind::Suite, "Top", Attributes::new());
        let case = stack.push(UnitKind::Case, "First", Attributes::new());
        assert_ne!(suite, case);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.top().unwrap().phase(), Phase::Start);
        assert_eq!(stack.parent().unwrap().id(), suite);
    }

    #[test]
    fn test_end_replaces_attributes() {
        let mut stack = CallStack::new();
        stack.push(UnitKind::Keyword, "Log", Attributes::new().with("args", "hi"));
        stack.set_top_phase(Phase::Running).unwrap();
        stack
            .advance_to_end(Attributes::new().with("status", "PASS"))
            .unwrap();

        let top = stack.top().unwrap();
        assert_eq!(top.phase(), Phase::End);
        assert_eq!(top.attributes().text("status"), "PASS");
        assert_eq!(top.attributes().text("args"), "");
    }

    #[test]
    fn test_pop_requires_end() {
        let mut stack = CallStack::new();
        stack.push(UnitKind::Keyword, "Log", Attributes::new());
        assert!(matches!(stack.pop(), Err(Error::ContractViolation(_))));

        stack.advance_to_end(Attributes::new()).unwrap();
        let popped = stack.pop().unwrap();
        assert_eq!(popped.phase(), Phase::Done);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_operations_on_empty_stack_fail() {
        let mut stack = CallStack::new();
        assert!(matches!(stack.pop(), Err(Error::EmptyCallStack)));
        assert!(matches!(
            stack.advance_to_end(Attributes::new()),
            Err(Error::EmptyCallStack)
        ));
        assert!(stack.top().is_none());
        assert!(stack.parent().is_none());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut stack = CallStack::new();
        let first = stack.push(UnitKind::Keyword, "A", Attributes::new());
        stack.advance_to_end(Attributes::new()).unwrap();
        stack.pop().unwrap();
        let second = stack.push(UnitKind::Keyword, "A", Attributes::new());
        assert_ne!(first, second);
    }
}
