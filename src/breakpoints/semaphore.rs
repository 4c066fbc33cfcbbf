//! Break after a number of unit starts

use crate::common::{Error, Result};
use crate::runtime::{Phase, RuntimeNode};

/// Counts down on every `Start` transition seen at the top of the stack and
/// matches once when the count reaches zero. Expiry is terminal.
#[derive(Debug, Clone)]
pub struct SemaphoreBreakPoint {
    initial: u32,
    remaining: u32,
    expired: bool,
}

impl SemaphoreBreakPoint {
    pub fn new(count: u32) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidStepCount(count));
        }
        Ok(Self {
            initial: count,
            remaining: count,
            expired: false,
        })
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn matches(&mut self, stack: &[RuntimeNode]) -> bool {
        if self.expired {
            return false;
        }
        match stack.last() {
            Some(top) if top.phase() == Phase::Start => {
                self.remaining -= 1;
                self.expired = self.remaining == 0;
                self.expired
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Attributes, CallStack, UnitKind};

    #[test]
    fn test_counts_starts_only() {
        let mut stack = CallStack::new();
        let mut bp = SemaphoreBreakPoint::new(2).unwrap();

        stack.push(UnitKind::Keyword, "A", Attributes::new());
        assert!(!bp.matches(stack.nodes()));
        assert_eq!(bp.remaining(), 1);

        stack.advance_to_end(Attributes::new()).unwrap();
        assert!(!bp.matches(stack.nodes()));
        assert_eq!(bp.remaining(), 1);
        stack.pop().unwrap();

        stack.push(UnitKind::Keyword, "B", Attributes::new());
        assert!(bp.matches(stack.nodes()));
        assert!(bp.is_expired());
    }

    #[test]
    fn test_expiry_is_terminal() {
        let mut stack = CallStack::new();
        let mut bp = SemaphoreBreakPoint::new(1).unwrap();
        stack.push(UnitKind::Keyword, "A", Attributes::new());
        assert!(bp.matches(stack.nodes()));

        stack.push(UnitKind::Keyword, "B", Attributes::new());
        assert!(!bp.matches(stack.nodes()));
        assert!(bp.is_expired());
        assert_eq!(bp.remaining(), 0);
    }

    #[test]
    fn test_zero_count_rejected() {
        assert!(matches!(SemaphoreBreakPoint::new(0), Err(Error::InvalidStepCount(0))));
    }
}
