//! Break on an ancestor chain

use super::pattern::Glob;
use super::pattern_target;
use crate::common::{Error, Result};
use crate::runtime::{Phase, RuntimeNode};

/// Matches a chain of glob patterns, outermost first, against the stack.
///
/// The last pattern must match the top of the stack. The others must match
/// ancestors in the same order, but not necessarily adjacent ones. A pattern
/// matches an entry through either its `<kind>:<name>` form or its bare name.
#[derive(Debug, Clone)]
pub struct CallStackBreakPoint {
    chain: Vec<Glob>,
    target: Phase,
}

impl CallStackBreakPoint {
    pub fn new<I, S>(chain: I, target: Phase) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chain: Vec<Glob> = chain.into_iter().map(|p| Glob::new(p.as_ref())).collect();
        if chain.is_empty() {
            return Err(Error::InvalidPattern(
                "call stack breakpoint needs at least one pattern".to_string(),
            ));
        }

        Ok(Self {
            chain,
            target: pattern_target(target)?,
        })
    }

    /// Chain joined with `;`, the form controllers refer to it by
    pub fn pattern(&self) -> String {
        self.chain.iter().map(Glob::as_str).collect::<Vec<_>>().join(";")
    }

    pub fn target(&self) -> Phase {
        self.target
    }

    pub fn matches(&self, stack: &[RuntimeNode]) -> bool {
        let (Some(top), Some(innermost)) = (stack.last(), self.chain.last()) else {
            return false;
        };
        if !entry_matches(innermost, top) {
            return false;
        }

        let mut pending = self.chain.iter().peekable();
        for node in stack {
            match pending.peek() {
                Some(glob) if entry_matches(glob, node) => {
                    pending.next();
                }
                Some(_) => {}
                None => break,
            }
        }

        pending.peek().is_none() && top.phase() == self.target
    }
}

fn entry_matches(glob: &Glob, node: &RuntimeNode) -> bool {
    glob.matches(&node.to_string()) || glob.matches(node.name())
}
