//! Observers of the execution controller

use super::{PauseInfo, Resumption};
use crate::runtime::RuntimeNode;

/// Callbacks fired by the controller. All hooks default to no-ops.
///
/// Hooks run on the execution thread with the controller unlocked, so they
/// may read controller state but must not wait for a pause or resume.
pub trait DebugListener: Send + Sync {
    fn on_unit_start(&self, _unit: &RuntimeNode) {}

    fn on_unit_end(&self, _unit: &RuntimeNode) {}

    fn on_pause(&self, _pause: &PauseInfo) {}

    fn on_resume(&self, _resumption: Resumption) {}
}

/// Handle returned by `add_listener`, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
