//! Execution control core
//!
//! The [`ExecutionController`] owns the call stack and the breakpoint set
//! behind a single mutex. The host engine's execution thread reports every
//! unit start and end; after each transition the breakpoints are evaluated
//! in installation order and, on the first match, the execution thread
//! blocks on a condition variable until a controller resumes it.
//!
//! The execution thread is suspended exactly while `paused` is set. Resume
//! commands clear it and leave a [`Resumption`] in the wake slot; the waiting
//! thread rechecks `paused` after every wakeup, so spurious wakeups are
//! ignored and a resume issued before the thread parks is never lost.

mod commands;
mod listener;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};

pub use listener::{DebugListener, ListenerId};

use crate::breakpoints::{BreakPoint, BreakpointInfo, BreakpointKind};
use crate::common::{Error, Result};
use crate::runtime::{Attributes, CallStack, Phase, RuntimeNode, UnitKind};

/// How the execution thread continues after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resumption {
    Continue,
    /// The host must terminate the run
    Abort,
}

/// Where and why the execution thread is paused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseInfo {
    /// Increases by one for every pause in the run
    pub seq: u64,
    pub breakpoint: BreakpointInfo,
    pub unit: RuntimeNode,
    pub depth: usize,
}

/// Result of waiting for the run to pause
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Paused(PauseInfo),
    Finished,
    Aborted,
    TimedOut,
}

/// Coarse run state reported to interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Aborted,
    Finished,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Aborted => write!(f, "aborted"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Snapshot of the controller for status displays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub state: RunState,
    pub depth: usize,
    pub current: Option<RuntimeNode>,
    pub paused_at: Option<PauseInfo>,
    pub breakpoints: usize,
    pub pauses: u64,
}

enum Verdict {
    Continue,
    Abort,
    Pause(PauseInfo),
}

struct ControlState {
    stack: CallStack,
    breakpoints: Vec<BreakPoint>,
    /// Set iff the execution thread is (or is about to be) suspended
    paused: Option<PauseInfo>,
    /// Signal left by the command that cleared `paused`
    wake: Option<Resumption>,
    pause_requested: bool,
    aborted: bool,
    started: bool,
    finished: bool,
    pause_seq: u64,
    next_breakpoint: u64,
}

impl ControlState {
    fn new() -> Self {
        Self {
            stack: CallStack::new(),
            breakpoints: Vec::new(),
            paused: None,
            wake: None,
            pause_requested: false,
            aborted: false,
            started: false,
            finished: false,
            pause_seq: 0,
            next_breakpoint: 0,
        }
    }

    fn run_state(&self) -> RunState {
        if self.paused.is_some() {
            RunState::Paused
        } else if self.aborted {
            RunState::Aborted
        } else if self.finished {
            RunState::Finished
        } else if self.started {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Decide what happens after the transition just applied to the stack
    fn check(&mut self) -> Verdict {
        if self.aborted {
            return Verdict::Abort;
        }

        let hit = if self.pause_requested {
            self.pause_requested = false;
            Some(BreakpointInfo::pause())
        } else {
            first_match(&mut self.breakpoints, self.stack.nodes())
        };

        self.breakpoints.retain(|bp| {
            if bp.is_expired() {
                tracing::debug!(breakpoint = bp.id(), "removing expired breakpoint");
            }
            !bp.is_expired()
        });

        let Some(breakpoint) = hit else {
            return Verdict::Continue;
        };
        let Some(unit) = self.stack.top().cloned() else {
            return Verdict::Continue;
        };

        // A pending step is complete once execution stops anywhere
        self.breakpoints.retain(|bp| !bp.is_transient());

        self.pause_seq += 1;
        let pause = PauseInfo {
            seq: self.pause_seq,
            breakpoint,
            unit,
            depth: self.stack.len(),
        };
        self.paused = Some(pause.clone());
        self.wake = None;
        Verdict::Pause(pause)
    }
}

/// Evaluate active breakpoints in order and report the first match.
///
/// Predicate errors and panics count as "no match" and leave the breakpoint
/// installed.
fn first_match(breakpoints: &mut [BreakPoint], stack: &[RuntimeNode]) -> Option<BreakpointInfo> {
    for bp in breakpoints.iter_mut() {
        if !bp.is_active() {
            continue;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| bp.matches(stack))) {
            Ok(Ok(true)) => {
                tracing::debug!(breakpoint = bp.id(), "breakpoint matched");
                return Some(bp.info());
            }
            Ok(Ok(false)) => {}
            Ok(Err(e)) => {
                tracing::warn!(breakpoint = bp.id(), error = %e, "Breakpoint predicate failed, treating as no match");
            }
            Err(_) => {
                tracing::warn!(breakpoint = bp.id(), "Breakpoint predicate panicked, treating as no match");
            }
        }
    }
    None
}

struct Shared {
    state: Mutex<ControlState>,
    /// Execution thread waits here while paused
    resumed: Condvar,
    /// Controllers wait here for the next pause or the end of the run
    paused: Condvar,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn DebugListener>)>>,
    next_listener: AtomicU64,
}

/// Handle to the execution control core; clones share the same state
#[derive(Clone)]
pub struct ExecutionController {
    shared: Arc<Shared>,
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ExecutionController")
            .field("state", &state.run_state())
            .field("depth", &state.stack.len())
            .field("breakpoints", &state.breakpoints.len())
            .finish()
    }
}

impl ExecutionController {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControlState::new()),
                resumed: Condvar::new(),
                paused: Condvar::new(),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.shared.state.lock()
    }

    // === Host transitions (execution thread) ===

    /// A unit started. Blocks while a breakpoint holds the run.
    pub fn on_unit_start(&self, kind: UnitKind, name: &str, attributes: Attributes) -> Result<Resumption> {
        let (unit, verdict) = {
            let mut state = self.lock();
            if state.finished {
                state.aborted = true;
                tracing::error!(kind = %kind, name, "unit started after the run was closed");
                return Err(Error::contract(format!(
                    "{}:{} started after the run was closed",
                    kind, name
                )));
            }
            state.started = true;
            state.stack.push(kind, name, attributes);
            let verdict = state.check();
            let unit = state.stack.top().cloned().ok_or(Error::EmptyCallStack)?;
            tracing::trace!(unit = %unit, depth = state.stack.len(), "unit start");
            (unit, verdict)
        };

        self.notify(|l| l.on_unit_start(&unit));
        let resumption = self.suspend(verdict);

        self.lock().stack.set_top_phase(Phase::Running)?;
        Ok(resumption)
    }

    /// The running unit ended. `kind` and `name` must identify the top of
    /// the stack; anything else is a host contract violation.
    pub fn on_unit_end(&self, kind: UnitKind, name: &str, attributes: Attributes) -> Result<Resumption> {
        let (unit, verdict) = {
            let mut state = self.lock();
            let violation = match state.stack.top() {
                None => Some(format!("{}:{} ended but no unit is running", kind, name)),
                Some(top) if !top.is_unit(kind, name) => {
                    Some(format!("{}:{} ended but {} is running", kind, name, top))
                }
                Some(_) => None,
            };
            if let Some(message) = violation {
                state.aborted = true;
                tracing::error!(%message, "host contract violation, aborting run");
                return Err(Error::ContractViolation(message));
            }

            state.stack.advance_to_end(attributes)?;
            let verdict = state.check();
            let unit = state.stack.top().cloned().ok_or(Error::EmptyCallStack)?;
            tracing::trace!(unit = %unit, depth = state.stack.len(), "unit end");
            (unit, verdict)
        };

        self.notify(|l| l.on_unit_end(&unit));
        let resumption = self.suspend(verdict);

        self.lock().stack.pop()?;
        Ok(resumption)
    }

    /// The host finished the run; wakes anyone waiting for a pause
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.stack.is_empty() {
            tracing::warn!(depth = state.stack.len(), "run closed with units still on the stack");
        }
        state.finished = true;
        // Step breakpoints and unit bindings cannot fire once the run is over
        state.breakpoints.retain(|bp| !bp.is_transient() && bp.kind() != BreakpointKind::Runtime);
        self.shared.paused.notify_all();
        tracing::info!(pauses = state.pause_seq, "run finished");
    }

    fn suspend(&self, verdict: Verdict) -> Resumption {
        let pause = match verdict {
            Verdict::Continue => return Resumption::Continue,
            Verdict::Abort => return Resumption::Abort,
            Verdict::Pause(pause) => pause,
        };

        tracing::info!(
            seq = pause.seq,
            breakpoint = %pause.breakpoint.id,
            unit = %pause.unit,
            phase = %pause.unit.phase(),
            "execution paused"
        );
        self.shared.paused.notify_all();
        self.notify(|l| l.on_pause(&pause));

        let resumption = {
            let mut state = self.lock();
            while state.paused.is_some() {
                self.shared.resumed.wait(&mut state);
            }
            state.wake.take().unwrap_or(Resumption::Continue)
        };

        tracing::debug!(seq = pause.seq, ?resumption, "execution resumed");
        self.notify(|l| l.on_resume(resumption));
        resumption
    }

    /// Block until the run pauses, ends, or `timeout` elapses. A timeout
    /// too large to represent waits without a deadline.
    pub fn wait_for_pause(&self, timeout: Option<Duration>) -> WaitOutcome {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.lock();
        loop {
            if let Some(pause) = &state.paused {
                return WaitOutcome::Paused(pause.clone());
            }
            if state.aborted {
                return WaitOutcome::Aborted;
            }
            if state.finished {
                return WaitOutcome::Finished;
            }
            match deadline {
                Some(deadline) => {
                    if self.shared.paused.wait_until(&mut state, deadline).timed_out() {
                        return match &state.paused {
                            Some(pause) => WaitOutcome::Paused(pause.clone()),
                            None => WaitOutcome::TimedOut,
                        };
                    }
                }
                None => self.shared.paused.wait(&mut state),
            }
        }
    }

    // === Listeners ===

    pub fn add_listener(&self, listener: Arc<dyn DebugListener>) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.write().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self, f: impl Fn(&dyn DebugListener)) {
        let listeners: Vec<Arc<dyn DebugListener>> =
            self.shared.listeners.read().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }
}
