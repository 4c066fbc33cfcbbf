//! Controller-facing command API
//!
//! Every method here may be called from any thread. Breakpoint mutations made
//! while the run is between transitions take effect at the next transition.

use std::time::Duration;

use super::{ControlState, ExecutionController, PauseInfo, Resumption, RunState, StatusInfo, WaitOutcome};
use crate::breakpoints::{BreakPoint, BreakpointInfo, BreakpointSpec};
use crate::common::{Error, Result};
use crate::runtime::{Phase, RuntimeNode};

impl ControlState {
    fn require_suspended(&self) -> Result<&PauseInfo> {
        self.paused.as_ref().ok_or(Error::NotSuspended)
    }

    fn find(&self, id: &str) -> Result<usize> {
        self.breakpoints
            .iter()
            .position(|bp| bp.id() == id)
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))
    }

    fn next_id(&mut self) -> String {
        loop {
            self.next_breakpoint += 1;
            let id = format!("bp{}", self.next_breakpoint);
            if self.breakpoints.iter().all(|bp| bp.id() != id) {
                return id;
            }
        }
    }

    /// Step breakpoints live for a single pause, so the pause number is
    /// unique among them; a user id of the same form gets a suffix added
    fn step_id(&self, command: &str) -> String {
        let base = format!("{}@{}", command, self.pause_seq);
        let taken = |id: &str| self.breakpoints.iter().any(|bp| bp.id() == id);
        if !taken(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let id = format!("{}.{}", base, n);
            if !taken(&id) {
                return id;
            }
            n += 1;
        }
    }
}

impl ExecutionController {
    /// Install `transient` (if any) and release the execution thread
    fn wake(&self, command: &str, transient: impl FnOnce(&mut ControlState) -> Result<Option<BreakPoint>>) -> Result<()> {
        let mut state = self.lock();
        let seq = state.require_suspended()?.seq;
        if let Some(bp) = transient(&mut *state)? {
            tracing::debug!(command, breakpoint = %bp, "installing step breakpoint");
            state.breakpoints.push(bp.into_transient());
        }
        state.paused = None;
        state.wake = Some(Resumption::Continue);
        self.shared.resumed.notify_all();
        tracing::info!(command, seq, "resuming execution");
        Ok(())
    }

    // === Stepping ===

    /// Resume without installing anything
    pub fn resume(&self) -> Result<()> {
        self.wake("continue", |_| Ok(None))
    }

    /// Alias for [`resume`](Self::resume)
    pub fn step_on(&self) -> Result<()> {
        self.resume()
    }

    /// Pause at the next unit start at any depth
    pub fn step_into(&self) -> Result<()> {
        self.wake("into", |state| {
            let id = state.step_id("into");
            BreakPoint::semaphore(id, 1).map(Some)
        })
    }

    /// At a unit start, run the unit to completion and pause at whatever
    /// starts next. At a unit end this behaves like `step_into`.
    pub fn step_over(&self) -> Result<()> {
        self.wake("over", |state| {
            let id = state.step_id("over");
            let unit = state.require_suspended()?.unit.clone();
            let current = state.stack.top().cloned().unwrap_or(unit);
            if current.phase() == Phase::Start {
                BreakPoint::runtime(id, &current, Phase::Done).map(Some)
            } else {
                BreakPoint::semaphore(id, 1).map(Some)
            }
        })
    }

    /// Pause when the enclosing unit ends
    pub fn step_return(&self) -> Result<()> {
        self.wake("return", |state| {
            let parent = state
                .stack
                .parent()
                .cloned()
                .ok_or_else(|| Error::invalid_state("step out", "in the outermost unit"))?;
            let id = state.step_id("return");
            BreakPoint::runtime(id, &parent, Phase::End).map(Some)
        })
    }

    /// Pause after `count` more unit starts
    pub fn step(&self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidStepCount(count));
        }
        self.wake("step", |state| {
            let id = state.step_id("step");
            BreakPoint::semaphore(id, count).map(Some)
        })
    }

    /// Treat the next transition as a match
    pub fn pause(&self) -> Result<()> {
        let mut state = self.lock();
        match state.run_state() {
            RunState::Paused | RunState::Aborted | RunState::Finished => {
                let current = state.run_state().to_string();
                return Err(Error::invalid_state("pause", &current));
            }
            RunState::Idle | RunState::Running => {}
        }
        state.pause_requested = true;
        tracing::info!("pause requested");
        Ok(())
    }

    /// Terminate the run: wakes a suspended thread with `Abort`, otherwise
    /// aborts at the next transition
    pub fn abort(&self) -> Result<()> {
        let mut state = self.lock();
        if state.finished {
            return Err(Error::invalid_state("abort", "finished"));
        }
        state.aborted = true;
        state.pause_requested = false;
        if state.paused.take().is_some() {
            state.wake = Some(Resumption::Abort);
            self.shared.resumed.notify_all();
        }
        self.shared.paused.notify_all();
        tracing::info!("run abort requested");
        Ok(())
    }

    // === Breakpoint set ===

    pub fn add(&self, breakpoint: BreakPoint) -> Result<BreakpointInfo> {
        let mut state = self.lock();
        if state.breakpoints.iter().any(|bp| bp.id() == breakpoint.id()) {
            return Err(Error::DuplicateBreakpoint(breakpoint.id().to_string()));
        }
        let info = breakpoint.info();
        tracing::debug!(breakpoint = %breakpoint, "breakpoint added");
        state.breakpoints.push(breakpoint);
        Ok(info)
    }

    /// Build and install a breakpoint from its wire description. A missing id
    /// is generated as `bpN`.
    pub fn add_spec(&self, spec: &BreakpointSpec) -> Result<BreakpointInfo> {
        let mut state = self.lock();
        let id = match spec.id() {
            Some(id) => {
                if state.breakpoints.iter().any(|bp| bp.id() == id) {
                    return Err(Error::DuplicateBreakpoint(id.to_string()));
                }
                id.to_string()
            }
            None => state.next_id(),
        };
        let breakpoint = spec.build(id, state.stack.nodes())?;
        let info = breakpoint.info();
        tracing::debug!(breakpoint = %breakpoint, "breakpoint added");
        state.breakpoints.push(breakpoint);
        Ok(info)
    }

    pub fn remove(&self, id: &str) -> Result<BreakpointInfo> {
        let mut state = self.lock();
        let index = state.find(id)?;
        let removed = state.breakpoints.remove(index);
        tracing::debug!(breakpoint = id, "breakpoint removed");
        Ok(removed.info())
    }

    /// Remove every breakpoint, returning how many there were
    pub fn remove_all(&self) -> usize {
        let mut state = self.lock();
        let count = state.breakpoints.len();
        state.breakpoints.clear();
        count
    }

    pub fn enable(&self, id: &str) -> Result<BreakpointInfo> {
        self.set_active(id, true)
    }

    pub fn disable(&self, id: &str) -> Result<BreakpointInfo> {
        self.set_active(id, false)
    }

    /// Flip the active flag, returning the new value
    pub fn toggle(&self, id: &str) -> Result<bool> {
        let mut state = self.lock();
        let index = state.find(id)?;
        let bp = &mut state.breakpoints[index];
        let active = !bp.is_active();
        bp.set_active(active);
        Ok(active)
    }

    fn set_active(&self, id: &str, active: bool) -> Result<BreakpointInfo> {
        let mut state = self.lock();
        let index = state.find(id)?;
        let bp = &mut state.breakpoints[index];
        bp.set_active(active);
        Ok(bp.info())
    }

    /// Identifier of the first breakpoint whose pattern text equals `pattern`
    pub fn find_by_pattern(&self, pattern: &str) -> Option<String> {
        self.lock()
            .breakpoints
            .iter()
            .find(|bp| bp.pattern().as_deref() == Some(pattern))
            .map(|bp| bp.id().to_string())
    }

    // === Accessors ===

    /// Snapshot of the stack, outermost first
    pub fn call_stack(&self) -> Vec<RuntimeNode> {
        self.lock().stack.snapshot()
    }

    pub fn breakpoints(&self) -> Vec<BreakpointInfo> {
        self.lock().breakpoints.iter().map(BreakPoint::info).collect()
    }

    /// The breakpoint holding the run, if suspended
    pub fn active_breakpoint(&self) -> Option<BreakpointInfo> {
        self.lock().paused.as_ref().map(|p| p.breakpoint.clone())
    }

    pub fn paused_at(&self) -> Option<PauseInfo> {
        self.lock().paused.clone()
    }

    pub fn is_suspended(&self) -> bool {
        self.lock().paused.is_some()
    }

    pub fn run_state(&self) -> RunState {
        self.lock().run_state()
    }

    pub fn status(&self) -> StatusInfo {
        let state = self.lock();
        StatusInfo {
            state: state.run_state(),
            depth: state.stack.len(),
            current: state.stack.top().cloned(),
            paused_at: state.paused.clone(),
            breakpoints: state.breakpoints.len(),
            pauses: state.pause_seq,
        }
    }

    /// Like [`wait_for_pause`](Self::wait_for_pause) but maps a timeout to an error
    pub fn await_pause(&self, timeout: Duration) -> Result<WaitOutcome> {
        match self.wait_for_pause(Some(timeout)) {
            WaitOutcome::TimedOut => Err(Error::AwaitTimeout(timeout.as_secs())),
            outcome => Ok(outcome),
        }
    }
}
