//! Step sequencer: which step is active and which moves are legal.
//!
//! Pure state: persistence is the session's job. The session only calls
//! [`StepSequencer::commit_advance`] after the adapter has accepted the save.

use serde::Serialize;

use super::step::{OnboardingStep, STEP_COUNT};
use crate::error::OnboardingError;

/// Result of committing a forward move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved(OnboardingStep),
    Completed,
}

/// Position in the `{0..N-1} × {incomplete, complete}` state space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepSequencer {
    current: OnboardingStep,
    complete: bool,
}

impl StepSequencer {
    /// Start at the persisted step, clamped into range.
    pub fn resume(persisted_step: u32) -> Self {
        let index = (persisted_step as usize).min(STEP_COUNT - 1);
        Self {
            current: OnboardingStep::from_index(index).unwrap_or(OnboardingStep::Welcome),
            complete: false,
        }
    }

    pub fn current(&self) -> OnboardingStep {
        self.current
    }

    /// The current step index, or [`STEP_COUNT`] once complete.
    pub fn index(&self) -> usize {
        if self.complete {
            STEP_COUNT
        } else {
            self.current.index()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Commit a forward move from `from`, the step that was validated and
    /// saved. Moving from the last step completes the flow. Returns `None`
    /// once complete.
    pub fn commit_advance(&mut self, from: OnboardingStep) -> Option<Transition> {
        if self.complete {
            return None;
        }
        match from.next() {
            Some(next) => {
                self.current = next;
                Some(Transition::Moved(next))
            }
            None => {
                self.complete = true;
                Some(Transition::Completed)
            }
        }
    }

    /// Step back one. Returns `false` on the first step or once complete.
    pub fn retreat(&mut self) -> bool {
        if self.complete {
            return false;
        }
        match self.current.previous() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    /// Check a direct jump. Only the welcome step may hand over to the
    /// step right after it.
    pub fn check_jump(&self, to: usize) -> Result<OnboardingStep, OnboardingError> {
        let from = self.index();
        if self.complete || self.current != OnboardingStep::Welcome || to != from + 1 {
            return Err(OnboardingError::InvalidJump { from, to });
        }
        OnboardingStep::from_index(to).ok_or(OnboardingError::InvalidJump { from, to })
    }
}
