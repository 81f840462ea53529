//! Session state machine
//!
//! `Idle -> InProgress -> Completed`, with `Transitioning` as a transient
//! sub-state of `InProgress` held while the host animates between questions.
//! `Completed` is terminal for an attempt; a retake starts a new attempt.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, not started
    #[default]
    Idle,
    /// Accepting answers and navigation
    InProgress,
    /// In progress, advancing between questions; selections are ignored
    Transitioning,
    /// Finished and evaluated
    Completed,
}

impl SessionState {
    /// `InProgress` or its `Transitioning` sub-state
    #[inline]
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::InProgress | Self::Transitioning)
    }

    /// Terminal state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

/// Validates a state transition.
///
/// Illegal transitions return an error; with the `strict-debug` feature they
/// panic instead so tests surface them at the call site.
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<(), SessionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal session transition attempted: {from:?} -> {to:?}");

        Err(SessionError::IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SessionState) -> Vec<SessionState> {
    use SessionState::{Completed, Idle, InProgress, Transitioning};
    match from {
        Idle => vec![InProgress],
        InProgress => vec![Transitioning, Completed],
        Transitioning => vec![InProgress, Completed],
        Completed => vec![],
    }
}

fn allowed(from: SessionState, to: SessionState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
