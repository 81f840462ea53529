//! Error types for quiz sessions

use crate::question::{OptionId, QuestionId};
use crate::state_machine::SessionState;

/// Session controller errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// State machine rejected the transition
    #[error("illegal session transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },

    /// Operation needs an in-progress session
    #[error("session is not in progress (state: {0:?})")]
    NotInProgress(SessionState),

    /// Malformed answer set
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationIssue),
}

impl SessionError {
    /// Validation failures leave the attempt in progress and can be corrected
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// What was wrong with an answer set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    /// Answer references a question outside the attempt
    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    /// Answer references an option the question does not have
    #[error("unknown option {option} for question {question}")]
    UnknownOption {
        /// Question ID
        question: QuestionId,
        /// Rejected option
        option: OptionId,
    },

    /// Question index past the end of the attempt
    #[error("question index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of questions
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_display() {
        let err = SessionError::from(ValidationIssue::UnknownQuestion(QuestionId::new("q9")));
        assert!(err.to_string().contains("unknown question: q9"));
        assert!(err.is_validation());
        assert!(!SessionError::NotInProgress(SessionState::Idle).is_validation());
    }
}
