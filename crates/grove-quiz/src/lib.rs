//! Grove Quiz
//!
//! Questions, answer evaluation and the per-attempt session controller.
//!
//! # Core Concepts
//!
//! - [`Question`]: immutable multiple-choice question
//! - [`evaluate`] / [`evaluate_all`]: pure answer evaluation
//! - [`QuizSession`]: `Idle -> InProgress -> Completed` state machine
//! - [`CompletedAttempt`]: frozen, evaluated attempt handed to the reward layer
//!
//! # Example
//!
//! ```rust
//! use grove_quiz::{AnswerOption, FinishOutcome, Navigation, Question, QuizSession};
//!
//! let questions = vec![Question::new(
//!     "q1",
//!     "What do seedlings need?",
//!     vec![AnswerOption::new("a", "Light"), AnswerOption::new("b", "Darkness")],
//!     "a",
//! )];
//!
//! let mut session = QuizSession::started("lesson-1", None, questions);
//! session.select_answer(0, "a").unwrap();
//! assert_eq!(session.next().unwrap(), Navigation::AtEnd);
//!
//! let FinishOutcome::Finished(done) = session.finish().unwrap() else { unreachable!() };
//! assert_eq!(done.score.correct_count, 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod attempt;
pub mod error;
pub mod evaluator;
pub mod question;
pub mod session;
pub mod state_machine;

// Re-exports
pub use attempt::{AnswerSheet, AttemptId, CompletedAttempt, QuizAttempt, SubmittedAnswer};
pub use error::{SessionError, ValidationIssue};
pub use evaluator::{evaluate, evaluate_all, Evaluation, ScoreSummary, Verdict};
pub use question::{AnswerOption, LessonId, ModuleId, OptionId, Question, QuestionId};
pub use session::{FinishOutcome, Navigation, QuizSession, Selection, SessionProgress};
pub use state_machine::{allowed_transitions, validate_transition, SessionState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
