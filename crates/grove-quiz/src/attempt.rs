//! Quiz attempt data
//!
//! A [`QuizAttempt`] is created per lesson or module visit and is mutated
//! only through [`crate::QuizSession`]. Once finished it is frozen into a
//! [`CompletedAttempt`], which is what the reward and sync layers consume.

use crate::evaluator::ScoreSummary;
use crate::question::{LessonId, ModuleId, OptionId, Question, QuestionId};
use crate::state_machine::SessionState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use ulid::Ulid;

/// Unique attempt identifier (ULID for sortability)
///
/// Keys the idempotency marker: one grant at most per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub Ulid);

impl AttemptId {
    /// Generate new attempt ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Selected option per question
pub type AnswerSheet = BTreeMap<QuestionId, OptionId>;

/// Mutable per-attempt record
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    /// Attempt ID
    pub attempt_id: AttemptId,
    /// Lesson being quizzed
    pub lesson_id: LessonId,
    /// Owning module, for module-level quizzes
    pub module_id: Option<ModuleId>,
    /// Questions in display order (shared, immutable)
    pub questions: Arc<[Question]>,
    /// Selections so far
    pub answers: AnswerSheet,
    /// Index of the question on screen
    pub current_index: usize,
    /// Lifecycle state
    pub state: SessionState,
}

impl QuizAttempt {
    /// Fresh attempt in `Idle`
    #[must_use]
    pub fn new(lesson_id: LessonId, module_id: Option<ModuleId>, questions: Arc<[Question]>) -> Self {
        Self {
            attempt_id: AttemptId::new(),
            lesson_id,
            module_id,
            questions,
            answers: AnswerSheet::new(),
            current_index: 0,
            state: SessionState::Idle,
        }
    }

    /// Question currently on screen
    #[inline]
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    /// Index of the last question (0 for an empty quiz)
    #[inline]
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }
}

/// One answer as sent to the remote source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    /// Question ID
    pub question_id: QuestionId,
    /// Selected option
    pub answer_id: OptionId,
}

/// Frozen, evaluated attempt handed to the reward and sync layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedAttempt {
    /// Attempt ID
    pub attempt_id: AttemptId,
    /// Lesson ID
    pub lesson_id: LessonId,
    /// Module ID, if any
    pub module_id: Option<ModuleId>,
    /// Answers in question order (unanswered questions omitted)
    pub answers: Vec<SubmittedAnswer>,
    /// Local evaluation
    pub score: ScoreSummary,
}

impl CompletedAttempt {
    /// Freeze an attempt with its evaluated score
    #[must_use]
    pub fn from_attempt(attempt: &QuizAttempt, score: ScoreSummary) -> Self {
        let answers = attempt
            .questions
            .iter()
            .filter_map(|q| {
                attempt.answers.get(&q.id).map(|answer| SubmittedAnswer {
                    question_id: q.id.clone(),
                    answer_id: answer.clone(),
                })
            })
            .collect();

        Self {
            attempt_id: attempt.attempt_id,
            lesson_id: attempt.lesson_id.clone(),
            module_id: attempt.module_id.clone(),
            answers,
            score,
        }
    }
}
