//! Quiz session controller
//!
//! Owns one [`QuizAttempt`] and is the only thing allowed to mutate it.
//! Every mutation goes through the state machine in
//! [`crate::state_machine`]; once `Completed`, the attempt is frozen.

use crate::attempt::{AnswerSheet, AttemptId, CompletedAttempt, QuizAttempt};
use crate::error::{SessionError, ValidationIssue};
use crate::evaluator::{evaluate, evaluate_all, Evaluation};
use crate::question::{LessonId, ModuleId, OptionId, Question, QuestionId};
use crate::state_machine::{validate_transition, SessionState};
use std::sync::Arc;

/// Result of `select_answer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Selection recorded (replacing any earlier one)
    Recorded,
    /// Dropped because the session is transitioning
    Ignored,
}

/// Result of `next` / `previous`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Moved to the given index
    Moved(usize),
    /// Already on the first question
    AtStart,
    /// Already on the last question; the caller's cue to `finish`
    AtEnd,
    /// Dropped because the session is transitioning
    Ignored,
}

/// Result of `finish`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// First finish: the evaluated attempt
    Finished(CompletedAttempt),
    /// Session was already completed; nothing happened
    AlreadyCompleted,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    /// Questions in the attempt
    pub total: usize,
    /// Questions with a selection
    pub answered: usize,
    /// Questions without a selection
    pub remaining: usize,
    /// Whether the session has been finished
    pub is_complete: bool,
}

/// Per-attempt state machine
#[derive(Debug, Clone)]
pub struct QuizSession {
    attempt: QuizAttempt,
    completed: Option<CompletedAttempt>,
}

impl QuizSession {
    /// Create a session in `Idle`
    #[must_use]
    pub fn new(
        lesson_id: impl Into<LessonId>,
        module_id: Option<ModuleId>,
        questions: impl Into<Arc<[Question]>>,
    ) -> Self {
        Self {
            attempt: QuizAttempt::new(lesson_id.into(), module_id, questions.into()),
            completed: None,
        }
    }

    /// Create and immediately start a session
    #[must_use]
    pub fn started(
        lesson_id: impl Into<LessonId>,
        module_id: Option<ModuleId>,
        questions: impl Into<Arc<[Question]>>,
    ) -> Self {
        let mut session = Self::new(lesson_id, module_id, questions);
        session.attempt.state = SessionState::InProgress;
        session
    }

    /// Resume an in-progress attempt from saved answers
    ///
    /// The answers are not checked here; [`QuizSession::finish`] rejects a
    /// saved set that no longer matches the questions.
    #[must_use]
    pub fn resume(
        lesson_id: impl Into<LessonId>,
        module_id: Option<ModuleId>,
        questions: impl Into<Arc<[Question]>>,
        answers: AnswerSheet,
    ) -> Self {
        let mut session = Self::started(lesson_id, module_id, questions);
        session.attempt.answers = answers;
        session
    }

    /// `Idle -> InProgress`
    ///
    /// # Errors
    /// `IllegalTransition` unless the session is `Idle`
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::InProgress)
    }

    /// Record a selection for the question at `question_index`
    ///
    /// Re-selecting overwrites (last write wins). Ignored while transitioning.
    ///
    /// # Errors
    /// - `NotInProgress` if the session is idle or completed
    /// - `Validation` if the index or option does not exist
    pub fn select_answer(
        &mut self,
        question_index: usize,
        option_id: impl Into<OptionId>,
    ) -> Result<Selection, SessionError> {
        self.ensure_in_progress()?;
        if self.attempt.state == SessionState::Transitioning {
            tracing::debug!(attempt = %self.attempt.attempt_id, "selection ignored while transitioning");
            return Ok(Selection::Ignored);
        }

        let len = self.attempt.questions.len();
        let question = self
            .attempt
            .questions
            .get(question_index)
            .ok_or(ValidationIssue::IndexOutOfRange {
                index: question_index,
                len,
            })?;

        let option_id = option_id.into();
        if !question.has_option(&option_id) {
            return Err(ValidationIssue::UnknownOption {
                question: question.id.clone(),
                option: option_id,
            }
            .into());
        }

        let question_id = question.id.clone();
        self.attempt.answers.insert(question_id, option_id);
        Ok(Selection::Recorded)
    }

    /// Record a selection by question ID
    ///
    /// # Errors
    /// As [`Self::select_answer`], plus `UnknownQuestion`
    pub fn select_answer_for(
        &mut self,
        question_id: &QuestionId,
        option_id: impl Into<OptionId>,
    ) -> Result<Selection, SessionError> {
        self.ensure_in_progress()?;
        let index = self
            .attempt
            .questions
            .iter()
            .position(|q| &q.id == question_id)
            .ok_or_else(|| ValidationIssue::UnknownQuestion(question_id.clone()))?;
        self.select_answer(index, option_id)
    }

    /// Move to the next question
    ///
    /// # Errors
    /// `NotInProgress` if the session is idle or completed
    pub fn next(&mut self) -> Result<Navigation, SessionError> {
        self.ensure_in_progress()?;
        if self.attempt.state == SessionState::Transitioning {
            return Ok(Navigation::Ignored);
        }
        if self.attempt.current_index >= self.attempt.last_index() {
            return Ok(Navigation::AtEnd);
        }
        self.attempt.current_index += 1;
        Ok(Navigation::Moved(self.attempt.current_index))
    }

    /// Move to the previous question
    ///
    /// # Errors
    /// `NotInProgress` if the session is idle or completed
    pub fn previous(&mut self) -> Result<Navigation, SessionError> {
        self.ensure_in_progress()?;
        if self.attempt.state == SessionState::Transitioning {
            return Ok(Navigation::Ignored);
        }
        if self.attempt.current_index == 0 {
            return Ok(Navigation::AtStart);
        }
        self.attempt.current_index -= 1;
        Ok(Navigation::Moved(self.attempt.current_index))
    }

    /// Enter `Transitioning`. Returns `false` if already transitioning.
    ///
    /// # Errors
    /// `NotInProgress` if the session is idle or completed
    pub fn begin_transition(&mut self) -> Result<bool, SessionError> {
        self.ensure_in_progress()?;
        if self.attempt.state == SessionState::Transitioning {
            return Ok(false);
        }
        self.transition(SessionState::Transitioning)?;
        Ok(true)
    }

    /// Leave `Transitioning`. Returns `false` if not transitioning.
    ///
    /// # Errors
    /// `NotInProgress` if the session is idle or completed
    pub fn end_transition(&mut self) -> Result<bool, SessionError> {
        self.ensure_in_progress()?;
        if self.attempt.state != SessionState::Transitioning {
            return Ok(false);
        }
        self.transition(SessionState::InProgress)?;
        Ok(true)
    }

    /// Finish the attempt: validate, evaluate, freeze
    ///
    /// A second call on a completed session is a no-op.
    ///
    /// # Errors
    /// - `IllegalTransition` from `Idle`
    /// - `Validation` if the answer set is malformed; the session stays in progress
    pub fn finish(&mut self) -> Result<FinishOutcome, SessionError> {
        if self.attempt.state.is_terminal() {
            tracing::debug!(attempt = %self.attempt.attempt_id, "finish on completed session ignored");
            return Ok(FinishOutcome::AlreadyCompleted);
        }
        validate_transition(self.attempt.state, SessionState::Completed)?;
        self.validate_answers()?;

        let score = evaluate_all(&self.attempt.questions, &self.attempt.answers);
        self.attempt.state = SessionState::Completed;

        let completed = CompletedAttempt::from_attempt(&self.attempt, score);
        tracing::info!(
            attempt = %completed.attempt_id,
            lesson = %completed.lesson_id,
            correct = score.correct_count,
            total = score.total_questions,
            "quiz finished"
        );
        self.completed = Some(completed.clone());
        Ok(FinishOutcome::Finished(completed))
    }

    /// Discard this attempt and start a fresh one on the same questions
    ///
    /// Grants already issued for the old attempt are untouched.
    pub fn retake(&mut self) -> AttemptId {
        let previous = self.attempt.attempt_id;
        self.attempt = QuizAttempt::new(
            self.attempt.lesson_id.clone(),
            self.attempt.module_id.clone(),
            Arc::clone(&self.attempt.questions),
        );
        self.attempt.state = SessionState::InProgress;
        self.completed = None;
        tracing::debug!(%previous, attempt = %self.attempt.attempt_id, "quiz retake");
        self.attempt.attempt_id
    }

    /// Feedback for the question at `index` given the current selection
    #[must_use]
    pub fn feedback(&self, index: usize) -> Option<Evaluation<'_>> {
        let question = self.attempt.questions.get(index)?;
        Some(evaluate(question, self.attempt.answers.get(&question.id)))
    }

    /// Progress summary
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.attempt.questions.len();
        let answered = self
            .attempt
            .questions
            .iter()
            .filter(|q| self.attempt.answers.contains_key(&q.id))
            .count();
        SessionProgress {
            total,
            answered,
            remaining: total - answered,
            is_complete: self.attempt.state.is_terminal(),
        }
    }

    /// Underlying attempt (read-only)
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> &QuizAttempt {
        &self.attempt
    }

    /// Attempt ID
    #[inline]
    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt.attempt_id
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.attempt.state
    }

    /// Current question index
    #[inline]
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.attempt.current_index
    }

    /// Question on screen
    #[inline]
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.attempt.current_question()
    }

    /// The frozen attempt, once finished
    #[inline]
    #[must_use]
    pub fn completed(&self) -> Option<&CompletedAttempt> {
        self.completed.as_ref()
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.attempt.state.is_in_progress() {
            Ok(())
        } else {
            Err(SessionError::NotInProgress(self.attempt.state))
        }
    }

    fn transition(&mut self, to: SessionState) -> Result<(), SessionError> {
        validate_transition(self.attempt.state, to)?;
        tracing::trace!(attempt = %self.attempt.attempt_id, from = ?self.attempt.state, ?to, "session transition");
        self.attempt.state = to;
        Ok(())
    }

    fn validate_answers(&self) -> Result<(), ValidationIssue> {
        for (question_id, option_id) in &self.attempt.answers {
            let question = self
                .attempt
                .questions
                .iter()
                .find(|q| &q.id == question_id)
                .ok_or_else(|| ValidationIssue::UnknownQuestion(question_id.clone()))?;
            if !question.has_option(option_id) {
                return Err(ValidationIssue::UnknownOption {
                    question: question_id.clone(),
                    option: option_id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::AnswerOption;
    use pretty_assertions::assert_eq;

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| {
                Question::new(
                    format!("q{i}"),
                    format!("question {i}"),
                    vec![AnswerOption::new("a", "A"), AnswerOption::new("b", "B")],
                    "a",
                )
            })
            .collect()
    }

    fn session(n: usize) -> QuizSession {
        QuizSession::started("lesson-1", None, questions(n))
    }

    #[test]
    fn idle_session_rejects_selection() {
        let mut s = QuizSession::new("lesson-1", None, questions(2));
        assert_eq!(
            s.select_answer(0, "a"),
            Err(SessionError::NotInProgress(SessionState::Idle))
        );
        s.start().unwrap();
        assert_eq!(s.select_answer(0, "a"), Ok(Selection::Recorded));
    }

    #[test]
    fn reselection_last_write_wins() {
        let mut s = session(1);
        s.select_answer(0, "b").unwrap();
        s.select_answer(0, "a").unwrap();
        assert_eq!(s.attempt().answers.len(), 1);
        assert!(s.feedback(0).unwrap().is_correct());
    }

    #[test]
    fn selection_ignored_while_transitioning() {
        let mut s = session(2);
        assert!(s.begin_transition().unwrap());
        assert!(!s.begin_transition().unwrap());
        assert_eq!(s.select_answer(0, "a"), Ok(Selection::Ignored));
        assert_eq!(s.next(), Ok(Navigation::Ignored));
        assert!(s.end_transition().unwrap());
        assert!(s.attempt().answers.is_empty());
    }

    #[test]
    fn navigation_is_clamped() {
        let mut s = session(2);
        assert_eq!(s.previous(), Ok(Navigation::AtStart));
        assert_eq!(s.next(), Ok(Navigation::Moved(1)));
        assert_eq!(s.next(), Ok(Navigation::AtEnd));
        assert_eq!(s.current_index(), 1);
        assert_eq!(s.previous(), Ok(Navigation::Moved(0)));
    }

    #[test]
    fn invalid_option_is_rejected() {
        let mut s = session(1);
        let err = s.select_answer(0, "zzz").unwrap_err();
        assert!(err.is_validation());
        let err = s.select_answer(5, "a").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationIssue::IndexOutOfRange { index: 5, len: 1 })
        ));
    }

    #[test]
    fn finish_rejects_foreign_question_and_stays_in_progress() {
        let s = session(2);
        let mut saved = s.attempt().answers.clone();
        saved.insert(QuestionId::new("not-in-quiz"), OptionId::new("a"));
        let mut s = QuizSession::resume("lesson", None, Arc::clone(&s.attempt().questions), saved);
        let err = s.finish().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationIssue::UnknownQuestion(_))
        ));
        assert_eq!(s.state(), SessionState::InProgress);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut s = session(3);
        for i in 0..3 {
            s.select_answer(i, "a").unwrap();
        }
        let FinishOutcome::Finished(done) = s.finish().unwrap() else {
            panic!("expected first finish to evaluate");
        };
        assert!(done.score.is_perfect());
        assert_eq!(s.finish().unwrap(), FinishOutcome::AlreadyCompleted);
        assert_eq!(s.completed(), Some(&done));
    }

    #[test]
    fn completed_session_rejects_mutation() {
        let mut s = session(1);
        s.finish().unwrap();
        assert!(matches!(s.select_answer(0, "a"), Err(SessionError::NotInProgress(_))));
        assert!(matches!(s.next(), Err(SessionError::NotInProgress(_))));
        assert!(matches!(s.previous(), Err(SessionError::NotInProgress(_))));
    }

    #[test]
    fn retake_starts_fresh_attempt() {
        let mut s = session(2);
        s.select_answer(0, "a").unwrap();
        s.next().unwrap();
        s.finish().unwrap();
        let old = s.attempt_id();

        let new = s.retake();
        assert_ne!(old, new);
        assert_eq!(s.state(), SessionState::InProgress);
        assert_eq!(s.current_index(), 0);
        assert!(s.attempt().answers.is_empty());
        assert!(s.completed().is_none());
    }

    #[test]
    fn progress_counts_answers() {
        let mut s = session(3);
        s.select_answer(1, "b").unwrap();
        let p = s.progress();
        assert_eq!((p.total, p.answered, p.remaining), (3, 1, 2));
        assert!(!p.is_complete);
    }
}
