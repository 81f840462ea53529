//! Answer evaluation
//!
//! Pure functions: no I/O, no state. A question without a selection is
//! reported as [`Verdict::Unanswered`] and never counts as wrong.

use crate::attempt::AnswerSheet;
use crate::question::{OptionId, Question};
use serde::{Deserialize, Serialize};

/// Outcome for a single question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Selected option is the correct one
    Correct,
    /// Selected option is not the correct one
    Incorrect,
    /// Nothing selected; excluded from the score
    Unanswered,
}

/// Evaluation of one question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation<'q> {
    /// Verdict
    pub verdict: Verdict,
    /// Explanation text of the question
    pub explanation: &'q str,
}

impl Evaluation<'_> {
    /// Whether the selection was correct
    #[inline]
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.verdict == Verdict::Correct
    }
}

/// Evaluate a single selection
#[must_use]
pub fn evaluate<'q>(question: &'q Question, selected: Option<&OptionId>) -> Evaluation<'q> {
    let verdict = match selected {
        None => Verdict::Unanswered,
        Some(option) if *option == question.correct_option_id => Verdict::Correct,
        Some(_) => Verdict::Incorrect,
    };

    Evaluation {
        verdict,
        explanation: &question.explanation,
    }
}

/// Aggregate score of an attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Correctly answered questions
    pub correct_count: u32,
    /// Questions in the attempt
    pub total_questions: u32,
    /// Questions with a selection
    pub answered_count: u32,
}

impl ScoreSummary {
    /// Build a summary where every question was answered
    #[inline]
    #[must_use]
    pub fn new(correct_count: u32, total_questions: u32) -> Self {
        Self {
            correct_count: correct_count.min(total_questions),
            total_questions,
            answered_count: total_questions,
        }
    }

    /// Answered but wrong
    #[inline]
    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.answered_count.saturating_sub(self.correct_count)
    }

    /// Every question answered correctly (and there was at least one)
    #[inline]
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.total_questions > 0 && self.correct_count == self.total_questions
    }
}

/// Evaluate the whole answer sheet against the question list
///
/// Answers for questions not in `questions` are ignored here; the session
/// controller rejects such sheets before they reach evaluation.
#[must_use]
pub fn evaluate_all(questions: &[Question], answers: &AnswerSheet) -> ScoreSummary {
    let mut summary = ScoreSummary {
        total_questions: saturating_u32(questions.len()),
        ..ScoreSummary::default()
    };

    for question in questions {
        match evaluate(question, answers.get(&question.id)).verdict {
            Verdict::Correct => {
                summary.correct_count += 1;
                summary.answered_count += 1;
            }
            Verdict::Incorrect => summary.answered_count += 1,
            Verdict::Unanswered => {}
        }
    }

    summary
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::{AnswerOption, QuestionId};
    use proptest::prelude::*;

    fn question(id: &str) -> Question {
        Question::new(
            id,
            format!("question {id}"),
            vec![AnswerOption::new("a", "A"), AnswerOption::new("b", "B")],
            "a",
        )
        .with_explanation("A is right")
    }

    #[test]
    fn evaluate_reports_verdict_and_explanation() {
        let q = question("q1");

        let correct = evaluate(&q, Some(&OptionId::new("a")));
        assert!(correct.is_correct());
        assert_eq!(correct.explanation, "A is right");

        let wrong = evaluate(&q, Some(&OptionId::new("b")));
        assert_eq!(wrong.verdict, Verdict::Incorrect);

        let skipped = evaluate(&q, None);
        assert_eq!(skipped.verdict, Verdict::Unanswered);
        assert!(!skipped.is_correct());
    }

    #[test]
    fn unanswered_is_not_counted_as_wrong() {
        let questions = vec![question("q1"), question("q2"), question("q3")];
        let mut answers = AnswerSheet::new();
        answers.insert(QuestionId::new("q1"), OptionId::new("a"));
        answers.insert(QuestionId::new("q2"), OptionId::new("b"));

        let summary = evaluate_all(&questions, &answers);
        assert_eq!(summary.correct_count, 1);
        assert_eq!(summary.total_questions, 3);
        assert_eq!(summary.answered_count, 2);
        assert_eq!(summary.incorrect_count(), 1);
        assert!(!summary.is_perfect());
    }

    #[test]
    fn empty_quiz_is_never_perfect() {
        let summary = evaluate_all(&[], &AnswerSheet::new());
        assert_eq!(summary, ScoreSummary::default());
        assert!(!summary.is_perfect());
    }

    proptest! {
        #[test]
        fn prop_correct_never_exceeds_total(picks in proptest::collection::vec(0u8..3, 0..20)) {
            let questions: Vec<Question> =
                (0..picks.len()).map(|i| question(&format!("q{i}"))).collect();
            let mut answers = AnswerSheet::new();
            for (q, pick) in questions.iter().zip(&picks) {
                match pick {
                    0 => {}
                    1 => { answers.insert(q.id.clone(), OptionId::new("a")); }
                    _ => { answers.insert(q.id.clone(), OptionId::new("b")); }
                }
            }

            let summary = evaluate_all(&questions, &answers);
            prop_assert!(summary.correct_count <= summary.answered_count);
            prop_assert!(summary.answered_count <= summary.total_questions);
        }
    }
}
