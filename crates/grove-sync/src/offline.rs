//! Offline and demo backend
//!
//! Serves the bundled sample content and grades submissions in-process with
//! the same ledger and reward rules as the live service, returning the same
//! response shapes. Used when the service is unreachable or for sample
//! content.

use crate::backend::ProgressBackend;
use crate::error::TransportError;
use crate::wire::{
    BadgeId, ModuleSummary, ProgressSummary, SubmitRequest, SubmitResponse, WireTreeState,
};
use async_trait::async_trait;
use chrono::Utc;
use grove_ledger::{apply_growth_delta, GrowthRules, TreeState};
use grove_quiz::{evaluate_all, AnswerSheet, LessonId, ModuleId, Question};
use grove_reward::{compute_reward, RewardRates};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

const BUNDLED: &str = include_str!("../data/sample_lessons.json");

/// Problems loading a dataset
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Not valid dataset JSON
    #[error("dataset parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A question's correct option is not among its options
    #[error("malformed question {question} in lesson {lesson}")]
    MalformedQuestion {
        /// Lesson ID
        lesson: LessonId,
        /// Question ID
        question: String,
    },

    /// The same lesson ID appears twice
    #[error("duplicate lesson: {0}")]
    DuplicateLesson(LessonId),
}

/// One lesson's quiz content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    /// Lesson ID
    pub id: LessonId,
    /// Title
    pub title: String,
    /// Quiz questions
    pub questions: Vec<Question>,
}

/// A module and its lessons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleContent {
    /// Module ID
    pub id: ModuleId,
    /// Title
    pub title: String,
    /// Lessons in order
    pub lessons: Vec<LessonContent>,
}

/// Sample content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineDataset {
    /// Modules in order
    pub modules: Vec<ModuleContent>,
}

impl OfflineDataset {
    /// The dataset compiled into this crate
    ///
    /// # Errors
    /// Only if the bundled file is broken
    pub fn bundled() -> Result<Self, DatasetError> {
        Self::from_json(BUNDLED)
    }

    /// Parse and check a dataset
    ///
    /// # Errors
    /// Parse failures, malformed questions, duplicate lessons
    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        let dataset: Self = serde_json::from_str(json)?;
        let mut seen = BTreeSet::new();
        for lesson in dataset.lessons() {
            if !seen.insert(&lesson.id) {
                return Err(DatasetError::DuplicateLesson(lesson.id.clone()));
            }
            if let Some(q) = lesson.questions.iter().find(|q| !q.is_well_formed()) {
                return Err(DatasetError::MalformedQuestion {
                    lesson: lesson.id.clone(),
                    question: q.id.to_string(),
                });
            }
        }
        Ok(dataset)
    }

    /// All lessons across modules
    pub fn lessons(&self) -> impl Iterator<Item = &LessonContent> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    /// Look up a lesson
    #[must_use]
    pub fn lesson(&self, id: &LessonId) -> Option<&LessonContent> {
        self.lessons().find(|l| &l.id == id)
    }

    /// Module containing a lesson
    #[must_use]
    pub fn module_of(&self, lesson: &LessonId) -> Option<&ModuleContent> {
        self.modules
            .iter()
            .find(|m| m.lessons.iter().any(|l| &l.id == lesson))
    }
}

#[derive(Debug)]
struct LearnerRecord {
    tree: TreeState,
    coins: u64,
    completed_lessons: BTreeSet<LessonId>,
    badges: BTreeSet<BadgeId>,
}

/// In-process stand-in for the progression service
#[derive(Debug)]
pub struct OfflineBackend {
    dataset: Arc<OfflineDataset>,
    rates: RewardRates,
    record: Mutex<LearnerRecord>,
}

impl OfflineBackend {
    /// Fresh learner on the given content and rules
    #[must_use]
    pub fn new(dataset: Arc<OfflineDataset>, rules: GrowthRules, rates: RewardRates) -> Self {
        Self {
            dataset,
            rates,
            record: Mutex::new(LearnerRecord {
                tree: TreeState::new(rules),
                coins: 0,
                completed_lessons: BTreeSet::new(),
                badges: BTreeSet::new(),
            }),
        }
    }

    /// Start the learner with some growth points already earned
    #[must_use]
    pub fn with_growth_points(self, points: u64) -> Self {
        {
            let mut record = self.record.lock();
            let rules = record.tree.rules();
            record.tree = TreeState::from_points(rules, points, Some(Utc::now()));
        }
        self
    }

    /// Content being served
    #[inline]
    #[must_use]
    pub fn dataset(&self) -> &OfflineDataset {
        &self.dataset
    }

    /// Current learner ledger
    #[must_use]
    pub fn tree(&self) -> TreeState {
        self.record.lock().tree.clone()
    }

    fn grade(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        let lesson = self
            .dataset
            .lesson(&request.lesson_id)
            .ok_or_else(|| TransportError::Status {
                status: 404,
                message: format!("unknown lesson {}", request.lesson_id),
            })?;

        let mut sheet = AnswerSheet::new();
        for answer in &request.answers {
            if !lesson.questions.iter().any(|q| q.id == answer.question_id) {
                return Err(TransportError::Status {
                    status: 422,
                    message: format!("question {} not in lesson", answer.question_id),
                });
            }
            sheet.insert(answer.question_id.clone(), answer.answer_id.clone());
        }

        let score = evaluate_all(&lesson.questions, &sheet);
        let reward = compute_reward(score, self.rates);

        let mut record = self.record.lock();
        let outcome = apply_growth_delta(&record.tree, reward.growth_points_earned, Utc::now());
        record.tree = outcome.ledger.clone();
        record.coins = record.coins.saturating_add(reward.coins_earned);
        record.completed_lessons.insert(lesson.id.clone());
        if reward.badge_earned {
            record.badges.insert(BadgeId::perfect(&lesson.id));
        }

        Ok(SubmitResponse {
            success: true,
            correct_count: score.correct_count,
            total_questions: score.total_questions,
            growth_points_earned: reward.growth_points_earned,
            fertilizer_bonus: reward.fertilizer_bonus,
            coins_earned: reward.coins_earned,
            tree_state: WireTreeState::from_outcome(&outcome),
        })
    }

    fn summarize(&self) -> ProgressSummary {
        let record = self.record.lock();
        let modules = self
            .dataset
            .modules
            .iter()
            .map(|m| {
                let total = m.lessons.len();
                let done = m
                    .lessons
                    .iter()
                    .filter(|l| record.completed_lessons.contains(&l.id))
                    .count();
                ModuleSummary {
                    module_id: m.id.clone(),
                    lessons_completed: u32::try_from(done).unwrap_or(u32::MAX),
                    lessons_total: u32::try_from(total).unwrap_or(u32::MAX),
                    completed: total > 0 && done == total,
                }
            })
            .collect();

        ProgressSummary {
            coin_balance: record.coins,
            tree_state: WireTreeState::from_tree(&record.tree),
            completed_lessons: record.completed_lessons.iter().cloned().collect(),
            modules,
            badges: record.badges.iter().cloned().collect(),
        }
    }
}

#[async_trait]
impl ProgressBackend for OfflineBackend {
    async fn submit_quiz(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        self.grade(request)
    }

    async fn fetch_summary(&self) -> Result<ProgressSummary, TransportError> {
        Ok(self.summarize())
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_quiz::{OptionId, QuestionId, SubmittedAnswer};

    fn backend() -> OfflineBackend {
        OfflineBackend::new(
            Arc::new(OfflineDataset::bundled().unwrap()),
            GrowthRules::default(),
            RewardRates::default(),
        )
    }

    fn all_correct(lesson: &LessonContent) -> SubmitRequest {
        SubmitRequest {
            lesson_id: lesson.id.clone(),
            answers: lesson
                .questions
                .iter()
                .map(|q| SubmittedAnswer {
                    question_id: q.id.clone(),
                    answer_id: q.correct_option_id.clone(),
                })
                .collect(),
        }
    }

    #[test]
    fn bundled_dataset_loads() {
        let dataset = OfflineDataset::bundled().unwrap();
        assert_eq!(dataset.modules.len(), 2);
        assert_eq!(dataset.lessons().count(), 3);
        let lesson = dataset.lesson(&LessonId::new("budgeting-101")).unwrap();
        assert_eq!(lesson.questions.len(), 3);
        assert_eq!(
            dataset.module_of(&lesson.id).map(|m| m.id.as_str()),
            Some("money-basics")
        );
    }

    #[test]
    fn malformed_dataset_is_rejected() {
        let json = r#"{"modules":[{"id":"m","title":"M","lessons":[{"id":"l","title":"L","questions":[
            {"id":"q","text":"?","options":[{"id":"a","text":"A"}],"correctOptionId":"z"}]}]}]}"#;
        assert!(matches!(
            OfflineDataset::from_json(json),
            Err(DatasetError::MalformedQuestion { .. })
        ));
    }

    #[tokio::test]
    async fn perfect_submission_validates_and_accrues() {
        let backend = backend();
        let lesson = backend.dataset().lesson(&LessonId::new("budgeting-101")).unwrap().clone();

        let response = backend.submit_quiz(&all_correct(&lesson)).await.unwrap();
        assert!(response.validate().is_ok());
        assert_eq!(response.correct_count, 3);
        assert_eq!(response.growth_points_earned, 30);
        assert_eq!(response.coins_earned, 15);
        assert!(response.fertilizer_bonus);

        let summary = backend.fetch_summary().await.unwrap();
        assert_eq!(summary.coin_balance, 15);
        assert_eq!(summary.badges, vec![BadgeId::perfect(&lesson.id)]);
        let module = &summary.modules[0];
        assert_eq!((module.lessons_completed, module.lessons_total), (1, 2));
        assert!(!module.completed);
    }

    #[tokio::test]
    async fn unknown_lesson_and_question_are_rejected() {
        let backend = backend();
        let err = backend
            .submit_quiz(&SubmitRequest {
                lesson_id: LessonId::new("nope"),
                answers: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 404, .. }));

        let err = backend
            .submit_quiz(&SubmitRequest {
                lesson_id: LessonId::new("budgeting-101"),
                answers: vec![SubmittedAnswer {
                    question_id: QuestionId::new("other"),
                    answer_id: OptionId::new("a"),
                }],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 422, .. }));
    }

    #[tokio::test]
    async fn completion_is_reported_once() {
        let backend = backend().with_growth_points(240);
        let lesson = backend.dataset().lesson(&LessonId::new("compound-interest")).unwrap().clone();
        let mut request = all_correct(&lesson);
        request.answers.truncate(1);

        let first = backend.submit_quiz(&request).await.unwrap();
        assert_eq!(first.tree_state.growth_points, 250);
        assert!(first.tree_state.just_completed);
        assert!(first.validate().is_ok());

        let second = backend.submit_quiz(&request).await.unwrap();
        assert!(second.tree_state.completed);
        assert!(!second.tree_state.just_completed);
        assert_eq!(second.tree_state.current_stage, 4);
    }
}
