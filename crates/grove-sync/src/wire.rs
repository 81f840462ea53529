//! Remote contract
//!
//! JSON shapes exchanged with the progression service. The offline backend
//! produces exactly the same shapes.

use crate::error::TransportError;
use chrono::{DateTime, Utc};
use grove_ledger::{GrowthEvents, GrowthOutcome, GrowthRules, LedgerError, TreeState};
use grove_quiz::{CompletedAttempt, LessonId, ModuleId, SubmittedAnswer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Badge identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeId(String);

impl BadgeId {
    /// Wrap a raw identifier
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Badge awarded for a perfect score on a lesson
    #[must_use]
    pub fn perfect(lesson: &LessonId) -> Self {
        Self(format!("perfect:{lesson}"))
    }
}

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quiz submission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Lesson ID
    pub lesson_id: LessonId,
    /// Answers in question order
    pub answers: Vec<SubmittedAnswer>,
}

impl SubmitRequest {
    /// Request for a finished attempt
    #[must_use]
    pub fn from_attempt(attempt: &CompletedAttempt) -> Self {
        Self {
            lesson_id: attempt.lesson_id.clone(),
            answers: attempt.answers.clone(),
        }
    }
}

/// Tree state as the service reports it, including transition events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTreeState {
    /// Points total
    pub growth_points: u64,
    /// Stage index
    pub current_stage: u32,
    /// Number of stages
    pub total_stages: u32,
    /// Points per stage
    pub points_per_stage: u32,
    /// Points to the next boundary
    pub points_to_next_stage: u64,
    /// Completion flag
    pub completed: bool,
    /// Stage before this submission
    #[serde(default)]
    pub previous_stage: u32,
    /// Stage went up
    #[serde(default)]
    pub stage_increased: bool,
    /// Completed with this submission
    #[serde(default)]
    pub just_completed: bool,
}

impl WireTreeState {
    /// Describe a ledger with no transition
    #[must_use]
    pub fn from_tree(tree: &TreeState) -> Self {
        Self::with_events(
            tree,
            GrowthEvents {
                previous_stage: tree.current_stage(),
                ..GrowthEvents::default()
            },
        )
    }

    /// Describe a ledger after a delta
    #[must_use]
    pub fn from_outcome(outcome: &GrowthOutcome) -> Self {
        Self::with_events(&outcome.ledger, outcome.events)
    }

    fn with_events(tree: &TreeState, events: GrowthEvents) -> Self {
        let rules = tree.rules();
        Self {
            growth_points: tree.growth_points(),
            current_stage: tree.current_stage(),
            total_stages: rules.total_stages(),
            points_per_stage: rules.points_per_stage(),
            points_to_next_stage: tree.points_to_next_stage(),
            completed: tree.is_completed(),
            previous_stage: events.previous_stage,
            stage_increased: events.stage_increased,
            just_completed: events.just_completed,
        }
    }

    /// Transition events carried by this state
    #[inline]
    #[must_use]
    pub fn events(&self) -> GrowthEvents {
        GrowthEvents {
            previous_stage: self.previous_stage,
            stage_increased: self.stage_increased,
            just_completed: self.just_completed,
        }
    }

    /// Convert to a validated ledger
    ///
    /// # Errors
    /// Any ledger invariant violation
    pub fn to_tree(&self, completed_at: Option<DateTime<Utc>>) -> Result<TreeState, LedgerError> {
        let rules = GrowthRules::new(self.points_per_stage, self.total_stages)?;
        TreeState::from_parts(
            rules,
            self.growth_points,
            self.current_stage,
            self.completed,
            completed_at,
        )
    }

    fn check(&self) -> Result<TreeState, TransportError> {
        let tree = self
            .to_tree(None)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        if tree.points_to_next_stage() != self.points_to_next_stage {
            return Err(TransportError::InvalidResponse(format!(
                "pointsToNextStage {} disagrees with {} points",
                self.points_to_next_stage, self.growth_points
            )));
        }
        if self.stage_increased != (self.current_stage > self.previous_stage) {
            return Err(TransportError::InvalidResponse(format!(
                "stageIncreased={} but stage {} -> {}",
                self.stage_increased, self.previous_stage, self.current_stage
            )));
        }
        if self.just_completed && !self.completed {
            return Err(TransportError::InvalidResponse(
                "justCompleted on an incomplete tree".to_string(),
            ));
        }
        Ok(tree)
    }
}

/// Quiz submission response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Service accepted the submission
    pub success: bool,
    /// Correct answers, graded by the service
    pub correct_count: u32,
    /// Questions in the lesson
    pub total_questions: u32,
    /// Growth points awarded
    pub growth_points_earned: u64,
    /// Perfect-score bonus
    pub fertilizer_bonus: bool,
    /// Coins awarded
    pub coins_earned: u64,
    /// Resulting tree
    pub tree_state: WireTreeState,
}

impl SubmitResponse {
    /// Check the response before trusting it
    ///
    /// # Errors
    /// `InvalidResponse` describing the first problem found
    pub fn validate(&self) -> Result<TreeState, TransportError> {
        if !self.success {
            return Err(TransportError::InvalidResponse(
                "service reported success=false".to_string(),
            ));
        }
        if self.correct_count > self.total_questions {
            return Err(TransportError::InvalidResponse(format!(
                "correctCount {} exceeds totalQuestions {}",
                self.correct_count, self.total_questions
            )));
        }
        self.tree_state.check()
    }
}

/// Per-module progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    /// Module ID
    pub module_id: ModuleId,
    /// Lessons finished
    pub lessons_completed: u32,
    /// Lessons in the module
    pub lessons_total: u32,
    /// All lessons finished
    pub completed: bool,
}

impl ModuleSummary {
    /// Module nobody has started
    #[must_use]
    pub fn empty(module_id: ModuleId) -> Self {
        Self {
            module_id,
            lessons_completed: 0,
            lessons_total: 0,
            completed: false,
        }
    }
}

/// Everything the progression-derived views are built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    /// Coin balance
    pub coin_balance: u64,
    /// Current tree
    pub tree_state: WireTreeState,
    /// Finished lessons
    pub completed_lessons: Vec<LessonId>,
    /// Module progress
    pub modules: Vec<ModuleSummary>,
    /// Badges held
    pub badges: Vec<BadgeId>,
}
