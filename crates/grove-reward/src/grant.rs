//! Reward rates and grants

use chrono::{DateTime, Utc};
use grove_quiz::{AttemptId, LessonId, ScoreSummary};
use serde::{Deserialize, Serialize};

/// Per-correct-answer reward rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRates {
    /// Growth points per correct answer
    pub points_per_correct: u32,
    /// Coins per correct answer
    pub coins_per_correct: u32,
}

impl RewardRates {
    /// Create rates
    #[inline]
    #[must_use]
    pub fn new(points_per_correct: u32, coins_per_correct: u32) -> Self {
        Self {
            points_per_correct,
            coins_per_correct,
        }
    }
}

impl Default for RewardRates {
    fn default() -> Self {
        Self {
            points_per_correct: 10,
            coins_per_correct: 5,
        }
    }
}

/// Reward amounts for a score, before any ledger is involved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardComputation {
    /// `correct * points_per_correct`
    pub growth_points_earned: u64,
    /// `correct * coins_per_correct`
    pub coins_earned: u64,
    /// Perfect score
    pub fertilizer_bonus: bool,
    /// Perfect score also unlocks the completion badge
    pub badge_earned: bool,
}

/// Compute the reward for an evaluated attempt
#[must_use]
pub fn compute_reward(score: ScoreSummary, rates: RewardRates) -> RewardComputation {
    let correct = u64::from(score.correct_count.min(score.total_questions));
    let fertilizer_bonus = score.is_perfect();
    RewardComputation {
        growth_points_earned: correct * u64::from(rates.points_per_correct),
        coins_earned: correct * u64::from(rates.coins_per_correct),
        fertilizer_bonus,
        badge_earned: fertilizer_bonus,
    }
}

/// The record of what one attempt was awarded
///
/// At most one exists per `attempt_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardGrant {
    /// Attempt this grant belongs to
    pub attempt_id: AttemptId,
    /// Lesson the attempt was for
    pub lesson_id: LessonId,
    /// Growth points awarded
    pub growth_points_earned: u64,
    /// Coins awarded
    pub coins_earned: u64,
    /// Perfect-score bonus
    pub fertilizer_bonus: bool,
    /// Completion badge unlocked
    pub badge_earned: bool,
    /// When the grant was committed
    pub granted_at: DateTime<Utc>,
}

impl RewardGrant {
    /// Build a grant from computed amounts
    #[must_use]
    pub fn new(
        attempt_id: AttemptId,
        lesson_id: LessonId,
        reward: RewardComputation,
        granted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id,
            lesson_id,
            growth_points_earned: reward.growth_points_earned,
            coins_earned: reward.coins_earned,
            fertilizer_bonus: reward.fertilizer_bonus,
            badge_earned: reward.badge_earned,
            granted_at,
        }
    }

    /// The amounts, without identity or timestamp
    #[inline]
    #[must_use]
    pub fn amounts(&self) -> RewardComputation {
        RewardComputation {
            growth_points_earned: self.growth_points_earned,
            coins_earned: self.coins_earned,
            fertilizer_bonus: self.fertilizer_bonus,
            badge_earned: self.badge_earned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_score_earns_bonus_and_badge() {
        let reward = compute_reward(ScoreSummary::new(3, 3), RewardRates::default());
        assert_eq!(reward.growth_points_earned, 30);
        assert_eq!(reward.coins_earned, 15);
        assert!(reward.fertilizer_bonus);
        assert!(reward.badge_earned);
    }

    #[test]
    fn partial_score_has_no_bonus() {
        let reward = compute_reward(ScoreSummary::new(2, 3), RewardRates::default());
        assert_eq!(reward.growth_points_earned, 20);
        assert_eq!(reward.coins_earned, 10);
        assert!(!reward.fertilizer_bonus);
        assert!(!reward.badge_earned);
    }

    #[test]
    fn empty_quiz_earns_nothing() {
        let reward = compute_reward(ScoreSummary::new(0, 0), RewardRates::default());
        assert_eq!(reward, RewardComputation::default());
    }
}
