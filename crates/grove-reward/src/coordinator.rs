//! Reward grant coordinator
//!
//! Computes rewards and enforces at-most-one grant per attempt. The
//! coordinator never writes the authoritative ledger itself; it hands back
//! the ledger a grant implies and the sync layer applies it.

use crate::grant::{compute_reward, RewardComputation, RewardGrant, RewardRates};
use crate::marker::{Claim, MarkerTable};
use chrono::{DateTime, Utc};
use grove_ledger::{apply_growth_delta, GrowthOutcome, TreeState};
use grove_quiz::{AttemptId, CompletedAttempt, ScoreSummary};

/// Outcome of a local grant decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantDecision {
    /// New grant; `growth.ledger` is the ledger to install
    Granted {
        /// The committed grant
        grant: RewardGrant,
        /// Ledger after applying the grant
        growth: GrowthOutcome,
    },
    /// Already granted earlier; nothing may change
    Duplicate(RewardGrant),
    /// A submission for this attempt is still running
    InFlight,
}

/// Reward coordinator
#[derive(Debug, Clone, Default)]
pub struct RewardCoordinator {
    rates: RewardRates,
    markers: MarkerTable,
}

impl RewardCoordinator {
    /// Create coordinator with the given rates
    #[inline]
    #[must_use]
    pub fn new(rates: RewardRates) -> Self {
        Self {
            rates,
            markers: MarkerTable::new(),
        }
    }

    /// Configured rates
    #[inline]
    #[must_use]
    pub fn rates(&self) -> RewardRates {
        self.rates
    }

    /// Marker table (shared)
    #[inline]
    #[must_use]
    pub fn markers(&self) -> &MarkerTable {
        &self.markers
    }

    /// Check-and-set the attempt's marker
    #[inline]
    #[must_use]
    pub fn claim(&self, attempt_id: AttemptId) -> Claim {
        self.markers.claim(attempt_id)
    }

    /// Reward amounts for a score at the configured rates
    #[inline]
    #[must_use]
    pub fn compute(&self, score: ScoreSummary) -> RewardComputation {
        compute_reward(score, self.rates)
    }

    /// Ledger a score would produce, without claiming anything
    ///
    /// Used for the speculative projection. When the ledger is already
    /// complete the points are still reported and the stage saturates.
    #[must_use]
    pub fn project(
        &self,
        ledger: &TreeState,
        score: ScoreSummary,
        now: DateTime<Utc>,
    ) -> (RewardComputation, GrowthOutcome) {
        let reward = self.compute(score);
        let growth = apply_growth_delta(ledger, reward.growth_points_earned, now);
        (reward, growth)
    }

    /// Decide and commit a grant entirely locally
    #[must_use]
    pub fn grant(
        &self,
        attempt: &CompletedAttempt,
        ledger: &TreeState,
        now: DateTime<Utc>,
    ) -> GrantDecision {
        let ticket = match self.claim(attempt.attempt_id) {
            Claim::Acquired(ticket) => ticket,
            Claim::Committed(grant) => {
                tracing::debug!(attempt = %attempt.attempt_id, "duplicate grant suppressed");
                return GrantDecision::Duplicate(grant);
            }
            Claim::InFlight => return GrantDecision::InFlight,
        };

        let (reward, growth) = self.project(ledger, attempt.score, now);
        let grant = ticket.commit(RewardGrant::new(
            attempt.attempt_id,
            attempt.lesson_id.clone(),
            reward,
            now,
        ));
        tracing::info!(
            attempt = %grant.attempt_id,
            points = grant.growth_points_earned,
            coins = grant.coins_earned,
            bonus = grant.fertilizer_bonus,
            "reward granted"
        );
        GrantDecision::Granted { grant, growth }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_ledger::GrowthRules;
    use grove_quiz::{LessonId, ScoreSummary};

    fn attempt(correct: u32, total: u32) -> CompletedAttempt {
        CompletedAttempt {
            attempt_id: AttemptId::new(),
            lesson_id: LessonId::new("lesson-1"),
            module_id: None,
            answers: Vec::new(),
            score: ScoreSummary::new(correct, total),
        }
    }

    #[test]
    fn duplicate_grant_leaves_ledger_alone() {
        let coordinator = RewardCoordinator::new(RewardRates::new(10, 5));
        let mut ledger = TreeState::new(GrowthRules::new(50, 5).unwrap());
        let a = attempt(3, 3);
        let now = Utc::now();

        let first = coordinator.grant(&a, &ledger, now);
        let GrantDecision::Granted { grant, growth } = first else {
            panic!("first grant must succeed");
        };
        ledger = growth.ledger;
        assert_eq!(ledger.growth_points(), 30);

        match coordinator.grant(&a, &ledger, now) {
            GrantDecision::Duplicate(again) => assert_eq!(again, grant),
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(ledger.growth_points(), 30);
    }

    #[test]
    fn completed_ledger_still_reports_points() {
        let coordinator = RewardCoordinator::default();
        let rules = GrowthRules::new(50, 5).unwrap();
        let ledger = TreeState::from_points(rules, 260, Some(Utc::now()));

        let GrantDecision::Granted { grant, growth } = coordinator.grant(&attempt(2, 3), &ledger, Utc::now())
        else {
            panic!("grant expected");
        };
        assert_eq!(grant.growth_points_earned, 20);
        assert_eq!(growth.ledger.current_stage(), 4);
        assert!(growth.ledger.is_completed());
        assert!(!growth.events.just_completed);
        assert!(!growth.events.stage_increased);
    }
}
