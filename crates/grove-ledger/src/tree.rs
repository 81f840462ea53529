//! Tree state and growth arithmetic
//!
//! Everything here is total and deterministic: the same inputs always give
//! the same ledger, so a speculative local copy and a server-confirmed copy
//! computed with the same rules never drift apart.

use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage geometry of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRules")]
pub struct GrowthRules {
    points_per_stage: u32,
    total_stages: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRules {
    points_per_stage: u32,
    total_stages: u32,
}

impl TryFrom<RawRules> for GrowthRules {
    type Error = LedgerError;

    fn try_from(raw: RawRules) -> Result<Self, Self::Error> {
        Self::new(raw.points_per_stage, raw.total_stages)
    }
}

impl GrowthRules {
    /// Create rules; both values must be positive
    ///
    /// # Errors
    /// `InvalidRules` if either value is zero
    pub fn new(points_per_stage: u32, total_stages: u32) -> Result<Self, LedgerError> {
        if points_per_stage == 0 || total_stages == 0 {
            return Err(LedgerError::InvalidRules {
                points_per_stage,
                total_stages,
            });
        }
        Ok(Self {
            points_per_stage,
            total_stages,
        })
    }

    /// Points needed per stage
    #[inline]
    #[must_use]
    pub fn points_per_stage(&self) -> u32 {
        self.points_per_stage
    }

    /// Number of stages
    #[inline]
    #[must_use]
    pub fn total_stages(&self) -> u32 {
        self.total_stages
    }

    /// Points at which the tree is complete
    #[inline]
    #[must_use]
    pub fn completion_threshold(&self) -> u64 {
        u64::from(self.points_per_stage) * u64::from(self.total_stages)
    }

    /// `min(floor(points / points_per_stage), total_stages - 1)`
    #[inline]
    #[must_use]
    pub fn stage_for(&self, growth_points: u64) -> u32 {
        let raw = growth_points / u64::from(self.points_per_stage);
        let last = u64::from(self.total_stages - 1);
        // bounded by `last`, which came from a u32
        u32::try_from(raw.min(last)).unwrap_or(self.total_stages - 1)
    }

    /// `points >= points_per_stage * total_stages`
    #[inline]
    #[must_use]
    pub fn is_complete_at(&self, growth_points: u64) -> bool {
        growth_points >= self.completion_threshold()
    }
}

impl Default for GrowthRules {
    fn default() -> Self {
        Self {
            points_per_stage: 50,
            total_stages: 5,
        }
    }
}

/// The learner's growth ledger
///
/// Fields are private: every constructor derives `current_stage` and
/// `completed` from the points total, so a `TreeState` always satisfies
/// the stage and completion invariants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "TreeStateRecord", try_from = "TreeStateRecord")]
pub struct TreeState {
    growth_points: u64,
    rules: GrowthRules,
    current_stage: u32,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
}

/// Serialized shape of [`TreeState`]; validated on the way in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeStateRecord {
    growth_points: u64,
    points_per_stage: u32,
    total_stages: u32,
    current_stage: u32,
    completed: bool,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl From<TreeState> for TreeStateRecord {
    fn from(tree: TreeState) -> Self {
        Self {
            growth_points: tree.growth_points,
            points_per_stage: tree.rules.points_per_stage,
            total_stages: tree.rules.total_stages,
            current_stage: tree.current_stage,
            completed: tree.completed,
            completed_at: tree.completed_at,
        }
    }
}

impl TryFrom<TreeStateRecord> for TreeState {
    type Error = LedgerError;

    fn try_from(r: TreeStateRecord) -> Result<Self, Self::Error> {
        let rules = GrowthRules::new(r.points_per_stage, r.total_stages)?;
        Self::from_parts(rules, r.growth_points, r.current_stage, r.completed, r.completed_at)
    }
}

impl TreeState {
    /// Seedling: zero points
    #[inline]
    #[must_use]
    pub fn new(rules: GrowthRules) -> Self {
        Self::from_points(rules, 0, None)
    }

    /// Derive a ledger from a points total
    ///
    /// `completed_at` is kept only when the points imply completion.
    #[must_use]
    pub fn from_points(
        rules: GrowthRules,
        growth_points: u64,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let completed = rules.is_complete_at(growth_points);
        Self {
            growth_points,
            rules,
            current_stage: rules.stage_for(growth_points),
            completed,
            completed_at: completed_at.filter(|_| completed),
        }
    }

    /// Build from externally supplied fields, checking every invariant
    ///
    /// # Errors
    /// `StageMismatch` or `CompletionMismatch` if the fields disagree with the points
    pub fn from_parts(
        rules: GrowthRules,
        growth_points: u64,
        current_stage: u32,
        completed: bool,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, LedgerError> {
        let expected = Self::from_points(rules, growth_points, completed_at);
        if expected.current_stage != current_stage {
            return Err(LedgerError::StageMismatch {
                growth_points,
                expected: expected.current_stage,
                actual: current_stage,
            });
        }
        if expected.completed != completed {
            return Err(LedgerError::CompletionMismatch {
                growth_points,
                expected: expected.completed,
            });
        }
        Ok(expected)
    }

    /// Accumulated growth points
    #[inline]
    #[must_use]
    pub fn growth_points(&self) -> u64 {
        self.growth_points
    }

    /// Stage geometry
    #[inline]
    #[must_use]
    pub fn rules(&self) -> GrowthRules {
        self.rules
    }

    /// Stage index in `[0, total_stages - 1]`
    #[inline]
    #[must_use]
    pub fn current_stage(&self) -> u32 {
        self.current_stage
    }

    /// Terminal completion flag
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// When the tree completed
    #[inline]
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Percent through the current stage; 100 once completed
    #[must_use]
    pub fn progress_within_stage(&self) -> f64 {
        if self.completed {
            return 100.0;
        }
        let per_stage = u64::from(self.rules.points_per_stage);
        // both operands are below `per_stage`, a u32, so the casts are exact
        #[allow(clippy::cast_precision_loss)]
        let pct = (self.growth_points % per_stage) as f64 / per_stage as f64 * 100.0;
        pct
    }

    /// Points until the next stage boundary (or completion); 0 once completed
    #[must_use]
    pub fn points_to_next_stage(&self) -> u64 {
        if self.completed {
            return 0;
        }
        let next_boundary =
            (u64::from(self.current_stage) + 1) * u64::from(self.rules.points_per_stage);
        next_boundary.saturating_sub(self.growth_points)
    }
}

/// What a delta did to the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthEvents {
    /// Stage before the delta
    pub previous_stage: u32,
    /// `current_stage' > current_stage`
    pub stage_increased: bool,
    /// `completed' && !completed`
    pub just_completed: bool,
}

/// Result of [`apply_growth_delta`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthOutcome {
    /// New ledger
    pub ledger: TreeState,
    /// Transition events
    pub events: GrowthEvents,
}

/// Add `delta` points (saturating) and re-derive stage and completion
///
/// Growth past the completion threshold is accepted: points keep
/// accumulating, the stage stays at the last index and `completed` stays
/// true with its original `completed_at`.
#[must_use]
pub fn apply_growth_delta(ledger: &TreeState, delta: u64, now: DateTime<Utc>) -> GrowthOutcome {
    let growth_points = ledger.growth_points.saturating_add(delta);
    let completed_at = ledger.completed_at.or(Some(now));
    let next = TreeState::from_points(ledger.rules, growth_points, completed_at);

    let events = GrowthEvents {
        previous_stage: ledger.current_stage,
        stage_increased: next.current_stage > ledger.current_stage,
        just_completed: next.completed && !ledger.completed,
    };

    if events.stage_increased || events.just_completed {
        tracing::debug!(
            from = ledger.current_stage,
            to = next.current_stage,
            points = growth_points,
            completed = next.completed,
            "tree grew"
        );
    }

    GrowthOutcome {
        ledger: next,
        events,
    }
}
