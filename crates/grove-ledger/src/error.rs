//! Error types for the growth ledger

/// Ledger construction and invariant errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Points per stage or stage count is zero
    #[error("invalid growth rules: {points_per_stage} points per stage, {total_stages} stages")]
    InvalidRules {
        /// Points per stage
        points_per_stage: u32,
        /// Number of stages
        total_stages: u32,
    },

    /// Stage index does not match the points total
    #[error("stage mismatch: {growth_points} points imply stage {expected}, got {actual}")]
    StageMismatch {
        /// Points total
        growth_points: u64,
        /// Stage derived from points
        expected: u32,
        /// Stage supplied
        actual: u32,
    },

    /// Completion flag does not match the points total
    #[error("completion mismatch: {growth_points} points imply completed={expected}")]
    CompletionMismatch {
        /// Points total
        growth_points: u64,
        /// Completion derived from points
        expected: bool,
    },
}
