//! Error types for the sync layer
//!
//! Only [`SyncError`] leaves the sync layer, and only after the local view
//! has been rolled back. Duplicate submissions and stale ledgers are
//! resolved internally.

use grove_ledger::TreeState;
use grove_quiz::AttemptId;
use std::time::Duration;

/// Transport-level failures talking to the progression service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Service could not be reached
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// No answer within the deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Service answered with an error status
    #[error("service returned status {status}: {message}")]
    Status {
        /// HTTP-like status code
        status: u16,
        /// Error body
        message: String,
    },

    /// Response failed validation
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Failures where a fallback source is worth trying
    #[inline]
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}

/// Errors surfaced by the sync layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// Submission failed; local state was rolled back and the attempt may be retried
    #[error("submission of attempt {attempt_id} failed: {source}")]
    Network {
        /// Attempt that failed
        attempt_id: AttemptId,
        /// Underlying failure
        #[source]
        source: TransportError,
    },

    /// Refreshing derived views failed; cached views stay invalidated
    #[error("progress refresh failed: {0}")]
    Refresh(#[source] TransportError),
}

impl SyncError {
    /// All sync errors leave consistent local state and may be retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Underlying transport failure
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &TransportError {
        match self {
            Self::Network { source, .. } | Self::Refresh(source) => source,
        }
    }
}

/// Local speculative ledger disagreed with the service; the service wins
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stale local ledger: local {local_points} points / stage {local_stage}, service {server_points} points / stage {server_stage}")]
pub struct StaleLedger {
    /// Local points
    pub local_points: u64,
    /// Local stage
    pub local_stage: u32,
    /// Service points
    pub server_points: u64,
    /// Service stage
    pub server_stage: u32,
}

impl StaleLedger {
    /// Compare two ledgers; `None` when they agree
    #[must_use]
    pub fn detect(local: &TreeState, server: &TreeState) -> Option<Self> {
        let agrees = local.growth_points() == server.growth_points()
            && local.rules() == server.rules()
            && local.is_completed() == server.is_completed();
        (!agrees).then(|| Self {
            local_points: local.growth_points(),
            local_stage: local.current_stage(),
            server_points: server.growth_points(),
            server_stage: server.current_stage(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_ledger::GrowthRules;

    #[test]
    fn stale_detection() {
        let rules = GrowthRules::default();
        let a = TreeState::from_points(rules, 30, None);
        let b = TreeState::from_points(rules, 60, None);
        assert!(StaleLedger::detect(&a, &a).is_none());
        let stale = StaleLedger::detect(&a, &b).unwrap();
        assert_eq!(stale.server_stage, 1);
        assert!(stale.to_string().contains("stale local ledger"));
    }

    #[test]
    fn unreachable_classification() {
        assert!(TransportError::Unreachable("dns".into()).is_unreachable());
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_unreachable());
        assert!(!TransportError::InvalidResponse("x".into()).is_unreachable());
    }
}
