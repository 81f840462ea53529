//! Engine error surface
//!
//! Answer-set validation problems are not errors at this level; they come
//! back as [`crate::FinishResult::Invalid`]. Duplicate submissions and
//! stale ledgers are resolved inside the sync layer.

use crate::config::ConfigError;
use grove_quiz::SessionError;
use grove_sync::{DatasetError, SyncError};

/// Errors leaving the progression engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Submission or refresh failed; local state is already rolled back
    #[error(transparent)]
    Network(#[from] SyncError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bundled offline content could not be loaded
    #[error("offline dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Session used out of order (e.g. finishing an idle session)
    #[error("session misuse: {0}")]
    Session(SessionError),
}

impl EngineError {
    /// Whether the same call may succeed if repeated
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_retryable())
    }

    /// Whether this is a network failure
    #[inline]
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
