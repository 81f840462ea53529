//! Progression service seam
//!
//! [`ProgressBackend`] is implemented by whatever talks to the authoritative
//! source (an HTTP client in the host application) and by
//! [`crate::OfflineBackend`] for demo and offline use.

use crate::error::TransportError;
use crate::wire::{ProgressSummary, SubmitRequest, SubmitResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Authoritative progression source
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    /// Submit a finished quiz
    async fn submit_quiz(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError>;

    /// Fetch everything the derived views need
    async fn fetch_summary(&self) -> Result<ProgressSummary, TransportError>;

    /// Backend name for logs
    fn name(&self) -> &'static str {
        "backend"
    }
}

#[async_trait]
impl<T: ProgressBackend + ?Sized> ProgressBackend for Arc<T> {
    async fn submit_quiz(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        (**self).submit_quiz(request).await
    }

    async fn fetch_summary(&self) -> Result<ProgressSummary, TransportError> {
        (**self).fetch_summary().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Use `secondary` whenever `primary` cannot be reached
///
/// Only unreachable/timeout failures fall through; an error status or an
/// invalid response from the primary is returned as is.
#[derive(Debug, Clone)]
pub struct FallbackBackend<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackBackend<P, S> {
    /// Combine two backends
    #[inline]
    #[must_use]
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<P: ProgressBackend, S: ProgressBackend> ProgressBackend for FallbackBackend<P, S> {
    async fn submit_quiz(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        match self.primary.submit_quiz(request).await {
            Err(e) if e.is_unreachable() => {
                tracing::warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "primary unreachable, submitting to fallback"
                );
                self.secondary.submit_quiz(request).await
            }
            other => other,
        }
    }

    async fn fetch_summary(&self) -> Result<ProgressSummary, TransportError> {
        match self.primary.fetch_summary().await {
            Err(e) if e.is_unreachable() => {
                tracing::warn!(error = %e, "primary unreachable, reading summary from fallback");
                self.secondary.fetch_summary().await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// Backend that is never reachable
///
/// Stands in for the remote service when none is configured, so a
/// [`FallbackBackend`] routes everything to its secondary.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableBackend;

#[async_trait]
impl ProgressBackend for UnreachableBackend {
    async fn submit_quiz(&self, _request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        Err(TransportError::Unreachable("no remote configured".to_string()))
    }

    async fn fetch_summary(&self) -> Result<ProgressSummary, TransportError> {
        Err(TransportError::Unreachable("no remote configured".to_string()))
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}
