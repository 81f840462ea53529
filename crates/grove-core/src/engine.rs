//! Progression engine facade
//!
//! Wires sessions, reward coordination and the sync layer together from an
//! [`EngineConfig`]. Hosts drive a [`QuizSession`] and hand it to
//! [`ProgressionEngine::finish_and_submit`] when the learner is done; calling
//! that again for the same session (a re-delivered completion event) only
//! resubmits the already-finished attempt, which the marker turns into a
//! duplicate.

use crate::config::{BackendMode, ConfigError, EngineConfig};
use crate::error::EngineError;
use grove_ledger::{LedgerReader, TreeState};
use grove_quiz::{
    CompletedAttempt, FinishOutcome, LessonId, ModuleId, Question, QuizSession, SessionError,
    ValidationIssue,
};
use grove_reward::{RewardCoordinator, RewardJournal};
use grove_sync::{
    FallbackBackend, NoopGateway, OfflineBackend, OfflineDataset, PresentationGateway,
    ProgressBackend, ProgressSummary, ProgressView, SubmitOutcome, SyncLayer, UnreachableBackend,
    ViewKey, ViewValue,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Result of finishing a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishResult {
    /// Attempt was evaluated and submitted
    Submitted(SubmitOutcome),
    /// Answer set rejected; the session is still in progress
    Invalid(ValidationIssue),
}

/// Builder for [`ProgressionEngine`]
#[derive(Clone)]
pub struct EngineBuilder {
    config: EngineConfig,
    gateway: Arc<dyn PresentationGateway>,
    ledger: Option<TreeState>,
    view: ProgressView,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Start from a config
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            gateway: Arc::new(NoopGateway),
            ledger: None,
            view: ProgressView::default(),
        }
    }

    /// With presentation gateway
    #[inline]
    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn PresentationGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    /// With a previously persisted ledger
    #[inline]
    #[must_use]
    pub fn ledger(mut self, ledger: TreeState) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// With a previously persisted local view
    #[inline]
    #[must_use]
    pub fn local_view(mut self, view: ProgressView) -> Self {
        self.view = view;
        self
    }

    /// Build on an explicit backend
    ///
    /// # Errors
    /// `Config` if the configuration is invalid
    pub fn build<B: ProgressBackend + ?Sized>(
        self,
        backend: Arc<B>,
    ) -> Result<ProgressionEngine<B>, EngineError> {
        self.config.validate()?;
        let rules = self.config.growth_rules()?;
        let ledger = match self.ledger {
            Some(ledger) if ledger.rules() != rules => {
                return Err(ConfigError::Invalid(format!(
                    "persisted ledger rules {:?} differ from configured {:?}",
                    ledger.rules(),
                    rules
                ))
                .into());
            }
            Some(ledger) => ledger,
            None => TreeState::new(rules),
        };

        let sync = SyncLayer::new(
            backend,
            RewardCoordinator::new(self.config.reward_rates()),
            ledger,
        )
        .with_gateway(self.gateway)
        .with_views(self.config.view_cache())
        .with_timeout(self.config.submit_timeout())
        .with_local_view(self.view);

        tracing::info!(
            backend = sync.backend().name(),
            points_per_stage = rules.points_per_stage(),
            total_stages = rules.total_stages(),
            "progression engine ready"
        );

        Ok(ProgressionEngine {
            config: self.config,
            sync: Arc::new(sync),
        })
    }

    /// Build with the backend the config's mode selects
    ///
    /// `remote` is the host's client for the progression service. Offline
    /// and fallback modes serve the bundled dataset.
    ///
    /// # Errors
    /// `Config` if remote mode has no client, `Dataset` if the bundled
    /// content is broken
    pub fn build_for_mode(
        self,
        remote: Option<Arc<dyn ProgressBackend>>,
    ) -> Result<ProgressionEngine<dyn ProgressBackend>, EngineError> {
        let backend: Arc<dyn ProgressBackend> = match (self.config.backend, remote) {
            (BackendMode::Remote, Some(remote)) => remote,
            (BackendMode::Remote, None) => {
                return Err(ConfigError::Invalid(
                    "backend = \"remote\" needs a service client".to_string(),
                )
                .into());
            }
            (BackendMode::Offline, _) => Arc::new(self.offline_backend()?),
            (BackendMode::Fallback, Some(remote)) => {
                Arc::new(FallbackBackend::new(remote, self.offline_backend()?))
            }
            (BackendMode::Fallback, None) => {
                Arc::new(FallbackBackend::new(UnreachableBackend, self.offline_backend()?))
            }
        };
        self.build(backend)
    }

    fn offline_backend(&self) -> Result<OfflineBackend, EngineError> {
        Ok(OfflineBackend::new(
            Arc::new(OfflineDataset::bundled()?),
            self.config.growth_rules()?,
            self.config.reward_rates(),
        ))
    }
}

/// The progression and reward engine
pub struct ProgressionEngine<B: ?Sized = dyn ProgressBackend> {
    config: EngineConfig,
    sync: Arc<SyncLayer<B>>,
}

impl<B: ?Sized> std::fmt::Debug for ProgressionEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionEngine")
            .field("config", &self.config)
            .field("sync", &self.sync)
            .finish()
    }
}

impl ProgressionEngine {
    /// Builder from a config
    #[inline]
    #[must_use]
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }
}

impl<B: ProgressBackend + ?Sized + 'static> ProgressionEngine<B> {
    /// Begin a quiz attempt
    #[must_use]
    pub fn start_session(
        &self,
        lesson: impl Into<LessonId>,
        module: Option<ModuleId>,
        questions: Vec<Question>,
    ) -> QuizSession {
        let session = QuizSession::started(lesson, module, questions);
        tracing::debug!(attempt = %session.attempt_id(), "session started");
        session
    }

    /// Finish the session and submit its attempt
    ///
    /// Safe to call repeatedly for the same session: once the session is
    /// completed, later calls resubmit the same attempt and get
    /// [`SubmitOutcome::Duplicate`] or [`SubmitOutcome::InFlight`] back, or
    /// a fresh try if the previous submission failed.
    ///
    /// # Errors
    /// - `Network` if the submission failed (local state already rolled back)
    /// - `Session` if the session was never started
    pub async fn finish_and_submit(
        &self,
        session: &mut QuizSession,
    ) -> Result<FinishResult, EngineError> {
        let attempt = match session.finish() {
            Ok(FinishOutcome::Finished(attempt)) => attempt,
            Ok(FinishOutcome::AlreadyCompleted) => match session.completed() {
                Some(attempt) => attempt.clone(),
                None => {
                    return Err(EngineError::Session(SessionError::NotInProgress(
                        session.state(),
                    )))
                }
            },
            Err(SessionError::Validation(issue)) => {
                tracing::info!(attempt = %session.attempt_id(), %issue, "answer set rejected");
                return Ok(FinishResult::Invalid(issue));
            }
            Err(other) => return Err(EngineError::Session(other)),
        };

        let outcome = self.sync.submit(&attempt).await?;
        Ok(FinishResult::Submitted(outcome))
    }

    /// Resubmit an attempt whose earlier submission failed
    ///
    /// # Errors
    /// `Network` if it fails again
    pub async fn retry(&self, attempt: &CompletedAttempt) -> Result<SubmitOutcome, EngineError> {
        tracing::info!(attempt = %attempt.attempt_id, "retrying submission");
        Ok(self.sync.submit(attempt).await?)
    }

    /// Submit on a spawned task that outlives the caller
    pub fn submit_in_background(
        &self,
        attempt: CompletedAttempt,
    ) -> JoinHandle<Result<SubmitOutcome, grove_sync::SyncError>> {
        self.sync.submit_in_background(attempt)
    }

    /// Reload progress from the backend
    ///
    /// # Errors
    /// `Network` on backend failure
    pub async fn refresh(&self) -> Result<ProgressSummary, EngineError> {
        Ok(self.sync.refresh().await?)
    }

    /// A derived view (coin balance, module progress, badges, lessons)
    ///
    /// # Errors
    /// `Network` if the view had to be refreshed and that failed
    pub async fn view(&self, key: ViewKey) -> Result<ViewValue, EngineError> {
        Ok(self.sync.view(key).await?)
    }

    /// Current ledger
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> Arc<TreeState> {
        self.sync.ledger()
    }

    /// Snapshot reader for views that poll the ledger
    #[inline]
    #[must_use]
    pub fn ledger_reader(&self) -> LedgerReader {
        self.sync.ledger_reader()
    }

    /// Current local view
    #[inline]
    #[must_use]
    pub fn local_view(&self) -> Arc<ProgressView> {
        self.sync.local_view()
    }

    /// Committed grant journal
    #[inline]
    #[must_use]
    pub fn journal(&self) -> &Arc<RewardJournal> {
        self.sync.journal()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying sync layer
    #[inline]
    #[must_use]
    pub fn sync(&self) -> &Arc<SyncLayer<B>> {
        &self.sync
    }
}
