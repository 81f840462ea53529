//! Sync layer
//!
//! Submits finished attempts to the authoritative backend with an
//! optimistic local update:
//!
//! 1. claim the attempt's marker (synchronously, before any await)
//! 2. mark the lesson completed locally, keeping the pre-image
//! 3. submit once, bounded by a timeout, and validate the response
//! 4. success: commit marker, install the service's tree, record the grant,
//!    credit coins, invalidate views, notify the presentation gateway
//! 5. failure: restore the pre-image, release the marker, return
//!    [`SyncError::Network`]
//!
//! This is the only writer of the process-wide ledger.

use crate::backend::ProgressBackend;
use crate::cache::{LocalCache, ProgressView};
use crate::error::{StaleLedger, SyncError, TransportError};
use crate::gateway::{notify, NoopGateway, PresentationGateway};
use crate::views::{ViewCache, ViewKey, ViewValue};
use crate::wire::{BadgeId, ProgressSummary, SubmitRequest, SubmitResponse};
use chrono::{DateTime, Utc};
use grove_ledger::{ledger_cell, GrowthEvents, LedgerReader, LedgerWriter, TreeState};
use grove_quiz::{CompletedAttempt, ScoreSummary};
use grove_reward::{Claim, RewardComputation, RewardCoordinator, RewardGrant, RewardJournal};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default bound on one submission round trip
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful [`SyncLayer::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// New grant committed
    Granted {
        /// The grant as confirmed by the service
        grant: RewardGrant,
        /// Ledger installed from the service's answer
        tree: TreeState,
        /// Stage/completion transitions for this grant
        events: GrowthEvents,
        /// Score as graded by the service
        score: ScoreSummary,
    },
    /// The attempt was already granted; nothing changed
    Duplicate(RewardGrant),
    /// Another submission of the attempt is still running; nothing changed
    InFlight,
}

impl SubmitOutcome {
    /// Grant carried by this outcome, if any
    #[must_use]
    pub fn grant(&self) -> Option<&RewardGrant> {
        match self {
            Self::Granted { grant, .. } | Self::Duplicate(grant) => Some(grant),
            Self::InFlight => None,
        }
    }

    /// Whether this call committed a new grant
    #[inline]
    #[must_use]
    pub fn is_new_grant(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Optimistic sync against a [`ProgressBackend`]
pub struct SyncLayer<B: ?Sized> {
    backend: Arc<B>,
    coordinator: RewardCoordinator,
    writer: Mutex<LedgerWriter>,
    reader: LedgerReader,
    cache: LocalCache,
    views: ViewCache,
    journal: Arc<RewardJournal>,
    gateway: Arc<dyn PresentationGateway>,
    submit_timeout: Duration,
}

impl<B: ?Sized> std::fmt::Debug for SyncLayer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLayer")
            .field("ledger", &self.reader.snapshot())
            .field("journal_len", &self.journal.len())
            .field("submit_timeout", &self.submit_timeout)
            .finish_non_exhaustive()
    }
}

impl<B: ProgressBackend + ?Sized> SyncLayer<B> {
    /// Sync layer owning a fresh ledger record
    #[must_use]
    pub fn new(backend: Arc<B>, coordinator: RewardCoordinator, initial: TreeState) -> Self {
        let (writer, reader) = ledger_cell(initial);
        Self {
            backend,
            coordinator,
            writer: Mutex::new(writer),
            reader,
            cache: LocalCache::new(),
            views: ViewCache::default(),
            journal: Arc::new(RewardJournal::new()),
            gateway: Arc::new(NoopGateway),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    /// Set presentation gateway
    #[inline]
    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn PresentationGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    /// Set view cache
    #[inline]
    #[must_use]
    pub fn with_views(mut self, views: ViewCache) -> Self {
        self.views = views;
        self
    }

    /// Set submission timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Seed the local view
    #[inline]
    #[must_use]
    pub fn with_local_view(mut self, view: ProgressView) -> Self {
        self.cache = LocalCache::with_view(view);
        self
    }

    /// Submit a finished attempt
    ///
    /// Duplicate and in-flight submissions of the same attempt return
    /// immediately without touching any state.
    ///
    /// # Errors
    /// [`SyncError::Network`] after local state has been rolled back and the
    /// marker released
    pub async fn submit(&self, attempt: &CompletedAttempt) -> Result<SubmitOutcome, SyncError> {
        let ticket = match self.coordinator.claim(attempt.attempt_id) {
            Claim::Acquired(ticket) => ticket,
            Claim::Committed(grant) => {
                tracing::debug!(
                    attempt = %attempt.attempt_id,
                    "duplicate submission, returning committed grant"
                );
                return Ok(SubmitOutcome::Duplicate(grant));
            }
            Claim::InFlight => {
                tracing::debug!(attempt = %attempt.attempt_id, "submission already in flight");
                return Ok(SubmitOutcome::InFlight);
            }
        };

        let speculation = self
            .cache
            .speculate_completion(&attempt.lesson_id, attempt.module_id.as_ref());
        let local = self.reader.snapshot();
        let now = Utc::now();
        let (_, projected) = self.coordinator.project(&local, attempt.score, now);

        let request = SubmitRequest::from_attempt(attempt);
        let confirmed = self
            .round_trip(&request)
            .await
            .and_then(|response| {
                let tree = confirmed_tree(&response, &local, now)?;
                Ok((response, tree))
            });

        let (response, tree) = match confirmed {
            Ok(confirmed) => confirmed,
            Err(source) => {
                speculation.rollback();
                ticket.release();
                tracing::warn!(
                    attempt = %attempt.attempt_id,
                    error = %source,
                    "submission failed, local state rolled back"
                );
                return Err(SyncError::Network {
                    attempt_id: attempt.attempt_id,
                    source,
                });
            }
        };

        if let Some(stale) = StaleLedger::detect(&projected.ledger, &tree) {
            tracing::warn!(
                attempt = %attempt.attempt_id,
                %stale,
                "replacing local ledger with service ledger"
            );
        }

        let amounts = RewardComputation {
            growth_points_earned: response.growth_points_earned,
            coins_earned: response.coins_earned,
            fertilizer_bonus: response.fertilizer_bonus,
            badge_earned: response.fertilizer_bonus,
        };
        let grant = ticket.commit(RewardGrant::new(
            attempt.attempt_id,
            attempt.lesson_id.clone(),
            amounts,
            now,
        ));

        self.writer.lock().replace(tree.clone());

        speculation.commit(|view| {
            view.coin_balance = view.coin_balance.saturating_add(grant.coins_earned);
            if grant.badge_earned {
                view.badges.insert(BadgeId::perfect(&grant.lesson_id));
            }
            view.grants.insert(grant.attempt_id, grant.clone());
        });

        if let Err(e) = self.journal.append(grant.clone()) {
            tracing::error!(
                attempt = %attempt.attempt_id,
                error = %e,
                "grant could not be journaled"
            );
        }

        self.views.invalidate_progression();

        let events = response.tree_state.events();
        notify(self.gateway.as_ref(), &tree, events, &grant);

        tracing::info!(
            attempt = %attempt.attempt_id,
            points = grant.growth_points_earned,
            coins = grant.coins_earned,
            stage = tree.current_stage(),
            completed = tree.is_completed(),
            "grant committed"
        );

        Ok(SubmitOutcome::Granted {
            grant,
            tree,
            events,
            score: ScoreSummary::new(response.correct_count, response.total_questions),
        })
    }

    async fn round_trip(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        match tokio::time::timeout(self.submit_timeout, self.backend.submit_quiz(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.submit_timeout)),
        }
    }

    /// Reload the progress summary and reconcile local state with it
    ///
    /// The service's ledger replaces the local one when they differ. If a
    /// submission speculated or settled while the summary was in transit,
    /// the summary is returned but not applied; the next refresh picks up
    /// the service's state.
    ///
    /// # Errors
    /// [`SyncError::Refresh`]; cached views stay invalidated
    pub async fn refresh(&self) -> Result<ProgressSummary, SyncError> {
        let observed = self.cache.generation();
        let summary =
            match tokio::time::timeout(self.submit_timeout, self.backend.fetch_summary()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.submit_timeout)),
            }
            .map_err(SyncError::Refresh)?;

        let local = self.reader.snapshot();
        let tree = summary
            .tree_state
            .to_tree(local.completed_at().or_else(|| Some(Utc::now())))
            .map_err(|e| SyncError::Refresh(TransportError::InvalidResponse(e.to_string())))?;

        let applied = {
            let mut writer = self.writer.lock();
            let applied = self.cache.reconcile(&summary, observed);
            if applied {
                if let Some(stale) = StaleLedger::detect(&writer.snapshot(), &tree) {
                    tracing::warn!(%stale, "refresh replaced local ledger");
                    writer.replace(tree);
                }
            }
            applied
        };

        self.views.invalidate_progression();
        if applied {
            self.views.populate(&summary).await;
            self.drop_views_if_changed(observed);
        }
        Ok(summary)
    }

    /// Derived view, refreshed from the backend on a miss
    ///
    /// # Errors
    /// [`SyncError::Refresh`] if the backend fails on a miss
    pub async fn view(&self, key: ViewKey) -> Result<ViewValue, SyncError> {
        let observed = self.cache.generation();
        let value = self
            .views
            .get_or_refresh(key, self.backend.as_ref())
            .await
            .map_err(SyncError::Refresh)?;
        self.drop_views_if_changed(observed);
        Ok(value)
    }

    // a grant may have invalidated the views while a summary was being cached
    fn drop_views_if_changed(&self, observed: u64) {
        if self.cache.generation() != observed {
            self.views.invalidate_progression();
        }
    }

    /// Current ledger
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> Arc<TreeState> {
        self.reader.snapshot()
    }

    /// Snapshot reader onto the ledger
    #[inline]
    #[must_use]
    pub fn ledger_reader(&self) -> LedgerReader {
        self.reader.clone()
    }

    /// Current local view
    #[inline]
    #[must_use]
    pub fn local_view(&self) -> Arc<ProgressView> {
        self.cache.snapshot()
    }

    /// Committed grant journal
    #[inline]
    #[must_use]
    pub fn journal(&self) -> &Arc<RewardJournal> {
        &self.journal
    }

    /// Reward coordinator
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &RewardCoordinator {
        &self.coordinator
    }

    /// Derived view cache
    #[inline]
    #[must_use]
    pub fn views(&self) -> &ViewCache {
        &self.views
    }

    /// Backend in use
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: ProgressBackend + ?Sized + 'static> SyncLayer<B> {
    /// Run [`SyncLayer::submit`] on a spawned task
    ///
    /// The submission keeps running even if the caller goes away.
    pub fn submit_in_background(
        self: &Arc<Self>,
        attempt: CompletedAttempt,
    ) -> JoinHandle<Result<SubmitOutcome, SyncError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.submit(&attempt).await })
    }
}

fn confirmed_tree(
    response: &SubmitResponse,
    local: &TreeState,
    now: DateTime<Utc>,
) -> Result<TreeState, TransportError> {
    response.validate()?;
    response
        .tree_state
        .to_tree(local.completed_at().or(Some(now)))
        .map_err(|e| TransportError::InvalidResponse(e.to_string()))
}
