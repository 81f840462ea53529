//! Progression-derived views
//!
//! Coin balance, module progress, badges and the lesson list are all
//! derived from the service's progress summary. They are cached with moka
//! and invalidated together whenever a grant is committed.

use crate::backend::ProgressBackend;
use crate::error::TransportError;
use crate::wire::{BadgeId, ModuleSummary, ProgressSummary};
use grove_quiz::{LessonId, ModuleId};
use moka::future::Cache;
use std::time::Duration;

/// Cached view identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    /// Coin balance
    CoinBalance,
    /// Progress within one module
    ModuleProgress(ModuleId),
    /// Badges held
    Badges,
    /// Completed lessons
    Lessons,
}

/// Cached view content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewValue {
    /// Coin balance
    CoinBalance(u64),
    /// Module progress
    ModuleProgress(ModuleSummary),
    /// Badges held
    Badges(Vec<BadgeId>),
    /// Completed lessons
    Lessons(Vec<LessonId>),
}

impl ViewValue {
    /// Derive one view from a summary
    #[must_use]
    pub fn derive(key: &ViewKey, summary: &ProgressSummary) -> Self {
        match key {
            ViewKey::CoinBalance => Self::CoinBalance(summary.coin_balance),
            ViewKey::ModuleProgress(module) => Self::ModuleProgress(
                summary
                    .modules
                    .iter()
                    .find(|m| &m.module_id == module)
                    .cloned()
                    .unwrap_or_else(|| ModuleSummary::empty(module.clone())),
            ),
            ViewKey::Badges => Self::Badges(summary.badges.clone()),
            ViewKey::Lessons => Self::Lessons(summary.completed_lessons.clone()),
        }
    }
}

/// moka-backed view cache
#[derive(Debug, Clone)]
pub struct ViewCache {
    inner: Cache<ViewKey, ViewValue>,
}

impl ViewCache {
    /// Cache with a capacity bound
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Cache whose entries also expire after `ttl`
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached value, if present
    #[inline]
    pub async fn get(&self, key: &ViewKey) -> Option<ViewValue> {
        self.inner.get(key).await
    }

    /// Store every view derivable from a summary
    pub async fn populate(&self, summary: &ProgressSummary) {
        let mut keys = vec![ViewKey::CoinBalance, ViewKey::Badges, ViewKey::Lessons];
        keys.extend(
            summary
                .modules
                .iter()
                .map(|m| ViewKey::ModuleProgress(m.module_id.clone())),
        );
        for key in keys {
            let value = ViewValue::derive(&key, summary);
            self.inner.insert(key, value).await;
        }
    }

    /// Cached value, or fetch the summary and refill every view
    ///
    /// # Errors
    /// Backend failure while refreshing
    pub async fn get_or_refresh<B>(
        &self,
        key: ViewKey,
        backend: &B,
    ) -> Result<ViewValue, TransportError>
    where
        B: ProgressBackend + ?Sized,
    {
        if let Some(cached) = self.get(&key).await {
            return Ok(cached);
        }

        tracing::debug!(?key, backend = backend.name(), "view miss, refreshing");
        let summary = backend.fetch_summary().await?;
        self.populate(&summary).await;
        Ok(ViewValue::derive(&key, &summary))
    }

    /// Drop every progression-derived view
    #[inline]
    pub fn invalidate_progression(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate entry count (after pending maintenance)
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireTreeState;
    use grove_ledger::{GrowthRules, TreeState};

    fn summary(coins: u64) -> ProgressSummary {
        ProgressSummary {
            coin_balance: coins,
            tree_state: WireTreeState::from_tree(&TreeState::new(GrowthRules::default())),
            completed_lessons: vec![LessonId::new("l1")],
            modules: vec![ModuleSummary {
                module_id: ModuleId::new("m1"),
                lessons_completed: 1,
                lessons_total: 2,
                completed: false,
            }],
            badges: vec![],
        }
    }

    #[test]
    fn unknown_module_derives_empty_progress() {
        let value = ViewValue::derive(&ViewKey::ModuleProgress(ModuleId::new("zz")), &summary(0));
        assert_eq!(
            value,
            ViewValue::ModuleProgress(ModuleSummary::empty(ModuleId::new("zz")))
        );
    }

    #[tokio::test]
    async fn populate_then_invalidate() {
        let cache = ViewCache::default();
        cache.populate(&summary(25)).await;

        assert_eq!(
            cache.get(&ViewKey::CoinBalance).await,
            Some(ViewValue::CoinBalance(25))
        );
        assert_eq!(cache.entry_count().await, 4);

        cache.invalidate_progression();
        assert_eq!(cache.get(&ViewKey::CoinBalance).await, None);
        assert_eq!(cache.get(&ViewKey::Lessons).await, None);
    }
}
