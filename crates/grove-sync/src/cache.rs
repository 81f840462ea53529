//! Locally cached progress view
//!
//! The view is replaced as a whole, like the ledger. A [`Speculation`] marks
//! a lesson completed ahead of the service's answer and keeps the exact
//! pre-image; it is either committed with the confirmed grant or rolled back.
//! Dropping an unsettled speculation rolls it back.

use crate::wire::{BadgeId, ProgressSummary};
use grove_quiz::{AttemptId, LessonId, ModuleId};
use grove_reward::RewardGrant;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Everything the client shows about progression besides the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressView {
    /// Lessons shown as completed
    pub completed_lessons: BTreeSet<LessonId>,
    /// Lessons completed per module
    pub module_lessons: BTreeMap<ModuleId, BTreeSet<LessonId>>,
    /// Modules the service reports as completed
    pub completed_modules: BTreeSet<ModuleId>,
    /// Coin balance
    pub coin_balance: u64,
    /// Badges held
    pub badges: BTreeSet<BadgeId>,
    /// Confirmed grants by attempt
    pub grants: BTreeMap<AttemptId, RewardGrant>,
}

impl ProgressView {
    /// Whether a lesson is shown as completed
    #[inline]
    #[must_use]
    pub fn is_lesson_completed(&self, lesson: &LessonId) -> bool {
        self.completed_lessons.contains(lesson)
    }

    /// Lessons completed within a module
    #[must_use]
    pub fn lessons_in(&self, module: &ModuleId) -> usize {
        self.module_lessons.get(module).map_or(0, BTreeSet::len)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    view: Arc<ProgressView>,
    pending: usize,
    generation: u64,
}

impl CacheState {
    fn install(&mut self, next: ProgressView) {
        self.view = Arc::new(next);
    }
}

/// Shared local view
///
/// Every speculation that starts or settles bumps the generation. A summary
/// fetched under an older generation, or while a speculation is pending, is
/// not applied.
#[derive(Debug, Default)]
pub struct LocalCache {
    state: RwLock<CacheState>,
}

impl LocalCache {
    /// Empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache seeded with a view
    #[must_use]
    pub fn with_view(view: ProgressView) -> Self {
        Self {
            state: RwLock::new(CacheState {
                view: Arc::new(view),
                ..CacheState::default()
            }),
        }
    }

    /// Current view
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<ProgressView> {
        Arc::clone(&self.state.read().view)
    }

    /// Generation to hand back to [`LocalCache::reconcile`]
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Speculations not yet committed or rolled back
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.read().pending
    }

    /// Mark a lesson (and its module) completed, keeping the pre-image
    pub fn speculate_completion(
        &self,
        lesson: &LessonId,
        module: Option<&ModuleId>,
    ) -> Speculation<'_> {
        let mut state = self.state.write();
        let pre_image = Arc::clone(&state.view);

        let mut next = (*pre_image).clone();
        let lesson_added = next.completed_lessons.insert(lesson.clone());
        let module_added = module.is_some_and(|m| {
            next.module_lessons
                .entry(m.clone())
                .or_default()
                .insert(lesson.clone())
        });

        let installed = Arc::new(next);
        state.view = Arc::clone(&installed);
        state.pending += 1;
        state.generation += 1;
        drop(state);

        tracing::debug!(%lesson, lesson_added, module_added, "speculative completion applied");
        Speculation {
            cache: self,
            pre_image,
            installed,
            lesson: lesson.clone(),
            module: module.cloned(),
            lesson_added,
            module_added,
            settled: false,
        }
    }

    /// Replace server-derived fields from a summary fetched at `observed`
    ///
    /// Returns `false` and leaves the view alone if a speculation is pending
    /// or one started or settled since `observed`; the summary may predate
    /// a grant already counted locally. Confirmed grants are local history
    /// and are kept.
    #[must_use]
    pub fn reconcile(&self, summary: &ProgressSummary, observed: u64) -> bool {
        let mut state = self.state.write();
        if state.pending > 0 || state.generation != observed {
            tracing::debug!(
                pending = state.pending,
                observed,
                generation = state.generation,
                "summary predates local changes, not reconciled"
            );
            return false;
        }

        let mut next = (*state.view).clone();
        next.completed_lessons = summary.completed_lessons.iter().cloned().collect();
        next.completed_modules = summary
            .modules
            .iter()
            .filter(|m| m.completed)
            .map(|m| m.module_id.clone())
            .collect();
        next.coin_balance = summary.coin_balance;
        next.badges = summary.badges.iter().cloned().collect();

        state.install(next);
        true
    }
}

/// A speculative completion awaiting the service
#[derive(Debug)]
#[must_use = "dropping a Speculation rolls it back"]
pub struct Speculation<'a> {
    cache: &'a LocalCache,
    pre_image: Arc<ProgressView>,
    installed: Arc<ProgressView>,
    lesson: LessonId,
    module: Option<ModuleId>,
    lesson_added: bool,
    module_added: bool,
    settled: bool,
}

impl Speculation<'_> {
    /// View before the speculation
    #[inline]
    #[must_use]
    pub fn pre_image(&self) -> &ProgressView {
        &self.pre_image
    }

    /// Keep the completion flags and apply the confirmed changes
    pub fn commit(mut self, f: impl FnOnce(&mut ProgressView)) {
        self.settled = true;

        let mut state = self.cache.state.write();
        let mut next = (*state.view).clone();
        next.completed_lessons.insert(self.lesson.clone());
        if let Some(module) = &self.module {
            next.module_lessons
                .entry(module.clone())
                .or_default()
                .insert(self.lesson.clone());
        }
        f(&mut next);
        state.install(next);
        state.pending -= 1;
        state.generation += 1;
    }

    /// Undo the speculation
    pub fn rollback(mut self) {
        self.undo();
    }

    fn undo(&mut self) {
        if self.settled {
            return;
        }
        self.settled = true;

        let mut state = self.cache.state.write();
        state.pending -= 1;
        state.generation += 1;
        if Arc::ptr_eq(&state.view, &self.installed) {
            state.view = Arc::clone(&self.pre_image);
            tracing::debug!(lesson = %self.lesson, "speculation rolled back to pre-image");
            return;
        }

        // someone else changed the view since; only take back our own flags
        let mut next = (*state.view).clone();
        if self.lesson_added {
            next.completed_lessons.remove(&self.lesson);
        }
        if self.module_added {
            if let Some(module) = &self.module {
                if let Some(lessons) = next.module_lessons.get_mut(module) {
                    lessons.remove(&self.lesson);
                    if lessons.is_empty() {
                        next.module_lessons.remove(module);
                    }
                }
            }
        }
        state.install(next);
        tracing::debug!(lesson = %self.lesson, "speculation rolled back selectively");
    }
}

impl Drop for Speculation<'_> {
    fn drop(&mut self) {
        self.undo();
    }
}
