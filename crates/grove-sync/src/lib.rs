//! Grove Sync
//!
//! Optimistic synchronisation of quiz results with the authoritative
//! progression service.
//!
//! # Core Concepts
//!
//! - [`ProgressBackend`]: the service seam (remote, [`OfflineBackend`], [`FallbackBackend`])
//! - [`SyncLayer`]: claim, speculate, submit, then commit or roll back
//! - [`LocalCache`] / [`Speculation`]: locally shown progress with an exact pre-image
//! - [`ViewCache`]: moka cache of coin balance, module progress, badges, lessons
//! - [`PresentationGateway`]: stage, completion and reward events
//! - [`TimerScope`]: presentation follow-ups that die with their view
//!
//! # Example
//!
//! ```rust,no_run
//! use grove_ledger::{GrowthRules, TreeState};
//! use grove_quiz::{FinishOutcome, QuizSession};
//! use grove_reward::{RewardCoordinator, RewardRates};
//! use grove_sync::{OfflineBackend, OfflineDataset, SyncLayer};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = Arc::new(OfflineDataset::bundled()?);
//! let lesson = dataset.lessons().next().unwrap().clone();
//! let backend = Arc::new(OfflineBackend::new(
//!     Arc::clone(&dataset),
//!     GrowthRules::default(),
//!     RewardRates::default(),
//! ));
//! let sync = SyncLayer::new(
//!     backend,
//!     RewardCoordinator::new(RewardRates::default()),
//!     TreeState::new(GrowthRules::default()),
//! );
//!
//! let mut session = QuizSession::started(lesson.id.clone(), None, lesson.questions.clone());
//! for (i, q) in lesson.questions.iter().enumerate() {
//!     session.select_answer(i, q.correct_option_id.clone())?;
//! }
//! if let FinishOutcome::Finished(done) = session.finish()? {
//!     let outcome = sync.submit(&done).await?;
//!     println!("{:?}", outcome.grant());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backend;
pub mod cache;
pub mod error;
pub mod gateway;
pub mod offline;
pub mod sync;
pub mod timers;
pub mod views;
pub mod wire;

// Re-exports
pub use backend::{FallbackBackend, ProgressBackend, UnreachableBackend};
pub use cache::{LocalCache, ProgressView, Speculation};
pub use error::{StaleLedger, SyncError, TransportError};
pub use gateway::{notify, NoopGateway, PresentationGateway};
pub use offline::{DatasetError, LessonContent, ModuleContent, OfflineBackend, OfflineDataset};
pub use sync::{SubmitOutcome, SyncLayer, DEFAULT_SUBMIT_TIMEOUT};
pub use timers::TimerScope;
pub use views::{ViewCache, ViewKey, ViewValue};
pub use wire::{
    BadgeId, ModuleSummary, ProgressSummary, SubmitRequest, SubmitResponse, WireTreeState,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
