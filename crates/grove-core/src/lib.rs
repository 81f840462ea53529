//! Grove Core
//!
//! Progression and reward engine for quiz-driven learning: evaluate an
//! attempt, accrue growth points, advance the tree, and grant coins and
//! bonuses exactly once per attempt while staying consistent with the
//! progression service.
//!
//! # Core Concepts
//!
//! - [`EngineConfig`]: growth rules, reward rates, timeouts, backend mode
//! - [`ProgressionEngine`]: sessions in, confirmed grants and ledger out
//! - [`FinishResult`]: submitted, or rejected answer set
//! - [`EngineError`]: what may escape (network, config, misuse)
//!
//! # Example
//!
//! ```rust,no_run
//! use grove_core::{BackendMode, EngineConfig, FinishResult, ProgressionEngine};
//! use grove_sync::OfflineDataset;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::new().with_backend(BackendMode::Offline);
//! let engine = ProgressionEngine::builder(config).build_for_mode(None)?;
//!
//! let dataset = OfflineDataset::bundled()?;
//! let lesson = dataset.lessons().next().unwrap();
//! let mut session = engine.start_session(lesson.id.clone(), None, lesson.questions.clone());
//! session.select_answer(0, lesson.questions[0].correct_option_id.clone())?;
//!
//! if let FinishResult::Submitted(outcome) = engine.finish_and_submit(&mut session).await? {
//!     println!("granted: {:?}", outcome.grant());
//! }
//! println!("stage {}", engine.ledger().current_stage());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod engine;
pub mod error;

// Re-exports
pub use config::{BackendMode, ConfigError, EngineConfig};
pub use engine::{EngineBuilder, FinishResult, ProgressionEngine};
pub use error::EngineError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
