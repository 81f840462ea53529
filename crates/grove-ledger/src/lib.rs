//! Grove Ledger
//!
//! Deterministic growth ledger: stage, in-stage progress and completion
//! derived from a growth-points total.
//!
//! # Invariants
//!
//! - `current_stage = min(floor(points / points_per_stage), total_stages - 1)`
//! - `completed <=> points >= points_per_stage * total_stages`
//! - points never decrease under [`apply_growth_delta`]
//! - `completed` is terminal
//!
//! # Example
//!
//! ```rust
//! use grove_ledger::{apply_growth_delta, GrowthRules, TreeState};
//!
//! let rules = GrowthRules::new(50, 5).unwrap();
//! let tree = TreeState::from_points(rules, 240, None);
//!
//! let out = apply_growth_delta(&tree, 10, chrono::Utc::now());
//! assert!(out.ledger.is_completed());
//! assert!(out.events.just_completed);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod store;
pub mod tree;

// Re-exports
pub use error::LedgerError;
pub use store::{ledger_cell, LedgerReader, LedgerWriter};
pub use tree::{apply_growth_delta, GrowthEvents, GrowthOutcome, GrowthRules, TreeState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
