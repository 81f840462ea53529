//! Grove Reward
//!
//! Reward computation and the exactly-once grant discipline.
//!
//! # Core Concepts
//!
//! - [`compute_reward`]: points, coins and perfect-score bonus for a score
//! - [`MarkerTable`]: per-attempt check-and-set marker (`Pending` / `Committed`)
//! - [`ClaimTicket`]: ownership of a pending marker; released on drop
//! - [`RewardCoordinator`]: ties rates, markers and ledger projection together
//! - [`RewardJournal`]: hash-chained record of committed grants

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod coordinator;
pub mod error;
pub mod grant;
pub mod journal;
pub mod marker;

// Re-exports
pub use coordinator::{GrantDecision, RewardCoordinator};
pub use error::RewardError;
pub use grant::{compute_reward, RewardComputation, RewardGrant, RewardRates};
pub use journal::{JournalEntry, RewardJournal};
pub use marker::{Claim, ClaimTicket, Marker, MarkerTable};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
