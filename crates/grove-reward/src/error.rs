//! Error types for the reward layer

/// Reward layer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewardError {
    /// Journal hash chain is broken at `sequence`
    #[error("reward journal integrity violation at entry {sequence}")]
    JournalIntegrity {
        /// First bad entry
        sequence: u64,
    },

    /// Grant for this attempt is already in the journal
    #[error("grant for attempt {0} already journaled")]
    AlreadyJournaled(String),
}
