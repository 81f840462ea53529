//! Reward journal
//!
//! Append-only, hash-chained record of committed grants. Each entry hashes
//! its content together with the previous entry's hash, so the coin total
//! derived from the journal can be checked for tampering or gaps.

use crate::error::RewardError;
use crate::grant::RewardGrant;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One journaled grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, from 0
    pub sequence: u64,
    /// The grant
    pub grant: RewardGrant,
    /// Hash of the previous entry (zeros for the first)
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    pub hash: [u8; 32],
}

impl JournalEntry {
    /// Hex form of this entry's hash
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Append-only grant journal
#[derive(Debug, Default)]
pub struct RewardJournal {
    inner: Mutex<Vec<JournalEntry>>,
}

impl RewardJournal {
    /// Create empty journal
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a grant
    ///
    /// # Errors
    /// `AlreadyJournaled` if this attempt already has an entry
    pub fn append(&self, grant: RewardGrant) -> Result<JournalEntry, RewardError> {
        let mut guard = self.inner.lock();
        if guard.iter().any(|e| e.grant.attempt_id == grant.attempt_id) {
            return Err(RewardError::AlreadyJournaled(grant.attempt_id.to_string()));
        }

        let prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        let mut entry = JournalEntry {
            sequence: guard.len() as u64,
            grant,
            prev_hash,
            hash: [0u8; 32],
        };
        entry.hash = compute_hash(&entry);
        guard.push(entry.clone());
        tracing::trace!(sequence = entry.sequence, hash = %entry.hash_hex(), "grant journaled");
        Ok(entry)
    }

    /// All entries
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.inner.lock().clone()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the journal is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Sum of coins over all journaled grants
    #[must_use]
    pub fn total_coins(&self) -> u64 {
        self.inner
            .lock()
            .iter()
            .map(|e| e.grant.coins_earned)
            .fold(0, u64::saturating_add)
    }

    /// Walk the chain and recompute every hash
    ///
    /// # Errors
    /// `JournalIntegrity` at the first entry whose links or hash do not match
    pub fn verify_integrity(&self) -> Result<(), RewardError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for (i, e) in guard.iter().enumerate() {
            if e.sequence != i as u64 || e.prev_hash != prev || e.hash != compute_hash(e) {
                return Err(RewardError::JournalIntegrity {
                    sequence: i as u64,
                });
            }
            prev = e.hash;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, coins: u64) {
        self.inner.lock()[index].grant.coins_earned = coins;
    }
}

fn compute_hash(entry: &JournalEntry) -> [u8; 32] {
    let g = &entry.grant;
    let mut hasher = Sha256::new();
    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(g.attempt_id.0.to_bytes());
    hasher.update(g.lesson_id.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(g.growth_points_earned.to_le_bytes());
    hasher.update(g.coins_earned.to_le_bytes());
    hasher.update([u8::from(g.fertilizer_bonus), u8::from(g.badge_earned)]);
    hasher.update(g.granted_at.timestamp_micros().to_le_bytes());
    hasher.update(entry.prev_hash);
    hasher.finalize().into()
}
