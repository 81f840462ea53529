//! Process-wide ledger record
//!
//! One writer, many readers. The writer replaces the whole [`TreeState`]
//! in one step; readers only ever see a complete snapshot.

use crate::tree::TreeState;
use parking_lot::RwLock;
use std::sync::Arc;

type Slot = Arc<RwLock<Arc<TreeState>>>;

/// Create the ledger record and split it into its writer and a reader
#[must_use]
pub fn ledger_cell(initial: TreeState) -> (LedgerWriter, LedgerReader) {
    let slot: Slot = Arc::new(RwLock::new(Arc::new(initial)));
    (
        LedgerWriter {
            slot: Arc::clone(&slot),
        },
        LedgerReader { slot },
    )
}

/// Snapshot reader; cheap to clone and hand to views
#[derive(Debug, Clone)]
pub struct LedgerReader {
    slot: Slot,
}

impl LedgerReader {
    /// Current ledger
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<TreeState> {
        Arc::clone(&self.slot.read())
    }
}

/// The only handle that may change the ledger; not `Clone`
#[derive(Debug)]
pub struct LedgerWriter {
    slot: Slot,
}

impl LedgerWriter {
    /// Current ledger
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<TreeState> {
        Arc::clone(&self.slot.read())
    }

    /// Atomically replace the ledger, returning the previous one
    pub fn replace(&mut self, next: TreeState) -> Arc<TreeState> {
        let next = Arc::new(next);
        let mut guard = self.slot.write();
        std::mem::replace(&mut *guard, next)
    }

    /// A new reader onto this record
    #[inline]
    #[must_use]
    pub fn reader(&self) -> LedgerReader {
        LedgerReader {
            slot: Arc::clone(&self.slot),
        }
    }
}
