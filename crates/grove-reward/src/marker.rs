//! Per-attempt idempotency markers
//!
//! A marker is claimed (`Pending`) synchronously before any asynchronous
//! work starts, then either committed with the grant or released. A
//! [`ClaimTicket`] that is dropped without being committed releases its
//! marker, so an abandoned or failed submission can always be retried.

use crate::grant::RewardGrant;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use grove_quiz::AttemptId;
use std::sync::Arc;

/// State of one attempt's marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Claimed; submission in flight
    Pending,
    /// Grant committed
    Committed(RewardGrant),
}

/// Result of a check-and-set
#[derive(Debug)]
pub enum Claim {
    /// Marker was unset and is now `Pending`; the caller owns the attempt
    Acquired(ClaimTicket),
    /// A grant was already committed for this attempt
    Committed(RewardGrant),
    /// Another submission for this attempt is in flight
    InFlight,
}

/// Concurrent marker table keyed by attempt
#[derive(Debug, Clone, Default)]
pub struct MarkerTable {
    markers: Arc<DashMap<AttemptId, Marker>>,
}

impl MarkerTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-set
    #[must_use]
    pub fn claim(&self, attempt_id: AttemptId) -> Claim {
        match self.markers.entry(attempt_id) {
            Entry::Occupied(entry) => match entry.get() {
                Marker::Pending => Claim::InFlight,
                Marker::Committed(grant) => Claim::Committed(grant.clone()),
            },
            Entry::Vacant(entry) => {
                entry.insert(Marker::Pending);
                tracing::debug!(%attempt_id, "marker claimed");
                Claim::Acquired(ClaimTicket {
                    attempt_id,
                    markers: Arc::clone(&self.markers),
                    settled: false,
                })
            }
        }
    }

    /// Committed grant for an attempt, if any
    #[must_use]
    pub fn committed(&self, attempt_id: &AttemptId) -> Option<RewardGrant> {
        self.markers.get(attempt_id).and_then(|m| match m.value() {
            Marker::Committed(grant) => Some(grant.clone()),
            Marker::Pending => None,
        })
    }

    /// Current marker for an attempt
    #[must_use]
    pub fn get(&self, attempt_id: &AttemptId) -> Option<Marker> {
        self.markers.get(attempt_id).map(|m| m.value().clone())
    }

    /// Number of committed grants
    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.markers
            .iter()
            .filter(|m| matches!(m.value(), Marker::Committed(_)))
            .count()
    }
}

/// Ownership of a `Pending` marker
///
/// Commit it with the grant, or let it go (explicitly or by drop) to unset
/// the marker.
#[derive(Debug)]
#[must_use = "dropping a ClaimTicket releases the marker"]
pub struct ClaimTicket {
    attempt_id: AttemptId,
    markers: Arc<DashMap<AttemptId, Marker>>,
    settled: bool,
}

impl ClaimTicket {
    /// Attempt this ticket is for
    #[inline]
    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    /// Commit the grant; later claims for this attempt return it
    pub fn commit(mut self, grant: RewardGrant) -> RewardGrant {
        debug_assert_eq!(grant.attempt_id, self.attempt_id);
        self.markers
            .insert(self.attempt_id, Marker::Committed(grant.clone()));
        self.settled = true;
        tracing::debug!(attempt_id = %self.attempt_id, "marker committed");
        grant
    }

    /// Unset the marker so the attempt may be submitted again
    pub fn release(mut self) {
        self.unset();
    }

    fn unset(&mut self) {
        if !self.settled {
            self.markers
                .remove_if(&self.attempt_id, |_, m| matches!(m, Marker::Pending));
            self.settled = true;
            tracing::debug!(attempt_id = %self.attempt_id, "marker released");
        }
    }
}

impl Drop for ClaimTicket {
    fn drop(&mut self) {
        self.unset();
    }
}
