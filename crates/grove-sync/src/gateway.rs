//! Presentation gateway
//!
//! The presentation layer receives three events per committed grant, in a
//! fixed order: stage increase, completion, reward. Animation timing is the
//! presentation layer's business; these calls are synchronous.

use grove_ledger::{GrowthEvents, TreeState};
use grove_reward::RewardGrant;

/// Consumer of progression events
pub trait PresentationGateway: Send + Sync {
    /// Tree reached a new stage
    fn on_stage_increased(&self, new_stage: u32);

    /// Tree completed
    fn on_completed(&self);

    /// A grant was committed
    fn on_reward_granted(&self, grant: &RewardGrant);
}

/// Gateway that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGateway;

impl PresentationGateway for NoopGateway {
    fn on_stage_increased(&self, _new_stage: u32) {}

    fn on_completed(&self) {}

    fn on_reward_granted(&self, _grant: &RewardGrant) {}
}

/// Deliver the events for one committed grant
pub fn notify(
    gateway: &dyn PresentationGateway,
    tree: &TreeState,
    events: GrowthEvents,
    grant: &RewardGrant,
) {
    if events.stage_increased {
        gateway.on_stage_increased(tree.current_stage());
    }
    if events.just_completed {
        gateway.on_completed();
    }
    gateway.on_reward_granted(grant);
}
