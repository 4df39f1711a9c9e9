//! Position domain - per-address holdings in a yield pool

mod actions;
mod position_info;

pub use actions::{actions_by_type, available_actions, YieldAction};
pub use position_info::{
    PendingReward, PositionBalance, PositionInfo, PositionMetadata, UnlockingRequest, UnstakingStatus,
};
