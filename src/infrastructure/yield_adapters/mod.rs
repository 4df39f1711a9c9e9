//! Protocol adapters - one implementation per pool shape

pub mod factory;
pub mod liquid_staking;
pub mod position_tracker;
pub mod staking_adapter;
pub mod traits;
pub mod unavailable_adapter;

pub use factory::{AdapterContext, AdapterFactory};
pub use liquid_staking::ParallelLiquidStakingAdapter;
pub use staking_adapter::StakingPoolAdapter;
pub use traits::{subscribe_pool_stats, PositionSink, StatsSink, YieldProtocolAdapter};
pub use unavailable_adapter::UnavailablePoolAdapter;
