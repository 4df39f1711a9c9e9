//! Pool domain - yield pool metadata and statistics

mod pool_info;
mod pool_stats;

pub use pool_info::{PoolInfo, PoolParams, PoolType, YieldPoolInfo};
pub use pool_stats::{AssetEarning, PoolStats, YieldRate, UNAVAILABLE_SENTINEL};
