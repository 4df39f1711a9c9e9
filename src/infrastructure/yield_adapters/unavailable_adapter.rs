//! Pools whose yield is not computed yet (lending markets, single farming).
//! They still poll on the shared cadence so the pool shows up with placeholder stats.

use async_trait::async_trait;
use tracing::debug;

use super::factory::AdapterContext;
use super::position_tracker::track_asset_positions;
use super::traits::{PositionSink, YieldProtocolAdapter};
use crate::domain::execution::{ExecutionPlan, OptimalYieldPathParams, StepSubmitData};
use crate::domain::path::OptimalYieldPath;
use crate::domain::pool::{PoolInfo, PoolStats, PoolType};
use crate::shared::errors::AdapterError;
use crate::shared::subscription::SubscriptionHandle;

pub struct UnavailablePoolAdapter {
    pool_type: PoolType,
    ctx: AdapterContext,
}

impl UnavailablePoolAdapter {
    pub fn new(pool_type: PoolType, ctx: AdapterContext) -> Self {
        Self { pool_type, ctx }
    }

    fn not_joinable(pool: &PoolInfo) -> AdapterError {
        AdapterError::UnsupportedAction {
            pool: pool.slug.clone(),
            action: "join".to_string(),
        }
    }
}

#[async_trait]
impl YieldProtocolAdapter for UnavailablePoolAdapter {
    fn pool_type(&self) -> PoolType {
        self.pool_type
    }

    async fn fetch_stats(&self, pool: &PoolInfo) -> Result<PoolStats, AdapterError> {
        Ok(PoolStats::unavailable(
            pool.pool_type,
            pool.reward_asset(),
            pool.params.min_join_pool,
        ))
    }

    async fn track_positions(
        &self,
        addresses: &[String],
        pool: &PoolInfo,
        sink: PositionSink,
    ) -> Result<SubscriptionHandle, AdapterError> {
        match self.ctx.apis.ready(&pool.chain).await {
            Ok(api) => track_asset_positions(api, addresses, pool, &self.ctx.assets, sink).await,
            Err(e) => {
                debug!("No position tracking for {}: {}", pool.slug, e);
                Ok(SubscriptionHandle::noop())
            }
        }
    }

    async fn generate_path(&self, params: &OptimalYieldPathParams) -> Result<OptimalYieldPath, AdapterError> {
        Err(Self::not_joinable(&params.pool.pool))
    }

    async fn build_step(
        &self,
        _address: &str,
        params: &OptimalYieldPathParams,
        _path: &OptimalYieldPath,
        _step_index: usize,
        _request: &StepSubmitData,
    ) -> Result<ExecutionPlan, AdapterError> {
        Err(Self::not_joinable(&params.pool.pool))
    }
}
