use std::collections::HashMap;
use std::sync::Arc;

use super::liquid_staking::ParallelLiquidStakingAdapter;
use super::staking_adapter::StakingPoolAdapter;
use super::traits::YieldProtocolAdapter;
use super::unavailable_adapter::UnavailablePoolAdapter;
use crate::domain::pool::PoolType;
use crate::infrastructure::chain::{BalanceService, ChainApiRegistry, XcmBuilder};
use crate::shared::errors::AdapterError;
use crate::shared::types::{AssetInfoMap, ChainAsset, ChainInfo, ChainInfoMap};

/// Collaborators every adapter reads from
#[derive(Clone)]
pub struct AdapterContext {
    pub apis: ChainApiRegistry,
    pub assets: Arc<AssetInfoMap>,
    pub chains: Arc<ChainInfoMap>,
    pub balance_service: Arc<dyn BalanceService>,
    pub xcm: Arc<dyn XcmBuilder>,
}

impl AdapterContext {
    pub fn asset(&self, slug: &str) -> Result<&ChainAsset, AdapterError> {
        self.assets
            .get(slug)
            .ok_or_else(|| AdapterError::AssetNotFound(slug.to_string()))
    }

    pub fn chain(&self, slug: &str) -> Result<&ChainInfo, AdapterError> {
        self.chains
            .get(slug)
            .ok_or_else(|| AdapterError::InvalidPool(format!("unknown chain {}", slug)))
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        use crate::testing::{FakeBalanceService, FakeXcmBuilder};

        Self {
            apis: ChainApiRegistry::new(),
            assets: Arc::new(AssetInfoMap::new()),
            chains: Arc::new(ChainInfoMap::new()),
            balance_service: Arc::new(FakeBalanceService::default()),
            xcm: Arc::new(FakeXcmBuilder::new(0)),
        }
    }
}

/// Factory for creating yield adapters
pub struct AdapterFactory {
    ctx: AdapterContext,
    adapters: HashMap<PoolType, Arc<dyn YieldProtocolAdapter>>,
}

impl AdapterFactory {
    pub fn new(ctx: AdapterContext) -> Self {
        let adapters = PoolType::all()
            .into_iter()
            .map(|pool_type| (pool_type, Self::build(pool_type, &ctx)))
            .collect();

        Self { ctx, adapters }
    }

    fn build(pool_type: PoolType, ctx: &AdapterContext) -> Arc<dyn YieldProtocolAdapter> {
        match pool_type {
            PoolType::LiquidStaking => Arc::new(ParallelLiquidStakingAdapter::new(ctx.clone())),
            PoolType::Lending | PoolType::SingleFarming => {
                Arc::new(UnavailablePoolAdapter::new(pool_type, ctx.clone()))
            }
            PoolType::NativeStaking | PoolType::NominationPool | PoolType::ParachainStaking => {
                Arc::new(StakingPoolAdapter::new(pool_type, ctx.clone()))
            }
        }
    }

    /// Adapter for the specified pool type
    pub fn create_adapter(&self, pool_type: PoolType) -> Arc<dyn YieldProtocolAdapter> {
        match self.adapters.get(&pool_type) {
            Some(adapter) => Arc::clone(adapter),
            None => Self::build(pool_type, &self.ctx),
        }
    }

    pub fn context(&self) -> &AdapterContext {
        &self.ctx
    }
}
