//! Normalized pool statistics produced by protocol adapters

use serde::{Deserialize, Serialize};

use super::pool_info::PoolType;
use crate::shared::errors::AdapterError;
use crate::shared::types::Balance;
use crate::shared::utils::balance_string;

/// Value reported for yield figures that are not computed yet
pub const UNAVAILABLE_SENTINEL: f64 = -1.0;

/// Annualized yield in the pool's convention, as a percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum YieldRate {
    Apy(f64),
    Apr(f64),
}

impl YieldRate {
    pub fn for_pool(pool_type: PoolType, value: f64) -> Self {
        if pool_type.uses_apr() {
            YieldRate::Apr(value)
        } else {
            YieldRate::Apy(value)
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            YieldRate::Apy(v) | YieldRate::Apr(v) => *v,
        }
    }

    pub fn is_apr(&self) -> bool {
        matches!(self, YieldRate::Apr(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEarning {
    pub slug: String,
    pub rate: f64,
    pub exchange_rate: f64,
}

/// One poll tick worth of pool data. Replaces the previous value wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    #[serde(with = "balance_string")]
    pub tvl: Balance,
    pub yield_rate: YieldRate,
    pub asset_earning: Vec<AssetEarning>,
    pub is_available: bool,
    #[serde(with = "balance_string")]
    pub min_join_pool: Balance,
    #[serde(with = "balance_string")]
    pub min_withdrawal: Balance,
    pub max_candidate_per_farmer: u32,
    pub max_withdrawal_request_per_farmer: u32,
}

impl PoolStats {
    /// Placeholder stats for pools whose yield is not computed yet
    pub fn unavailable(pool_type: PoolType, reward_slug: &str, min_join_pool: Balance) -> Self {
        Self {
            tvl: 0,
            yield_rate: YieldRate::for_pool(pool_type, UNAVAILABLE_SENTINEL),
            asset_earning: vec![AssetEarning {
                slug: reward_slug.to_string(),
                rate: UNAVAILABLE_SENTINEL,
                exchange_rate: UNAVAILABLE_SENTINEL,
            }],
            is_available: false,
            min_join_pool,
            min_withdrawal: 0,
            max_candidate_per_farmer: 1,
            max_withdrawal_request_per_farmer: 1,
        }
    }

    /// Exchange rate of the first earning asset, if reported
    pub fn exchange_rate(&self) -> Option<f64> {
        self.asset_earning
            .first()
            .map(|e| e.exchange_rate)
            .filter(|rate| *rate > 0.0)
    }

    /// Reject stats whose yield figures do not match the pool's convention
    pub fn validate_for(&self, pool_type: PoolType) -> Result<(), AdapterError> {
        if self.yield_rate.is_apr() != pool_type.uses_apr() {
            return Err(AdapterError::InconsistentStats(format!(
                "{:?} reported for a {} pool",
                self.yield_rate, pool_type
            )));
        }

        if !self.is_available {
            let sentinel_ok = self.yield_rate.value() == UNAVAILABLE_SENTINEL
                && self
                    .asset_earning
                    .iter()
                    .all(|e| e.rate == UNAVAILABLE_SENTINEL && e.exchange_rate == UNAVAILABLE_SENTINEL);

            if !sentinel_ok {
                return Err(AdapterError::InconsistentStats(format!(
                    "unavailable {} pool reports a computed yield",
                    pool_type
                )));
            }
        }

        Ok(())
    }
}
