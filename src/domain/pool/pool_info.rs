//! Yield pool metadata loaded from configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::pool_stats::PoolStats;
use crate::shared::errors::AdapterError;
use crate::shared::types::Balance;
use crate::shared::utils::balance_string;

/// Protocol shape of a yield pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolType {
    NominationPool,
    NativeStaking,
    LiquidStaking,
    Lending,
    SingleFarming,
    ParachainStaking,
}

impl PoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::NominationPool => "NOMINATION_POOL",
            PoolType::NativeStaking => "NATIVE_STAKING",
            PoolType::LiquidStaking => "LIQUID_STAKING",
            PoolType::Lending => "LENDING",
            PoolType::SingleFarming => "SINGLE_FARMING",
            PoolType::ParachainStaking => "PARACHAIN_STAKING",
        }
    }

    /// Lending and farming pools quote simple (APR) yield, the rest compound (APY)
    pub fn uses_apr(&self) -> bool {
        matches!(self, PoolType::Lending | PoolType::SingleFarming)
    }

    /// Pools whose funds are locked in the chain's staking pallets
    pub fn is_staking(&self) -> bool {
        matches!(
            self,
            PoolType::NominationPool | PoolType::NativeStaking | PoolType::ParachainStaking
        )
    }

    pub fn all() -> [PoolType; 6] {
        [
            PoolType::NominationPool,
            PoolType::NativeStaking,
            PoolType::LiquidStaking,
            PoolType::Lending,
            PoolType::SingleFarming,
            PoolType::ParachainStaking,
        ]
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolType {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PoolType::all()
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AdapterError::UnsupportedPool(s.to_string()))
    }
}

/// Per-pool tuning that is not read from the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolParams {
    #[serde(default, with = "balance_string")]
    pub min_join_pool: Balance,
    #[serde(default, with = "balance_string")]
    pub min_withdrawal: Balance,
    /// Share of the converted amount accepted as redeem output
    #[serde(default = "default_min_amount_percent")]
    pub min_amount_percent: f64,
    /// Chain the input token is bridged from when a transfer step is needed
    #[serde(default)]
    pub origin_chain: Option<String>,
    /// Chain block time used to locate historical blocks
    #[serde(default = "default_block_time_secs")]
    pub block_time_secs: u64,
}

fn default_min_amount_percent() -> f64 {
    0.98
}

fn default_block_time_secs() -> u64 {
    6
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            min_join_pool: 0,
            min_withdrawal: 0,
            min_amount_percent: default_min_amount_percent(),
            origin_chain: None,
            block_time_secs: default_block_time_secs(),
        }
    }
}

/// Identity of a yield pool. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub slug: String,
    pub chain: String,
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    pub name: String,
    pub input_assets: Vec<String>,
    #[serde(default)]
    pub derivative_assets: Vec<String>,
    #[serde(default)]
    pub reward_assets: Vec<String>,
    #[serde(default)]
    pub fee_assets: Vec<String>,
    #[serde(default)]
    pub params: PoolParams,
}

impl PoolInfo {
    pub fn input_asset(&self) -> Result<&str, AdapterError> {
        self.input_assets
            .first()
            .map(String::as_str)
            .ok_or_else(|| AdapterError::InvalidPool(format!("{} has no input asset", self.slug)))
    }

    pub fn derivative_asset(&self) -> Option<&str> {
        self.derivative_assets.first().map(String::as_str)
    }

    /// Asset whose balance represents a position: the derivative if any, else the input
    pub fn position_asset(&self) -> Result<&str, AdapterError> {
        match self.derivative_asset() {
            Some(slug) => Ok(slug),
            None => self.input_asset(),
        }
    }

    pub fn reward_asset(&self) -> &str {
        self.reward_assets
            .first()
            .or_else(|| self.input_assets.first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn fee_asset(&self) -> Option<&str> {
        self.fee_assets.first().map(String::as_str)
    }
}

/// Pool metadata plus the most recent stats, as pushed by a poller
#[derive(Debug, Clone)]
pub struct YieldPoolInfo {
    pub pool: Arc<PoolInfo>,
    pub stats: Option<PoolStats>,
}

impl YieldPoolInfo {
    pub fn new(pool: Arc<PoolInfo>) -> Self {
        Self { pool, stats: None }
    }

    pub fn with_stats(pool: Arc<PoolInfo>, stats: PoolStats) -> Self {
        Self { pool, stats: Some(stats) }
    }

    pub fn slug(&self) -> &str {
        &self.pool.slug
    }

    /// Pools without stats yet are treated as available
    pub fn is_available(&self) -> bool {
        self.stats.as_ref().map(|s| s.is_available).unwrap_or(true)
    }

    pub fn min_join_pool(&self) -> Balance {
        self.stats
            .as_ref()
            .map(|s| s.min_join_pool)
            .unwrap_or(self.pool.params.min_join_pool)
    }
}
