use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::domain::pool::PoolInfo;
use crate::shared::errors::AppError;
use crate::shared::types::{
    AssetInfoMap, ChainAsset, ChainInfo, ChainInfoMap, CronServiceType, CronType,
};

/// Interval overrides in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronIntervals {
    pub recover_api_map: Option<u64>,
    pub check_api_map_status: Option<u64>,
    pub refresh_history: Option<u64>,
    pub refresh_nft: Option<u64>,
    pub refresh_price: Option<u64>,
    pub refresh_stake_unlocking_info: Option<u64>,
    pub refresh_staking_reward: Option<u64>,
}

impl CronIntervals {
    pub fn overrides(&self) -> HashMap<CronType, u64> {
        [
            (CronType::RecoverApiMap, self.recover_api_map),
            (CronType::CheckApiMapStatus, self.check_api_map_status),
            (CronType::RefreshHistory, self.refresh_history),
            (CronType::RefreshNft, self.refresh_nft),
            (CronType::RefreshPrice, self.refresh_price),
            (CronType::RefreshStakeUnlockingInfo, self.refresh_stake_unlocking_info),
            (CronType::RefreshStakingReward, self.refresh_staking_reward),
        ]
        .into_iter()
        .filter_map(|(cron, ms)| ms.map(|ms| (cron, ms)))
        .collect()
    }
}

/// Cron orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    #[serde(default)]
    pub intervals_ms: CronIntervals,
    #[serde(default = "default_active_services")]
    pub active_services: Vec<CronServiceType>,
}

fn default_active_services() -> Vec<CronServiceType> {
    CronServiceType::all().to_vec()
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            intervals_ms: CronIntervals::default(),
            active_services: default_active_services(),
        }
    }
}

/// Earning subsystem settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningConfig {
    #[serde(default = "default_stat_refresh_interval_ms")]
    pub stat_refresh_interval_ms: u64,
}

fn default_stat_refresh_interval_ms() -> u64 {
    90_000
}

impl Default for EarningConfig {
    fn default() -> Self {
        Self {
            stat_refresh_interval_ms: default_stat_refresh_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/yield.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Top-level configuration read from `Config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YieldConfig {
    #[serde(default)]
    pub chains: Vec<ChainInfo>,
    #[serde(default)]
    pub assets: Vec<ChainAsset>,
    #[serde(default)]
    pub pools: Vec<PoolInfo>,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub current_account: Option<String>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub earning: EarningConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub price: PriceConfig,
}

impl YieldConfig {
    pub fn chain_map(&self) -> ChainInfoMap {
        self.chains.iter().map(|c| (c.slug.clone(), c.clone())).collect()
    }

    pub fn asset_map(&self) -> AssetInfoMap {
        self.assets.iter().map(|a| (a.slug.clone(), a.clone())).collect()
    }

    /// Every pool must sit on a known chain and reference known assets
    pub fn validate(&self) -> Result<(), AppError> {
        let chains = self.chain_map();
        let assets = self.asset_map();

        for pool in &self.pools {
            if !chains.contains_key(&pool.chain) {
                return Err(AppError::ConfigError(format!(
                    "Pool {} references unknown chain {}",
                    pool.slug, pool.chain
                )));
            }
            if pool.input_assets.is_empty() {
                return Err(AppError::ConfigError(format!("Pool {} has no input asset", pool.slug)));
            }
            let referenced = pool
                .input_assets
                .iter()
                .chain(&pool.derivative_assets)
                .chain(&pool.reward_assets)
                .chain(&pool.fee_assets);
            for slug in referenced {
                if !assets.contains_key(slug) {
                    return Err(AppError::ConfigError(format!(
                        "Pool {} references unknown asset {}",
                        pool.slug, slug
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from `Config.toml` in the working directory
    pub fn load_config() -> Result<YieldConfig, AppError> {
        Self::load_from("Config.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<YieldConfig, AppError> {
        let config_content = fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::ConfigError(format!("Failed to read config file: {}", e)))?;

        Self::parse(&config_content)
    }

    pub fn parse(content: &str) -> Result<YieldConfig, AppError> {
        let config: YieldConfig = toml::from_str(content)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }
}
