//! Common types used across the application

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// On-chain integer amount in the token's smallest unit
pub type Balance = u128;

/// Connection family of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Substrate,
    Evm,
}

/// Chain registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub slug: String,
    pub name: String,
    pub kind: ChainKind,
    pub rpc_url: String,
    pub native_token_slug: String,
    #[serde(default)]
    pub coingecko_key: Option<String>,
    #[serde(default)]
    pub supports_bonding: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Token registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainAsset {
    pub slug: String,
    pub origin_chain: String,
    pub symbol: String,
    pub decimals: u8,
    /// Asset id used by the chain's assets pallet, if any
    #[serde(default)]
    pub asset_id: Option<String>,
}

impl ChainAsset {
    pub fn on_chain_asset_id(&self) -> Option<&str> {
        self.asset_id.as_deref()
    }
}

/// Chain slug -> chain info
pub type ChainInfoMap = HashMap<String, ChainInfo>;

/// Token slug -> token info
pub type AssetInfoMap = HashMap<String, ChainAsset>;

/// Account selected in the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAccount {
    pub address: String,
}

impl CurrentAccount {
    /// Pseudo-account standing for every account in the keyring
    pub const ALL: &'static str = "ALL";

    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into() }
    }

    pub fn is_all(&self) -> bool {
        self.address == Self::ALL
    }
}

/// Logical cron service, each owning one or more cron timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CronServiceType {
    Price,
    Nft,
    Staking,
    History,
    RecoverApi,
    CheckApiStatus,
}

impl CronServiceType {
    pub fn all() -> [CronServiceType; 6] {
        [
            CronServiceType::CheckApiStatus,
            CronServiceType::RecoverApi,
            CronServiceType::History,
            CronServiceType::Nft,
            CronServiceType::Price,
            CronServiceType::Staking,
        ]
    }

    /// Cron timers owned by the service
    pub fn crons(&self) -> &'static [CronType] {
        match self {
            CronServiceType::CheckApiStatus => &[CronType::CheckApiMapStatus],
            CronServiceType::RecoverApi => &[CronType::RecoverApiMap],
            CronServiceType::History => &[CronType::RefreshHistory],
            CronServiceType::Nft => &[CronType::RefreshNft],
            CronServiceType::Price => &[CronType::RefreshPrice],
            CronServiceType::Staking => &[CronType::RefreshStakeUnlockingInfo, CronType::RefreshStakingReward],
        }
    }
}

/// Single periodic timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CronType {
    RecoverApiMap,
    CheckApiMapStatus,
    RefreshHistory,
    RefreshNft,
    RefreshPrice,
    RefreshStakeUnlockingInfo,
    RefreshStakingReward,
}

impl CronType {
    pub fn default_interval_ms(&self) -> u64 {
        match self {
            CronType::RecoverApiMap => 60_000,
            CronType::CheckApiMapStatus => 30_000,
            CronType::RefreshHistory => 90_000,
            CronType::RefreshNft => 60_000,
            CronType::RefreshPrice => 30_000,
            CronType::RefreshStakeUnlockingInfo => 60_000,
            CronType::RefreshStakingReward => 90_000,
        }
    }

    pub fn all() -> [CronType; 7] {
        [
            CronType::RecoverApiMap,
            CronType::CheckApiMapStatus,
            CronType::RefreshHistory,
            CronType::RefreshNft,
            CronType::RefreshPrice,
            CronType::RefreshStakeUnlockingInfo,
            CronType::RefreshStakingReward,
        ]
    }
}

/// Subscription-backed services restarted after a reconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionServiceType {
    YieldPools,
    YieldPositions,
}
