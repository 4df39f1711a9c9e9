//! Wallet data refreshed by the cron jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::shared::types::{Balance, ChainInfoMap, CurrentAccount};
use crate::shared::utils::balance_string;

/// Token price keyed by coingecko id
pub type PriceMap = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Connected,
    Connecting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftItem {
    pub id: String,
    pub collection_id: String,
    pub chain: String,
    pub owner: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftCollection {
    pub collection_id: String,
    pub chain: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Coordination flags between a user-initiated NFT transfer and the cron refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftTransferMeta {
    pub cron_update: bool,
    pub force_update: bool,
    #[serde(default)]
    pub selected_collection: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NftBatch {
    pub items: Vec<NftItem>,
    pub collections: Vec<NftCollection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingRewardItem {
    pub chain: String,
    pub address: String,
    #[serde(with = "balance_string")]
    pub total_reward: Balance,
    #[serde(with = "balance_string")]
    pub unclaimed_reward: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockingStakeInfo {
    pub chain: String,
    #[serde(with = "balance_string")]
    pub next_withdrawal: Balance,
    #[serde(with = "balance_string")]
    pub redeemable: Balance,
    #[serde(default)]
    pub next_withdrawal_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeUnlockingSnapshot {
    pub timestamp: DateTime<Utc>,
    pub details: HashMap<String, UnlockingStakeInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub chain: String,
    pub address: String,
    pub extrinsic_hash: String,
    pub action: String,
    #[serde(with = "balance_string")]
    pub amount: Balance,
    pub time: DateTime<Utc>,
}

/// Snapshot broadcast whenever the account, chain set or connections change
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInfo {
    pub current_account: CurrentAccount,
    pub chains: ChainInfoMap,
}
