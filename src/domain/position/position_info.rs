use serde::{Deserialize, Serialize};

use crate::shared::types::Balance;
use crate::shared::utils::balance_string;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBalance {
    pub slug: String,
    #[serde(with = "balance_string")]
    pub total_balance: Balance,
    #[serde(with = "balance_string")]
    pub active_balance: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReward {
    pub slug: String,
    #[serde(with = "balance_string")]
    pub amount: Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnstakingStatus {
    Unlocking,
    Withdrawable,
}

/// A chunk of stake leaving the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockingRequest {
    pub slug: String,
    #[serde(with = "balance_string")]
    pub amount: Balance,
    pub status: UnstakingStatus,
    /// Era (or round) at which the chunk unlocks
    #[serde(default)]
    pub target_era: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMetadata {
    #[serde(default)]
    pub rewards: Vec<PendingReward>,
    #[serde(default)]
    pub unstakings: Vec<UnlockingRequest>,
}

/// Holdings of one address in one pool. Superseded on every balance emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub slug: String,
    pub chain: String,
    pub address: String,
    pub balance: Vec<PositionBalance>,
    #[serde(default)]
    pub metadata: PositionMetadata,
}

impl PositionInfo {
    /// Single-asset position where the whole balance is active
    pub fn single(slug: &str, chain: &str, address: &str, token_slug: &str, amount: Balance) -> Self {
        Self {
            slug: slug.to_string(),
            chain: chain.to_string(),
            address: address.to_string(),
            balance: vec![PositionBalance {
                slug: token_slug.to_string(),
                total_balance: amount,
                active_balance: amount,
            }],
            metadata: PositionMetadata::default(),
        }
    }

    pub fn total_balance(&self) -> Balance {
        self.balance.iter().map(|b| b.total_balance).sum()
    }

    pub fn active_balance(&self) -> Balance {
        self.balance.iter().map(|b| b.active_balance).sum()
    }

    pub fn withdrawable_amount(&self) -> Balance {
        self.metadata
            .unstakings
            .iter()
            .filter(|u| u.status == UnstakingStatus::Withdrawable)
            .map(|u| u.amount)
            .sum()
    }

    pub fn has_pending_unlocking(&self) -> bool {
        self.metadata
            .unstakings
            .iter()
            .any(|u| u.status == UnstakingStatus::Unlocking)
    }

    pub fn pending_reward(&self) -> Balance {
        self.metadata.rewards.iter().map(|r| r.amount).sum()
    }
}
