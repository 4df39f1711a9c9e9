//! Data sources behind the cron jobs

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::wallet::{HistoryItem, NftBatch, PriceMap, StakingRewardItem, UnlockingStakeInfo};
use crate::shared::types::{ChainInfo, CurrentAccount};

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD price per coingecko id
    async fn get_prices(&self, ids: &[String]) -> Result<PriceMap>;
}

#[async_trait]
pub trait NftSource: Send + Sync {
    async fn fetch_nfts(&self, addresses: &[String]) -> Result<NftBatch>;
}

#[async_trait]
pub trait StakingRewardSource: Send + Sync {
    async fn get_staking_rewards(&self, addresses: &[String], chains: &[ChainInfo]) -> Result<Vec<StakingRewardItem>>;
}

#[async_trait]
pub trait UnlockingSource: Send + Sync {
    async fn get_unlocking_info(&self, address: &str, chain: &ChainInfo) -> Result<UnlockingStakeInfo>;
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, address: &str, chain: &ChainInfo) -> Result<Vec<HistoryItem>>;
}

/// Expands an account selection into concrete addresses
pub trait AddressResolver: Send + Sync {
    fn addresses(&self, account: &CurrentAccount) -> Vec<String>;
}

/// Resolver over a fixed keyring
pub struct StaticAddressResolver {
    accounts: Vec<String>,
}

impl StaticAddressResolver {
    pub fn new(accounts: Vec<String>) -> Self {
        Self { accounts }
    }
}

impl AddressResolver for StaticAddressResolver {
    fn addresses(&self, account: &CurrentAccount) -> Vec<String> {
        if account.is_all() {
            self.accounts.clone()
        } else {
            vec![account.address.clone()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_account_expands_to_keyring() {
        let resolver = StaticAddressResolver::new(vec!["5Alice".into(), "0xBob".into()]);

        assert_eq!(resolver.addresses(&CurrentAccount::new(CurrentAccount::ALL)).len(), 2);
        assert_eq!(resolver.addresses(&CurrentAccount::new("5Carol")), vec!["5Carol".to_string()]);
    }
}
