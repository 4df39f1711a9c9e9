//! Shared wallet state written by cron jobs and subscription services

use std::collections::HashMap;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::debug;

use crate::domain::pool::YieldPoolInfo;
use crate::domain::position::PositionInfo;
use crate::domain::wallet::{
    HistoryItem, NetworkStatus, NftBatch, NftTransferMeta, PriceMap, ServiceInfo, StakeUnlockingSnapshot,
    StakingRewardItem,
};
use crate::shared::types::{Balance, ChainInfoMap, CurrentAccount};

const SERVICE_INFO_CAPACITY: usize = 16;

pub struct WalletState {
    current_account: watch::Sender<Option<CurrentAccount>>,
    service_info: broadcast::Sender<ServiceInfo>,
    chains: RwLock<ChainInfoMap>,
    network_status: RwLock<HashMap<String, NetworkStatus>>,
    prices: RwLock<PriceMap>,
    nft_meta: RwLock<NftTransferMeta>,
    nfts: RwLock<HashMap<String, NftBatch>>,
    staking_rewards: RwLock<Vec<StakingRewardItem>>,
    unlocking: RwLock<Option<StakeUnlockingSnapshot>>,
    staked_balances: RwLock<HashMap<(String, String), Balance>>,
    history: RwLock<HashMap<String, Vec<HistoryItem>>>,
    pools: RwLock<HashMap<String, YieldPoolInfo>>,
    positions: RwLock<HashMap<(String, String), PositionInfo>>,
}

impl WalletState {
    pub fn new(chains: ChainInfoMap, current_account: Option<CurrentAccount>) -> Self {
        let (current_account, _) = watch::channel(current_account);
        let (service_info, _) = broadcast::channel(SERVICE_INFO_CAPACITY);

        Self {
            current_account,
            service_info,
            chains: RwLock::new(chains),
            network_status: RwLock::new(HashMap::new()),
            prices: RwLock::new(PriceMap::new()),
            nft_meta: RwLock::new(NftTransferMeta::default()),
            nfts: RwLock::new(HashMap::new()),
            staking_rewards: RwLock::new(Vec::new()),
            unlocking: RwLock::new(None),
            staked_balances: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            pools: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
        }
    }

    pub fn current_account(&self) -> Option<CurrentAccount> {
        self.current_account.borrow().clone()
    }

    /// Switch account and announce the new service info
    pub async fn set_current_account(&self, account: CurrentAccount) {
        self.current_account.send_replace(Some(account));
        self.publish_service_info().await;
    }

    pub fn subscribe_current_account(&self) -> watch::Receiver<Option<CurrentAccount>> {
        self.current_account.subscribe()
    }

    pub fn subscribe_service_info(&self) -> broadcast::Receiver<ServiceInfo> {
        self.service_info.subscribe()
    }

    /// Broadcast the current account and chain map. No-op without an account.
    pub async fn publish_service_info(&self) {
        let Some(current_account) = self.current_account() else {
            return;
        };
        let info = ServiceInfo {
            current_account,
            chains: self.chains.read().await.clone(),
        };
        if self.service_info.send(info).is_err() {
            debug!("No service info subscribers");
        }
    }

    pub async fn chains(&self) -> ChainInfoMap {
        self.chains.read().await.clone()
    }

    pub async fn set_chains(&self, chains: ChainInfoMap) {
        *self.chains.write().await = chains;
        self.publish_service_info().await;
    }

    pub async fn network_status(&self, chain: &str) -> Option<NetworkStatus> {
        self.network_status.read().await.get(chain).copied()
    }

    /// Returns whether the stored status changed
    pub async fn set_network_status(&self, chain: &str, status: NetworkStatus) -> bool {
        let mut statuses = self.network_status.write().await;
        if statuses.get(chain) == Some(&status) {
            return false;
        }
        statuses.insert(chain.to_string(), status);
        true
    }

    pub async fn prices(&self) -> PriceMap {
        self.prices.read().await.clone()
    }

    pub async fn set_prices(&self, prices: PriceMap) {
        *self.prices.write().await = prices;
    }

    pub async fn nft_transfer_meta(&self) -> NftTransferMeta {
        self.nft_meta.read().await.clone()
    }

    pub async fn set_nft_transfer_meta(&self, meta: NftTransferMeta) {
        *self.nft_meta.write().await = meta;
    }

    pub async fn nfts(&self, address: &str) -> Option<NftBatch> {
        self.nfts.read().await.get(address).cloned()
    }

    pub async fn set_nfts(&self, address: &str, batch: NftBatch) {
        self.nfts.write().await.insert(address.to_string(), batch);
    }

    pub async fn reset_nfts(&self, address: &str) {
        self.nfts.write().await.remove(address);
    }

    pub async fn staking_rewards(&self) -> Vec<StakingRewardItem> {
        self.staking_rewards.read().await.clone()
    }

    pub async fn set_staking_rewards(&self, rewards: Vec<StakingRewardItem>) {
        *self.staking_rewards.write().await = rewards;
    }

    pub async fn unlocking_info(&self) -> Option<StakeUnlockingSnapshot> {
        self.unlocking.read().await.clone()
    }

    pub async fn set_unlocking_info(&self, snapshot: StakeUnlockingSnapshot) {
        *self.unlocking.write().await = Some(snapshot);
    }

    pub async fn staked_balance(&self, address: &str, chain: &str) -> Balance {
        self.staked_balances
            .read()
            .await
            .get(&(address.to_string(), chain.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub async fn set_staked_balance(&self, address: &str, chain: &str, amount: Balance) {
        self.staked_balances
            .write()
            .await
            .insert((address.to_string(), chain.to_string()), amount);
    }

    pub async fn history(&self, address: &str) -> Vec<HistoryItem> {
        self.history.read().await.get(address).cloned().unwrap_or_default()
    }

    pub async fn set_history(&self, address: &str, items: Vec<HistoryItem>) {
        self.history.write().await.insert(address.to_string(), items);
    }

    pub async fn reset_history(&self, address: &str) {
        self.history.write().await.remove(address);
    }

    pub async fn pool(&self, slug: &str) -> Option<YieldPoolInfo> {
        self.pools.read().await.get(slug).cloned()
    }

    pub async fn pools(&self) -> Vec<YieldPoolInfo> {
        self.pools.read().await.values().cloned().collect()
    }

    pub async fn set_pool(&self, info: YieldPoolInfo) {
        self.pools.write().await.insert(info.slug().to_string(), info);
    }

    pub async fn clear_pools(&self) {
        self.pools.write().await.clear();
    }

    pub async fn set_position(&self, position: PositionInfo) {
        self.positions
            .write()
            .await
            .insert((position.slug.clone(), position.address.clone()), position);
    }

    pub async fn positions(&self, address: &str) -> Vec<PositionInfo> {
        self.positions
            .read()
            .await
            .values()
            .filter(|p| p.address == address)
            .cloned()
            .collect()
    }

    /// Drop every tracked position and the staked balances derived from them
    pub async fn clear_positions(&self) {
        self.positions.write().await.clear();
        self.staked_balances.write().await.clear();
    }
}
