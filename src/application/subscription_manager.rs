//! Yield pool and position subscriptions, one poller and one tracker per pool slug

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use super::poller::PollerHandle;
use super::sources::AddressResolver;
use super::state::WalletState;
use crate::domain::pool::{PoolInfo, PoolType, YieldPoolInfo};
use crate::domain::position::PositionInfo;
use crate::infrastructure::storage::{YieldPoolStore, YieldPositionStore};
use crate::infrastructure::yield_adapters::{subscribe_pool_stats, AdapterFactory, PositionSink};
use crate::shared::subscription::SubscriptionHandle;
use crate::shared::types::{CurrentAccount, SubscriptionServiceType};

pub type ServiceStatusMap = HashMap<SubscriptionServiceType, bool>;

/// Restart hook used by the connection recovery job
#[async_trait]
pub trait SubscriptionServices: Send + Sync {
    /// Restart every active service, then emit the status map once
    async fn restart_active_services(&self);
}

#[derive(Default)]
struct Subscriptions {
    active: HashSet<SubscriptionServiceType>,
    pollers: HashMap<String, PollerHandle>,
    consumers: HashMap<SubscriptionServiceType, SubscriptionHandle>,
}

pub struct SubscriptionManager {
    factory: Arc<AdapterFactory>,
    state: Arc<WalletState>,
    pools: Vec<Arc<PoolInfo>>,
    addresses: Arc<dyn AddressResolver>,
    pool_store: Option<YieldPoolStore>,
    position_store: Option<YieldPositionStore>,
    stat_interval: Duration,
    inner: Mutex<Subscriptions>,
    status: watch::Sender<ServiceStatusMap>,
}

impl SubscriptionManager {
    pub fn new(
        factory: Arc<AdapterFactory>,
        state: Arc<WalletState>,
        pools: Vec<Arc<PoolInfo>>,
        addresses: Arc<dyn AddressResolver>,
        stat_interval: Duration,
    ) -> Self {
        let (status, _) = watch::channel(ServiceStatusMap::new());
        Self {
            factory,
            state,
            pools,
            addresses,
            pool_store: None,
            position_store: None,
            stat_interval,
            inner: Mutex::new(Subscriptions::default()),
            status,
        }
    }

    pub fn with_stores(mut self, pool_store: YieldPoolStore, position_store: YieldPositionStore) -> Self {
        self.pool_store = Some(pool_store);
        self.position_store = Some(position_store);
        self
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ServiceStatusMap> {
        self.status.subscribe()
    }

    pub async fn active_services(&self) -> ServiceStatusMap {
        let inner = self.inner.lock().await;
        [SubscriptionServiceType::YieldPools, SubscriptionServiceType::YieldPositions]
            .into_iter()
            .map(|service| (service, inner.active.contains(&service)))
            .collect()
    }

    fn position_tracking(&self, sink: PositionSink) -> PositionTracking {
        PositionTracking {
            factory: Arc::clone(&self.factory),
            pools: self.pools.clone(),
            addresses: Arc::clone(&self.addresses),
            sink,
        }
    }

    async fn emit(&self) {
        let map = self.active_services().await;
        self.status.send_replace(map);
    }

    pub async fn start_service(&self, service: SubscriptionServiceType, emit: bool) {
        {
            let mut inner = self.inner.lock().await;
            if inner.active.contains(&service) {
                debug!("Subscription {:?} already active", service);
                return;
            }

            match service {
                SubscriptionServiceType::YieldPools => self.start_pools(&mut inner),
                SubscriptionServiceType::YieldPositions => self.start_positions(&mut inner).await,
            }
            inner.active.insert(service);
        }

        info!("▶️ Subscription {:?} started", service);
        if emit {
            self.emit().await;
        }
    }

    pub async fn stop_service(&self, service: SubscriptionServiceType, emit: bool) {
        {
            let mut inner = self.inner.lock().await;
            if !inner.active.remove(&service) {
                return;
            }

            if service == SubscriptionServiceType::YieldPools {
                inner.pollers.clear();
            }
            inner.consumers.remove(&service);
        }

        match service {
            SubscriptionServiceType::YieldPools => self.state.clear_pools().await,
            SubscriptionServiceType::YieldPositions => self.state.clear_positions().await,
        }

        info!("⏹️ Subscription {:?} stopped", service);
        if emit {
            self.emit().await;
        }
    }

    pub async fn restart_service(&self, service: SubscriptionServiceType, emit: bool) {
        if !self.inner.lock().await.active.contains(&service) {
            return;
        }
        self.stop_service(service, false).await;
        self.start_service(service, false).await;
        if emit {
            self.emit().await;
        }
    }

    pub async fn shutdown(&self) {
        for service in [SubscriptionServiceType::YieldPools, SubscriptionServiceType::YieldPositions] {
            self.stop_service(service, false).await;
        }
        self.emit().await;
    }

    fn start_pools(&self, inner: &mut Subscriptions) {
        let (tx, mut rx) = mpsc::unbounded_channel::<YieldPoolInfo>();

        for pool in &self.pools {
            let adapter = self.factory.create_adapter(pool.pool_type);
            let handle = subscribe_pool_stats(adapter, Arc::clone(pool), self.stat_interval, tx.clone());
            inner.pollers.insert(pool.slug.clone(), handle);
        }

        let state = Arc::clone(&self.state);
        let store = self.pool_store.clone();
        let consumer = tokio::spawn(async move {
            while let Some(info) = rx.recv().await {
                if let Some(store) = &store {
                    if let Err(e) = store.upsert(&info) {
                        warn!("⚠️ Failed to store pool {}: {}", info.slug(), e);
                    }
                }
                state.set_pool(info).await;
            }
        });
        inner
            .consumers
            .insert(SubscriptionServiceType::YieldPools, SubscriptionHandle::from_task(consumer));
    }

    /// Track positions for the current account and re-track on every account switch
    async fn start_positions(&self, inner: &mut Subscriptions) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PositionInfo>();
        let tracking = self.position_tracking(tx);

        let mut account_rx = self.state.subscribe_current_account();
        let account = account_rx.borrow_and_update().clone();
        let mut addresses = tracking.resolve(account.as_ref());
        let (tracked_tx, tracked) = watch::channel(addresses.iter().cloned().collect::<HashSet<_>>());
        if account.is_none() {
            debug!("No current account, positions tracked after the first switch");
        }
        let mut trackers = tracking.track(&addresses).await;

        let state = Arc::clone(&self.state);
        let watcher = tokio::spawn(async move {
            while account_rx.changed().await.is_ok() {
                let account = account_rx.borrow_and_update().clone();
                let next = tracking.resolve(account.as_ref());
                if next == addresses {
                    continue;
                }

                info!("🔄 Account switched, tracking positions for {} addresses", next.len());
                tracked_tx.send_replace(next.iter().cloned().collect());
                trackers.clear();
                state.clear_positions().await;
                trackers = tracking.track(&next).await;
                addresses = next;
            }
        });

        let pool_types: HashMap<String, PoolType> =
            self.pools.iter().map(|p| (p.slug.clone(), p.pool_type)).collect();
        let state = Arc::clone(&self.state);
        let store = self.position_store.clone();
        let consumer = tokio::spawn(async move {
            while let Some(position) = rx.recv().await {
                let is_tracked = tracked.borrow().contains(&position.address);
                if !is_tracked {
                    debug!("Dropping position {}/{} of a previous account", position.slug, position.address);
                    continue;
                }
                if let Some(store) = &store {
                    if let Err(e) = store.upsert(&position) {
                        warn!("⚠️ Failed to store position {}/{}: {}", position.slug, position.address, e);
                    }
                }
                if pool_types.get(&position.slug).map(PoolType::is_staking).unwrap_or(false) {
                    state
                        .set_staked_balance(&position.address, &position.chain, position.active_balance())
                        .await;
                }
                state.set_position(position).await;
            }
        });
        inner.consumers.insert(
            SubscriptionServiceType::YieldPositions,
            SubscriptionHandle::group(vec![
                SubscriptionHandle::from_task(watcher),
                SubscriptionHandle::from_task(consumer),
            ]),
        );
    }

    #[cfg(test)]
    async fn poller_count(&self) -> usize {
        self.inner.lock().await.pollers.len()
    }
}

/// What a position watcher needs to re-subscribe without borrowing the manager
struct PositionTracking {
    factory: Arc<AdapterFactory>,
    pools: Vec<Arc<PoolInfo>>,
    addresses: Arc<dyn AddressResolver>,
    sink: PositionSink,
}

impl PositionTracking {
    fn resolve(&self, account: Option<&CurrentAccount>) -> Vec<String> {
        account.map(|a| self.addresses.addresses(a)).unwrap_or_default()
    }

    async fn track(&self, addresses: &[String]) -> HashMap<String, SubscriptionHandle> {
        let mut trackers = HashMap::new();
        if addresses.is_empty() {
            return trackers;
        }

        for pool in &self.pools {
            let adapter = self.factory.create_adapter(pool.pool_type);
            match adapter.track_positions(addresses, pool, self.sink.clone()).await {
                Ok(handle) => {
                    trackers.insert(pool.slug.clone(), handle);
                }
                Err(e) => warn!("⚠️ Failed to track positions for {}: {}", pool.slug, e),
            }
        }
        trackers
    }
}

#[async_trait]
impl SubscriptionServices for SubscriptionManager {
    async fn restart_active_services(&self) {
        let active: Vec<_> = self.inner.lock().await.active.iter().copied().collect();
        for service in active {
            self.restart_service(service, false).await;
        }
        self.emit().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sources::StaticAddressResolver;
    use crate::infrastructure::storage::YieldDatabase;
    use crate::infrastructure::yield_adapters::AdapterContext;
    use crate::shared::types::{ChainInfoMap, CurrentAccount};
    use crate::testing::{parallel_pool, simple_pool, FakeSubstrateApi};
    use serde_json::json;

    fn moonwell() -> Arc<PoolInfo> {
        let mut pool = simple_pool("xcDOT___lending___moonwell", "moonbeam", PoolType::Lending, "moonbeam-LOCAL-xcDOT");
        pool.params.min_join_pool = 50_000_000_000;
        Arc::new(pool)
    }

    fn manager(ctx: AdapterContext, pools: Vec<Arc<PoolInfo>>, account: Option<&str>) -> SubscriptionManager {
        let state = Arc::new(WalletState::new(ChainInfoMap::new(), account.map(CurrentAccount::new)));
        let db = YieldDatabase::open_in_memory().unwrap();
        SubscriptionManager::new(
            Arc::new(AdapterFactory::new(ctx)),
            state,
            pools,
            Arc::new(StaticAddressResolver::new(vec![])),
            Duration::from_secs(90),
        )
        .with_stores(YieldPoolStore::new(db.clone()), YieldPositionStore::new(db))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_stats_reach_state_and_store() {
        let manager = manager(AdapterContext::for_tests(), vec![moonwell()], None);

        manager.start_service(SubscriptionServiceType::YieldPools, true).await;
        settle().await;

        let info = manager.state.pool("xcDOT___lending___moonwell").await.unwrap();
        let stats = info.stats.unwrap();
        assert!(!stats.is_available);
        assert_eq!(stats.min_join_pool, 50_000_000_000);

        let stored = manager.pool_store.as_ref().unwrap().get_all().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(manager.subscribe_status().borrow()[&SubscriptionServiceType::YieldPools]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_one_poller_per_pool() {
        let manager = manager(AdapterContext::for_tests(), vec![moonwell()], None);

        manager.start_service(SubscriptionServiceType::YieldPools, false).await;
        manager.start_service(SubscriptionServiceType::YieldPools, false).await;
        assert_eq!(manager.poller_count().await, 1);

        manager.restart_active_services().await;
        assert_eq!(manager.poller_count().await, 1);

        manager.stop_service(SubscriptionServiceType::YieldPools, false).await;
        assert_eq!(manager.poller_count().await, 0);
        assert!(!manager.active_services().await[&SubscriptionServiceType::YieldPools]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_pools_clears_their_stats() {
        let manager = manager(AdapterContext::for_tests(), vec![moonwell()], None);

        manager.start_service(SubscriptionServiceType::YieldPools, false).await;
        settle().await;
        assert_eq!(manager.state.pools().await.len(), 1);

        manager.stop_service(SubscriptionServiceType::YieldPools, false).await;
        assert!(manager.state.pools().await.is_empty());
        assert!(manager.state.pool("xcDOT___lending___moonwell").await.is_none());
    }

    #[tokio::test]
    async fn test_positions_update_state() {
        let (pool, assets) = parallel_pool();
        let api = Arc::new(FakeSubstrateApi::new("parallel"));
        let mut ctx = AdapterContext::for_tests();
        ctx.apis.register(api.clone());
        ctx.assets = Arc::new(assets);
        let manager = manager(ctx, vec![Arc::new(pool)], Some("5Alice"));

        manager.start_service(SubscriptionServiceType::YieldPositions, false).await;
        api.emit(vec![Some(json!({ "balance": "2,000" }))]);
        settle().await;

        let positions = manager.state.positions("5Alice").await;
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].total_balance(), 2_000);
        assert_eq!(
            manager.position_store.as_ref().unwrap().get_by_address("5Alice").unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_positions_follow_account_switch() {
        let (pool, assets) = parallel_pool();
        let api = Arc::new(FakeSubstrateApi::new("parallel"));
        let mut ctx = AdapterContext::for_tests();
        ctx.apis.register(api.clone());
        ctx.assets = Arc::new(assets);
        let manager = manager(ctx, vec![Arc::new(pool)], None);

        manager.start_service(SubscriptionServiceType::YieldPositions, false).await;
        assert!(api.subscribed_keys.lock().unwrap().is_empty());

        manager.state.set_current_account(CurrentAccount::new("5Bob")).await;
        settle().await;
        assert_eq!(api.subscribed_keys.lock().unwrap()[0], vec![json!("1001"), json!("5Bob")]);

        api.emit(vec![Some(json!({ "balance": "2,000" }))]);
        settle().await;
        assert_eq!(manager.state.positions("5Bob").await.len(), 1);

        manager.state.set_current_account(CurrentAccount::new("5Carol")).await;
        settle().await;
        assert!(manager.state.positions("5Bob").await.is_empty());
        assert_eq!(api.subscriber_count(), 1);

        api.emit(vec![Some(json!({ "balance": "3,000" }))]);
        settle().await;
        let carol = manager.state.positions("5Carol").await;
        assert_eq!(carol.len(), 1);
        assert_eq!(carol[0].total_balance(), 3_000);
        assert!(manager.state.positions("5Bob").await.is_empty());
    }

    #[tokio::test]
    async fn test_stopping_positions_clears_staked_balance() {
        let api = Arc::new(FakeSubstrateApi::new("polkadot"));
        let mut ctx = AdapterContext::for_tests();
        ctx.apis.register(api.clone());
        let pool = simple_pool("DOT___nomination_pool___polkadot", "polkadot", PoolType::NominationPool, "polkadot-NATIVE-DOT");
        let manager = manager(ctx, vec![Arc::new(pool)], Some("5Alice"));

        manager.start_service(SubscriptionServiceType::YieldPositions, false).await;
        manager
            .state
            .set_staked_balance("5Alice", "polkadot", 500)
            .await;

        manager.stop_service(SubscriptionServiceType::YieldPositions, false).await;
        assert_eq!(manager.state.staked_balance("5Alice", "polkadot").await, 0);
        assert!(manager.state.positions("5Alice").await.is_empty());
    }
}
