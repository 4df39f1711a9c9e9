//! Cron orchestrator: groups of periodic wallet jobs started and stopped by service

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::jobs;
use super::poller::{Poller, PollerHandle};
use super::sources::{AddressResolver, HistorySource, NftSource, PriceSource, StakingRewardSource, UnlockingSource};
use super::state::WalletState;
use super::subscription_manager::SubscriptionServices;
use crate::domain::wallet::NftTransferMeta;
use crate::infrastructure::chain::ConnectionRegistry;
use crate::shared::errors::CronError;
use crate::shared::subscription::SubscriptionHandle;
use crate::shared::types::{CronServiceType, CronType, CurrentAccount};

pub type CronStatusMap = HashMap<CronServiceType, bool>;

type CronJob = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Data sources of the account-scoped jobs. A service whose source is
/// missing refuses to start.
#[derive(Clone, Default)]
pub struct CronSources {
    pub price: Option<Arc<dyn PriceSource>>,
    pub nft: Option<Arc<dyn NftSource>>,
    pub staking_reward: Option<Arc<dyn StakingRewardSource>>,
    pub unlocking: Option<Arc<dyn UnlockingSource>>,
    pub history: Option<Arc<dyn HistorySource>>,
}

#[derive(Clone)]
pub struct CronContext {
    pub state: Arc<WalletState>,
    pub connections: Arc<ConnectionRegistry>,
    pub addresses: Arc<dyn AddressResolver>,
    pub subscriptions: Arc<dyn SubscriptionServices>,
    pub sources: CronSources,
}

fn required<T: ?Sized>(source: &Option<Arc<T>>, service: CronServiceType, name: &str) -> Result<Arc<T>, CronError> {
    source.clone().ok_or_else(|| CronError::MissingSource {
        service: format!("{:?}", service),
        source_name: name.to_string(),
    })
}

impl CronContext {
    fn check_sources(&self, service: CronServiceType) -> Result<(), CronError> {
        let s = &self.sources;
        match service {
            CronServiceType::Price => required(&s.price, service, "price").map(drop),
            CronServiceType::Nft => required(&s.nft, service, "nft").map(drop),
            CronServiceType::History => required(&s.history, service, "history").map(drop),
            CronServiceType::Staking => {
                required(&s.staking_reward, service, "staking reward")?;
                required(&s.unlocking, service, "unlocking").map(drop)
            }
            CronServiceType::RecoverApi | CronServiceType::CheckApiStatus => Ok(()),
        }
    }

    /// Job body for `cron`, bound to `account` where the job is account scoped
    fn job(&self, cron: CronType, account: Option<CurrentAccount>) -> Result<CronJob, CronError> {
        let state = Arc::clone(&self.state);
        let addresses = account
            .as_ref()
            .map(|a| self.addresses.addresses(a))
            .unwrap_or_default();

        let job: CronJob = match cron {
            CronType::RefreshPrice => {
                let source = required(&self.sources.price, CronServiceType::Price, "price")?;
                Arc::new(move || {
                    let (state, source) = (Arc::clone(&state), Arc::clone(&source));
                    async move { jobs::refresh_price(&state, source.as_ref()).await }.boxed()
                })
            }
            CronType::RefreshNft => {
                let source = required(&self.sources.nft, CronServiceType::Nft, "nft")?;
                let account = account.unwrap_or_else(|| CurrentAccount::new(CurrentAccount::ALL));
                Arc::new(move || {
                    let (state, source) = (Arc::clone(&state), Arc::clone(&source));
                    let (account, addresses) = (account.clone(), addresses.clone());
                    async move { jobs::refresh_nft(&state, source.as_ref(), &account, &addresses).await }.boxed()
                })
            }
            CronType::RefreshStakingReward => {
                let source = required(&self.sources.staking_reward, CronServiceType::Staking, "staking reward")?;
                Arc::new(move || {
                    let (state, source, addresses) = (Arc::clone(&state), Arc::clone(&source), addresses.clone());
                    async move { jobs::refresh_staking_reward(&state, source.as_ref(), &addresses).await }.boxed()
                })
            }
            CronType::RefreshStakeUnlockingInfo => {
                let source = required(&self.sources.unlocking, CronServiceType::Staking, "unlocking")?;
                Arc::new(move || {
                    let (state, source, addresses) = (Arc::clone(&state), Arc::clone(&source), addresses.clone());
                    async move { jobs::refresh_unlocking_info(&state, source.as_ref(), &addresses).await }.boxed()
                })
            }
            CronType::RefreshHistory => {
                let source = required(&self.sources.history, CronServiceType::History, "history")?;
                Arc::new(move || {
                    let (state, source, addresses) = (Arc::clone(&state), Arc::clone(&source), addresses.clone());
                    async move { jobs::refresh_history(&state, source.as_ref(), &addresses).await }.boxed()
                })
            }
            CronType::RecoverApiMap => {
                let connections = Arc::clone(&self.connections);
                let subscriptions = Arc::clone(&self.subscriptions);
                Arc::new(move || {
                    let (connections, subscriptions) = (Arc::clone(&connections), Arc::clone(&subscriptions));
                    async move { jobs::recover_api_map(&connections, subscriptions.as_ref()).await }.boxed()
                })
            }
            CronType::CheckApiMapStatus => {
                let connections = Arc::clone(&self.connections);
                Arc::new(move || {
                    let (state, connections) = (Arc::clone(&state), Arc::clone(&connections));
                    async move { jobs::check_api_map_status(&state, &connections).await }.boxed()
                })
            }
        };

        Ok(job)
    }

    /// State reset when a service binds to an account
    async fn on_bind(&self, service: CronServiceType, account: &CurrentAccount) {
        match service {
            CronServiceType::Nft => {
                self.state.reset_nfts(&account.address).await;
                self.state.set_nft_transfer_meta(NftTransferMeta::default()).await;
            }
            CronServiceType::History => {
                for address in self.addresses.addresses(account) {
                    self.state.reset_history(&address).await;
                }
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct RegistryState {
    timers: HashMap<CronType, PollerHandle>,
    generations: HashMap<CronServiceType, u64>,
}

/// At most one timer per cron type.
///
/// Each service has a generation, bumped on stop; a rebinding task only
/// installs timers while its generation is still current.
#[derive(Default)]
struct CronRegistry {
    state: Mutex<RegistryState>,
}

impl CronRegistry {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn generation(&self, service: CronServiceType) -> u64 {
        self.lock().generations.get(&service).copied().unwrap_or(0)
    }

    fn insert(&self, cron: CronType, handle: PollerHandle) {
        self.lock().timers.insert(cron, handle);
    }

    /// Spawn and install a timer unless the service was stopped since `generation`
    fn insert_if_current<F>(&self, service: CronServiceType, generation: u64, cron: CronType, spawn: F) -> bool
    where
        F: FnOnce() -> PollerHandle,
    {
        let mut state = self.lock();
        if state.generations.get(&service).copied().unwrap_or(0) != generation {
            return false;
        }
        state.timers.insert(cron, spawn());
        true
    }

    fn remove(&self, cron: CronType) -> bool {
        self.lock().timers.remove(&cron).is_some()
    }

    fn clear_service(&self, service: CronServiceType) {
        let mut state = self.lock();
        *state.generations.entry(service).or_insert(0) += 1;
        for cron in service.crons() {
            state.timers.remove(cron);
        }
    }

    fn crons(&self) -> Vec<CronType> {
        self.lock().timers.keys().copied().collect()
    }
}

fn spawn_cron(cron: CronType, period: Duration, run_first: bool, job: CronJob) -> PollerHandle {
    Poller::spawn(format!("cron:{:?}", cron), period, run_first, move || job())
}

/// Starts, stops and rebinds the wallet's periodic services
pub struct CronManager {
    ctx: CronContext,
    registry: Arc<CronRegistry>,
    intervals: HashMap<CronType, u64>,
    active: HashMap<CronServiceType, bool>,
    rebinders: HashMap<CronServiceType, SubscriptionHandle>,
    status: watch::Sender<CronStatusMap>,
}

impl CronManager {
    pub fn new(ctx: CronContext) -> Self {
        let active: CronStatusMap = CronServiceType::all().into_iter().map(|s| (s, false)).collect();
        let (status, _) = watch::channel(active.clone());

        Self {
            ctx,
            registry: Arc::new(CronRegistry::default()),
            intervals: CronType::all()
                .into_iter()
                .map(|cron| (cron, cron.default_interval_ms()))
                .collect(),
            active,
            rebinders: HashMap::new(),
            status,
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CronStatusMap> {
        self.status.subscribe()
    }

    pub fn is_active(&self, service: CronServiceType) -> bool {
        self.active.get(&service).copied().unwrap_or(false)
    }

    /// Cron types with a live timer
    pub fn active_crons(&self) -> Vec<CronType> {
        let mut crons = self.registry.crons();
        crons.sort_by_key(|c| format!("{:?}", c));
        crons
    }

    fn interval(&self, cron: CronType) -> Duration {
        let ms = self
            .intervals
            .get(&cron)
            .copied()
            .unwrap_or_else(|| cron.default_interval_ms());
        Duration::from_millis(ms)
    }

    fn emit(&self) {
        self.status.send_replace(self.active.clone());
    }

    /// Merge interval overrides and start the listed services, then emit once
    pub async fn init(&mut self, interval_overrides: HashMap<CronType, u64>, services: &[CronServiceType]) {
        self.intervals.extend(interval_overrides);

        for service in services {
            if self.is_active(*service) {
                continue;
            }
            if let Err(e) = self.start_service(*service, false).await {
                error!("❌ Failed to start cron service {:?}: {}", service, e);
            }
        }

        self.emit();
    }

    /// Install a timer for `cron`, replacing any existing one
    pub fn add_cron(&self, cron: CronType, run_first: bool) -> Result<(), CronError> {
        let job = self.ctx.job(cron, self.ctx.state.current_account())?;
        self.registry.insert(cron, spawn_cron(cron, self.interval(cron), run_first, job));
        Ok(())
    }

    pub fn remove_cron(&self, cron: CronType) -> bool {
        self.registry.remove(cron)
    }

    pub async fn start_service(&mut self, service: CronServiceType, emit: bool) -> Result<(), CronError> {
        if self.is_active(service) {
            info!("Cron service {:?} is already active", service);
            return Ok(());
        }
        self.ctx.check_sources(service)?;

        let generation = self.registry.generation(service);

        match service {
            CronServiceType::RecoverApi | CronServiceType::CheckApiStatus => {
                let run_first = service != CronServiceType::RecoverApi;
                self.bind(service, generation, None, run_first)?;
            }
            CronServiceType::History => {
                if let Some(account) = self.ctx.state.current_account() {
                    self.ctx.on_bind(service, &account).await;
                    self.bind(service, generation, Some(account), true)?;
                }
            }
            CronServiceType::Price | CronServiceType::Nft | CronServiceType::Staking => {
                if let Some(account) = self.ctx.state.current_account() {
                    if service == CronServiceType::Nft {
                        self.ctx.state.reset_nfts(&account.address).await;
                    }
                    self.bind(service, generation, Some(account), true)?;
                }
                let rebinder = self.spawn_rebinder(service, generation);
                self.rebinders.insert(service, rebinder);
            }
        }

        self.active.insert(service, true);
        info!("▶️ Cron service {:?} started", service);
        if emit {
            self.emit();
        }
        Ok(())
    }

    pub async fn stop_service(&mut self, service: CronServiceType, emit: bool) {
        if !self.is_active(service) {
            return;
        }

        if let Some(mut rebinder) = self.rebinders.remove(&service) {
            rebinder.unsubscribe();
        }
        self.registry.clear_service(service);
        self.active.insert(service, false);

        info!("⏹️ Cron service {:?} stopped", service);
        if emit {
            self.emit();
        }
    }

    pub async fn restart_service(&mut self, service: CronServiceType, emit: bool) -> Result<(), CronError> {
        if !self.is_active(service) {
            return Ok(());
        }
        self.stop_service(service, false).await;
        self.start_service(service, false).await?;
        if emit {
            self.emit();
        }
        Ok(())
    }

    /// Stop every active service
    pub async fn shutdown(&mut self) {
        for service in CronServiceType::all() {
            self.stop_service(service, false).await;
        }
        self.emit();
    }

    fn bind(
        &self,
        service: CronServiceType,
        generation: u64,
        account: Option<CurrentAccount>,
        run_first: bool,
    ) -> Result<(), CronError> {
        for cron in service.crons() {
            let job = self.ctx.job(*cron, account.clone())?;
            let period = self.interval(*cron);
            self.registry
                .insert_if_current(service, generation, *cron, || spawn_cron(*cron, period, run_first, job));
        }
        Ok(())
    }

    /// Re-add the service's crons with the new context on every service-info event
    fn spawn_rebinder(&self, service: CronServiceType, generation: u64) -> SubscriptionHandle {
        let mut events = self.ctx.state.subscribe_service_info();
        let ctx = self.ctx.clone();
        let registry = Arc::clone(&self.registry);
        let periods: Vec<(CronType, Duration)> = service.crons().iter().map(|c| (*c, self.interval(*c))).collect();

        let task = tokio::spawn(async move {
            loop {
                let info = match events.recv().await {
                    Ok(info) => info,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("{:?} rebinder skipped {} service info events", service, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if registry.generation(service) != generation {
                    break;
                }
                ctx.on_bind(service, &info.current_account).await;

                for (cron, period) in &periods {
                    let job = match ctx.job(*cron, Some(info.current_account.clone())) {
                        Ok(job) => job,
                        Err(e) => {
                            warn!("⚠️ Cannot rebind {:?}: {}", cron, e);
                            continue;
                        }
                    };
                    registry.insert_if_current(service, generation, *cron, || spawn_cron(*cron, *period, true, job));
                }
                debug!("🔁 {:?} rebound to {}", service, info.current_account.address);
            }
        });

        SubscriptionHandle::from_task(task)
    }
}
