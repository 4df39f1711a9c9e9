// src/app.rs
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::cron::{CronContext, CronManager, CronSources};
use crate::application::sources::StaticAddressResolver;
use crate::application::state::WalletState;
use crate::application::subscription_manager::SubscriptionManager;
use crate::infrastructure::api_clients::CoinGeckoClient;
use crate::infrastructure::chain::{ChainApiRegistry, ChainBalanceService, ConnectionRegistry, PalletXcmBuilder};
use crate::infrastructure::storage::{YieldDatabase, YieldPoolStore, YieldPositionStore};
use crate::infrastructure::yield_adapters::{AdapterContext, AdapterFactory};
use crate::shared::config::YieldConfig;
use crate::shared::types::{CurrentAccount, SubscriptionServiceType};

/// Everything the earning subsystem needs, wired from one config
pub struct App {
    config: YieldConfig,
    state: Arc<WalletState>,
    factory: Arc<AdapterFactory>,
    subscriptions: Arc<SubscriptionManager>,
    cron: CronManager,
}

impl App {
    pub fn build(config: YieldConfig) -> Result<Self> {
        let chains = config.chain_map();
        let assets = Arc::new(config.asset_map());

        // Substrate connections are registered by the embedding wallet; an empty
        // registry makes every adapter fall back to its unavailable stats.
        let apis = ChainApiRegistry::new();
        let ctx = AdapterContext {
            apis: apis.clone(),
            assets: Arc::clone(&assets),
            chains: Arc::new(chains.clone()),
            balance_service: Arc::new(ChainBalanceService::new(apis.clone(), Arc::clone(&assets))),
            xcm: Arc::new(PalletXcmBuilder::new(apis)),
        };
        let factory = Arc::new(AdapterFactory::new(ctx));

        let db = YieldDatabase::open(&config.storage.path)?;
        let state = Arc::new(WalletState::new(
            chains,
            config.current_account.clone().map(CurrentAccount::new),
        ));
        let addresses = Arc::new(StaticAddressResolver::new(config.accounts.clone()));

        let subscriptions = Arc::new(
            SubscriptionManager::new(
                Arc::clone(&factory),
                Arc::clone(&state),
                config.pools.iter().cloned().map(Arc::new).collect(),
                addresses.clone(),
                Duration::from_millis(config.earning.stat_refresh_interval_ms),
            )
            .with_stores(YieldPoolStore::new(db.clone()), YieldPositionStore::new(db)),
        );

        let connections = Arc::new(ConnectionRegistry::from_chains(
            &config.chains,
            Duration::from_millis(config.network.timeout_ms),
        ));
        let price = CoinGeckoClient::new(&config.price)?;

        let cron = CronManager::new(CronContext {
            state: Arc::clone(&state),
            connections,
            addresses,
            subscriptions: subscriptions.clone(),
            sources: CronSources {
                price: Some(Arc::new(price)),
                ..CronSources::default()
            },
        });

        Ok(Self {
            config,
            state,
            factory,
            subscriptions,
            cron,
        })
    }

    pub fn state(&self) -> &Arc<WalletState> {
        &self.state
    }

    pub fn factory(&self) -> &Arc<AdapterFactory> {
        &self.factory
    }

    pub async fn start(&mut self) {
        info!(
            "🚀 Starting yield services: {} chains, {} pools",
            self.config.chains.len(),
            self.config.pools.len()
        );

        self.subscriptions
            .start_service(SubscriptionServiceType::YieldPools, false)
            .await;
        self.subscriptions
            .start_service(SubscriptionServiceType::YieldPositions, true)
            .await;

        let services = self.config.cron.active_services.clone();
        self.cron
            .init(self.config.cron.intervals_ms.overrides(), &services)
            .await;
    }

    pub async fn shutdown(&mut self) {
        self.cron.shutdown().await;
        self.subscriptions.shutdown().await;
        info!("👋 Yield services stopped");
    }
}

/// Start every service and run until ctrl-c
pub async fn run(config: YieldConfig) -> Result<()> {
    let mut app = App::build(config)?;
    app.start().await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("⚠️ Failed to listen for shutdown signal: {}", e);
    }

    app.shutdown().await;
    Ok(())
}
