//! Bodies of the periodic wallet jobs. Every job logs its own failures.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::sources::{HistorySource, NftSource, PriceSource, StakingRewardSource, UnlockingSource};
use super::state::WalletState;
use super::subscription_manager::SubscriptionServices;
use crate::domain::wallet::{NetworkStatus, NftTransferMeta, StakeUnlockingSnapshot};
use crate::infrastructure::chain::ConnectionRegistry;
use crate::shared::types::{ChainInfo, ChainKind, CurrentAccount};
use crate::shared::utils::is_ethereum_address;

fn address_kind(address: &str) -> ChainKind {
    if is_ethereum_address(address) {
        ChainKind::Evm
    } else {
        ChainKind::Substrate
    }
}

fn active_chains(chains: impl IntoIterator<Item = ChainInfo>) -> Vec<ChainInfo> {
    let mut active: Vec<_> = chains.into_iter().filter(|c| c.active).collect();
    active.sort_by(|a, b| a.slug.cmp(&b.slug));
    active
}

pub async fn refresh_price(state: &WalletState, source: &dyn PriceSource) {
    let mut ids: Vec<String> = state
        .chains()
        .await
        .into_values()
        .filter_map(|c| c.coingecko_key)
        .collect();
    ids.sort();
    ids.dedup();

    match source.get_prices(&ids).await {
        Ok(prices) => {
            debug!("💰 Updated {} prices", prices.len());
            state.set_prices(prices).await;
        }
        Err(e) => warn!("⚠️ Failed to refresh prices: {}", e),
    }
}

/// NFT refresh, coordinated with user-initiated transfers.
///
/// A forced update that the cron has not acknowledged yet is acknowledged and
/// the fetch skipped; the next tick clears both flags and fetches again.
pub async fn refresh_nft(state: &WalletState, source: &dyn NftSource, account: &CurrentAccount, addresses: &[String]) {
    let meta = state.nft_transfer_meta().await;
    if meta.force_update && !meta.cron_update {
        state
            .set_nft_transfer_meta(NftTransferMeta {
                cron_update: true,
                ..meta
            })
            .await;
        debug!("NFT refresh skipped while a transfer is settling");
        return;
    }

    state
        .set_nft_transfer_meta(NftTransferMeta {
            cron_update: false,
            force_update: false,
            selected_collection: meta.selected_collection,
        })
        .await;

    match source.fetch_nfts(addresses).await {
        Ok(batch) => {
            debug!("🖼️ {} NFTs in {} collections", batch.items.len(), batch.collections.len());
            state.set_nfts(&account.address, batch).await;
        }
        Err(e) => warn!("⚠️ Failed to refresh NFTs for {}: {}", account.address, e),
    }
}

pub async fn refresh_staking_reward(state: &WalletState, source: &dyn StakingRewardSource, addresses: &[String]) {
    let chains = active_chains(state.chains().await.into_values());

    match source.get_staking_rewards(addresses, &chains).await {
        Ok(rewards) => state.set_staking_rewards(rewards).await,
        Err(e) => warn!("⚠️ Failed to refresh staking rewards: {}", e),
    }
}

/// Unlocking schedule for every network the first resolved address has stake on
pub async fn refresh_unlocking_info(state: &WalletState, source: &dyn UnlockingSource, addresses: &[String]) {
    let Some(address) = addresses.first() else {
        debug!("No address to read unlocking info for");
        return;
    };

    let kind = address_kind(address);
    let mut details = HashMap::new();

    for chain in active_chains(state.chains().await.into_values()) {
        if !chain.supports_bonding || chain.kind != kind {
            continue;
        }
        if state.staked_balance(address, &chain.slug).await == 0 {
            continue;
        }

        match source.get_unlocking_info(address, &chain).await {
            Ok(info) => {
                details.insert(chain.slug.clone(), info);
            }
            Err(e) => warn!("⚠️ Failed to read unlocking info on {}: {}", chain.slug, e),
        }
    }

    state
        .set_unlocking_info(StakeUnlockingSnapshot {
            timestamp: Utc::now(),
            details,
        })
        .await;
}

pub async fn refresh_history(state: &WalletState, source: &dyn HistorySource, addresses: &[String]) {
    let chains = active_chains(state.chains().await.into_values());

    for address in addresses {
        let kind = address_kind(address);
        let mut items = Vec::new();

        for chain in chains.iter().filter(|c| c.kind == kind) {
            match source.fetch_history(address, chain).await {
                Ok(mut fetched) => items.append(&mut fetched),
                Err(e) => warn!("⚠️ Failed to fetch history for {} on {}: {}", address, chain.slug, e),
            }
        }

        items.sort_by(|a, b| b.time.cmp(&a.time));
        state.set_history(address, items).await;
    }
}

/// Reconnect dropped substrate connections and refresh dead EVM ones.
/// Subscription services are restarted when anything was recovered.
pub async fn recover_api_map(connections: &ConnectionRegistry, subscriptions: &dyn SubscriptionServices) {
    let mut recovered = false;

    for connection in connections.substrate() {
        if !connection.is_connected() {
            info!("🔄 Reconnecting {}", connection.slug());
            connection.recover_connect().await;
            recovered = true;
        }
    }

    let probes = join_all(connections.evm().map(|connection| async move {
        if connection.is_listening().await {
            false
        } else {
            info!("🔄 Refreshing EVM provider {}", connection.slug());
            connection.refresh().await;
            true
        }
    }))
    .await;
    recovered |= probes.into_iter().any(|refreshed| refreshed);

    if recovered {
        subscriptions.restart_active_services().await;
    }
}

pub async fn check_api_map_status(state: &WalletState, connections: &ConnectionRegistry) {
    for connection in connections.substrate() {
        let status = if connection.is_connected() {
            NetworkStatus::Connected
        } else {
            NetworkStatus::Connecting
        };
        if state.set_network_status(connection.slug(), status).await {
            debug!("{} is now {:?}", connection.slug(), status);
        }
    }

    let evm: Vec<_> = connections.evm().collect();
    let probes = join_all(evm.iter().map(|connection| connection.is_listening())).await;

    for (connection, listening) in evm.into_iter().zip(probes) {
        let status = if listening {
            NetworkStatus::Connected
        } else {
            NetworkStatus::Connecting
        };
        if state.set_network_status(connection.slug(), status).await {
            debug!("{} is now {:?}", connection.slug(), status);
        }
    }
}
