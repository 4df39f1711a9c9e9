//! Balance subscriptions turned into per-address positions

use serde_json::{json, Value};
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

use super::traits::PositionSink;
use crate::domain::pool::PoolInfo;
use crate::domain::position::PositionInfo;
use crate::infrastructure::chain::{StorageSubscription, SubstrateApi};
use crate::shared::errors::AdapterError;
use crate::shared::subscription::SubscriptionHandle;
use crate::shared::types::{AssetInfoMap, Balance};
use crate::shared::utils::{parse_human_balance, value_to_balance};

/// Integer amount out of a human-readable field; missing or null reads as zero
pub fn human_balance(field: Option<&Value>) -> Balance {
    match field {
        Some(Value::String(raw)) => parse_human_balance(raw),
        Some(other) => value_to_balance(other).unwrap_or(0),
        None => 0,
    }
}

/// Track the pool's derivative (or input) token balance for every address.
///
/// Subscribes once to a batched multi-address query and emits one
/// `PositionInfo` per address on every balance-set emission.
pub async fn track_asset_positions(
    api: Arc<dyn SubstrateApi>,
    addresses: &[String],
    pool: &PoolInfo,
    assets: &AssetInfoMap,
    sink: PositionSink,
) -> Result<SubscriptionHandle, AdapterError> {
    let token_slug = pool.position_asset()?.to_string();
    let token = assets
        .get(&token_slug)
        .ok_or_else(|| AdapterError::AssetNotFound(token_slug.clone()))?;

    let asset_id = token.on_chain_asset_id().map(str::to_string);
    let (pallet, item, keys) = match &asset_id {
        Some(id) => (
            "assets",
            "account",
            addresses.iter().map(|a| vec![json!(id), json!(a)]).collect::<Vec<_>>(),
        ),
        None => (
            "system",
            "account",
            addresses.iter().map(|a| vec![json!(a)]).collect::<Vec<_>>(),
        ),
    };

    let StorageSubscription { updates, handle } = api.subscribe_multi(pallet, item, keys).await?;
    let mut updates = UnboundedReceiverStream::new(updates);

    let addresses = addresses.to_vec();
    let slug = pool.slug.clone();
    let chain = pool.chain.clone();
    let native = asset_id.is_none();

    let task = tokio::spawn(async move {
        while let Some(balances) = updates.next().await {
            for (i, address) in addresses.iter().enumerate() {
                let entry = balances.get(i).and_then(Option::as_ref);
                let field = if native {
                    entry.and_then(|v| v.get("data")).and_then(|d| d.get("free"))
                } else {
                    entry.and_then(|v| v.get("balance"))
                };

                let position = PositionInfo::single(&slug, &chain, address, &token_slug, human_balance(field));
                if sink.send(position).is_err() {
                    debug!("Position receiver for {} dropped", slug);
                    return;
                }
            }
        }
    });

    Ok(SubscriptionHandle::group(vec![handle, SubscriptionHandle::from_task(task)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{parallel_pool, FakeSubstrateApi};
    use tokio::sync::mpsc;

    #[test]
    fn test_human_balance() {
        assert_eq!(human_balance(Some(&json!("1,234,000"))), 1_234_000);
        assert_eq!(human_balance(Some(&json!(77))), 77);
        assert_eq!(human_balance(Some(&Value::Null)), 0);
        assert_eq!(human_balance(None), 0);
    }

    #[tokio::test]
    async fn test_emits_one_position_per_address() {
        let (pool, assets) = parallel_pool();
        let api = Arc::new(FakeSubstrateApi::new("parallel"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let addresses = vec!["5Alice".to_string(), "5Bob".to_string()];

        let _handle = track_asset_positions(api.clone(), &addresses, &pool, &assets, tx)
            .await
            .unwrap();

        assert_eq!(
            api.subscribed_keys.lock().unwrap()[0],
            vec![json!("1001"), json!("5Alice")]
        );

        api.emit(vec![Some(json!({ "balance": "12,500,000,000" })), None]);

        let alice = rx.recv().await.unwrap();
        assert_eq!(alice.address, "5Alice");
        assert_eq!(alice.balance[0].slug, "parallel-LOCAL-sDOT");
        assert_eq!(alice.total_balance(), 12_500_000_000);
        assert_eq!(alice.active_balance(), 12_500_000_000);

        let bob = rx.recv().await.unwrap();
        assert_eq!(bob.address, "5Bob");
        assert_eq!(bob.total_balance(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_emissions() {
        let (pool, assets) = parallel_pool();
        let api = Arc::new(FakeSubstrateApi::new("parallel"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handle = track_asset_positions(api.clone(), &["5Alice".to_string()], &pool, &assets, tx)
            .await
            .unwrap();
        handle.unsubscribe();
        tokio::task::yield_now().await;

        api.emit(vec![Some(json!({ "balance": "1" }))]);
        assert!(rx.recv().await.is_none());
    }
}
