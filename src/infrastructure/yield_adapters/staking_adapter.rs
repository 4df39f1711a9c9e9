//! Native staking, nomination pools and parachain delegation.
//!
//! Yield for these pools is not computed yet, so stats carry the sentinel
//! values. Joining, positions and lifecycle actions are fully supported.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::factory::AdapterContext;
use super::position_tracker::human_balance;
use super::traits::{unsupported, PositionSink, YieldProtocolAdapter};
use crate::domain::execution::{
    ActionRequest, ChainCall, ExecutionPlan, ExtrinsicType, OptimalYieldPathParams, StepSubmitData, TxData,
};
use crate::domain::path::{plan_join_path, JoinPathRequest, OptimalYieldPath, YieldFee, YieldStepType};
use crate::domain::pool::{PoolInfo, PoolStats, PoolType};
use crate::domain::position::{
    actions_by_type, PositionBalance, PositionInfo, PositionMetadata, UnlockingRequest, UnstakingStatus,
    YieldAction,
};
use crate::infrastructure::chain::{StorageSubscription, SubstrateApi};
use crate::shared::errors::{AdapterError, ChainError};
use crate::shared::subscription::SubscriptionHandle;
use crate::shared::types::Balance;
use crate::shared::utils::value_to_balance;

pub struct StakingPoolAdapter {
    pool_type: PoolType,
    ctx: AdapterContext,
}

impl StakingPoolAdapter {
    pub fn new(pool_type: PoolType, ctx: AdapterContext) -> Self {
        Self { pool_type, ctx }
    }

    fn stake_step(&self) -> (&'static str, ExtrinsicType) {
        match self.pool_type {
            PoolType::NominationPool => ("Join nomination pool", ExtrinsicType::StakingJoinPool),
            PoolType::ParachainStaking => ("Delegate to collator", ExtrinsicType::ParachainDelegate),
            _ => ("Nominate validators", ExtrinsicType::StakingBond),
        }
    }

    /// Storage item holding an address's stake
    fn ledger_item(&self) -> (&'static str, &'static str) {
        match self.pool_type {
            PoolType::NominationPool => ("nominationPools", "poolMembers"),
            PoolType::ParachainStaking => ("parachainStaking", "delegatorState"),
            _ => ("staking", "ledger"),
        }
    }

    async fn chain_min_join(&self, api: &Arc<dyn SubstrateApi>) -> Result<Balance, ChainError> {
        let (pallet, item) = match self.pool_type {
            PoolType::NominationPool => ("nominationPools", "minJoinBond"),
            PoolType::ParachainStaking => ("parachainStaking", "minDelegation"),
            _ => ("staking", "minNominatorBond"),
        };
        let raw = api.query(pallet, item, &[], None).await?;
        Ok(value_to_balance(&raw).unwrap_or(0))
    }

    async fn chain_tvl(&self, api: &Arc<dyn SubstrateApi>) -> Result<Balance, ChainError> {
        match self.pool_type {
            PoolType::NominationPool => {
                let pools = api.entries("nominationPools", "bondedPools").await?;
                Ok(pools
                    .iter()
                    .map(|(_, pool)| human_balance(pool.get("points")))
                    .fold(0, Balance::saturating_add))
            }
            PoolType::ParachainStaking => {
                let raw = api.query("parachainStaking", "total", &[], None).await?;
                Ok(value_to_balance(&raw).unwrap_or(0))
            }
            _ => {
                let era = current_era(api, self.pool_type).await?;
                let raw = api.query("staking", "erasTotalStake", &[json!(era)], None).await?;
                Ok(value_to_balance(&raw).unwrap_or(0))
            }
        }
    }

    async fn join_call(
        &self,
        api: &Arc<dyn SubstrateApi>,
        address: &str,
        request: &StepSubmitData,
    ) -> Result<ChainCall, AdapterError> {
        let amount = json!(request.amount().to_string());
        let (pallet, item) = self.ledger_item();
        let ledger = api.query(pallet, item, &[json!(address)], None).await?;
        let bonded = !ledger.is_null();

        match (self.pool_type, request) {
            (PoolType::NativeStaking, StepSubmitData::NativeStaking { validators, .. }) => {
                if bonded {
                    return Ok(api.tx("staking", "bondExtra", vec![amount]));
                }
                let bond = api.tx("staking", "bond", vec![amount, json!("Staked")]);
                let nominate = api.tx("staking", "nominate", vec![json!(validators)]);
                Ok(ChainCall::batch_all(api.chain(), vec![bond, nominate]))
            }
            (PoolType::NominationPool, StepSubmitData::NominationPool { pool_id, .. }) => {
                if bonded {
                    Ok(api.tx("nominationPools", "bondExtra", vec![json!({ "FreeBalance": request.amount().to_string() })]))
                } else {
                    Ok(api.tx("nominationPools", "join", vec![amount, json!(pool_id)]))
                }
            }
            (PoolType::ParachainStaking, StepSubmitData::ParachainStaking { collator, .. }) => {
                let delegations = ledger
                    .get("delegations")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let already_delegated = delegations
                    .iter()
                    .any(|d| d.get("owner").and_then(Value::as_str) == Some(collator.as_str()));

                if already_delegated {
                    return Ok(api.tx("parachainStaking", "delegatorBondMore", vec![json!(collator), amount]));
                }

                let candidate = api
                    .query("parachainStaking", "candidateInfo", &[json!(collator)], None)
                    .await?;
                let candidate_delegations = candidate.get("delegationCount").and_then(value_to_balance).unwrap_or(0);

                Ok(api.tx(
                    "parachainStaking",
                    "delegate",
                    vec![
                        json!(collator),
                        amount,
                        json!(candidate_delegations.to_string()),
                        json!(delegations.len()),
                    ],
                ))
            }
            (pool_type, other) => Err(AdapterError::InvalidPool(format!(
                "{} pools cannot be joined with {:?}",
                pool_type, other
            ))),
        }
    }
}

/// Active era for relay chain staking, current round for parachain staking
async fn current_era(api: &Arc<dyn SubstrateApi>, pool_type: PoolType) -> Result<u32, ChainError> {
    let (pallet, item, field) = match pool_type {
        PoolType::ParachainStaking => ("parachainStaking", "round", "current"),
        _ => ("staking", "activeEra", "index"),
    };
    let raw = api.query(pallet, item, &[], None).await?;
    let era = raw.get(field).and_then(value_to_balance).unwrap_or(0);
    Ok(u32::try_from(era).unwrap_or(u32::MAX))
}

fn unlocking_status(target_era: u32, current_era: u32) -> UnstakingStatus {
    if target_era <= current_era {
        UnstakingStatus::Withdrawable
    } else {
        UnstakingStatus::Unlocking
    }
}

/// Position from one ledger entry in the chain's human-readable form
pub fn decode_staking_position(
    pool: &PoolInfo,
    token_slug: &str,
    address: &str,
    entry: Option<&Value>,
    current_era: u32,
) -> PositionInfo {
    let mut position = PositionInfo::single(&pool.slug, &pool.chain, address, token_slug, 0);
    let Some(entry) = entry else {
        return position;
    };

    let (total, active, unstakings) = match pool.pool_type {
        PoolType::NominationPool => {
            let unstakings = entry
                .get("unbondingEras")
                .and_then(Value::as_object)
                .map(|eras| {
                    eras.iter()
                        .map(|(era, amount)| {
                            let era = parse_era(era);
                            UnlockingRequest {
                                slug: token_slug.to_string(),
                                amount: human_balance(Some(amount)),
                                status: unlocking_status(era, current_era),
                                target_era: Some(era),
                            }
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let active = human_balance(entry.get("points"));
            let unbonding: Balance = unstakings.iter().map(|u| u.amount).sum();
            (active.saturating_add(unbonding), active, unstakings)
        }
        PoolType::ParachainStaking => {
            let total = human_balance(entry.get("total"));
            let less = human_balance(entry.get("lessTotal"));
            let unstakings = if less > 0 {
                vec![UnlockingRequest {
                    slug: token_slug.to_string(),
                    amount: less,
                    status: UnstakingStatus::Unlocking,
                    target_era: None,
                }]
            } else {
                Vec::new()
            };
            (total, total.saturating_sub(less), unstakings)
        }
        _ => {
            let unstakings = entry
                .get("unlocking")
                .and_then(Value::as_array)
                .map(|chunks| {
                    chunks
                        .iter()
                        .map(|chunk| {
                            let era = chunk.get("era").map(era_value).unwrap_or(0);
                            UnlockingRequest {
                                slug: token_slug.to_string(),
                                amount: human_balance(chunk.get("value")),
                                status: unlocking_status(era, current_era),
                                target_era: Some(era),
                            }
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            (human_balance(entry.get("total")), human_balance(entry.get("active")), unstakings)
        }
    };

    position.balance = vec![PositionBalance {
        slug: token_slug.to_string(),
        total_balance: total,
        active_balance: active,
    }];
    position.metadata = PositionMetadata {
        rewards: Vec::new(),
        unstakings,
    };
    position
}

fn parse_era(raw: &str) -> u32 {
    raw.replace(',', "").parse().unwrap_or(0)
}

fn era_value(value: &Value) -> u32 {
    match value {
        Value::String(s) => parse_era(s),
        other => other.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
    }
}

#[async_trait]
impl YieldProtocolAdapter for StakingPoolAdapter {
    fn pool_type(&self) -> PoolType {
        self.pool_type
    }

    async fn fetch_stats(&self, pool: &PoolInfo) -> Result<PoolStats, AdapterError> {
        let mut stats = PoolStats::unavailable(pool.pool_type, pool.reward_asset(), pool.params.min_join_pool);
        stats.min_withdrawal = pool.params.min_withdrawal;

        let api = match self.ctx.apis.ready(&pool.chain).await {
            Ok(api) => api,
            Err(ChainError::ChainNotFound(chain)) => {
                debug!("No connection for {}, reporting configured stats for {}", chain, pool.slug);
                return Ok(stats);
            }
            Err(e) => return Err(e.into()),
        };

        let (min_join, tvl) = tokio::try_join!(self.chain_min_join(&api), self.chain_tvl(&api))?;
        if min_join > 0 {
            stats.min_join_pool = min_join;
        }
        stats.tvl = tvl;

        Ok(stats)
    }

    async fn track_positions(
        &self,
        addresses: &[String],
        pool: &PoolInfo,
        sink: PositionSink,
    ) -> Result<SubscriptionHandle, AdapterError> {
        let api = self.ctx.apis.ready(&pool.chain).await?;
        let (pallet, item) = self.ledger_item();
        let keys = addresses.iter().map(|a| vec![json!(a)]).collect();

        let StorageSubscription { mut updates, handle } = api.subscribe_multi(pallet, item, keys).await?;

        let addresses = addresses.to_vec();
        let pool = pool.clone();
        let pool_type = self.pool_type;
        let token_slug = pool.input_asset()?.to_string();

        let task = tokio::spawn(async move {
            let mut era = 0;
            while let Some(ledgers) = updates.recv().await {
                match current_era(&api, pool_type).await {
                    Ok(current) => era = current,
                    Err(e) => warn!("⚠️ Failed to read current era on {}: {}", pool.chain, e),
                }

                for (i, address) in addresses.iter().enumerate() {
                    let entry = ledgers.get(i).and_then(Option::as_ref);
                    let position = decode_staking_position(&pool, &token_slug, address, entry, era);
                    if sink.send(position).is_err() {
                        debug!("Position receiver for {} dropped", pool.slug);
                        return;
                    }
                }
            }
        });

        Ok(SubscriptionHandle::group(vec![handle, SubscriptionHandle::from_task(task)]))
    }

    async fn generate_path(&self, params: &OptimalYieldPathParams) -> Result<OptimalYieldPath, AdapterError> {
        let pool = &params.pool.pool;
        let input_slug = pool.input_asset()?;
        let local_balance = self
            .ctx
            .balance_service
            .get_token_free_balance(&params.address, &pool.chain, input_slug)
            .await?
            .value;

        let api = self.ctx.apis.ready(&pool.chain).await?;
        let (name, stake_type) = self.stake_step();
        let (pallet, _) = self.ledger_item();
        let probe = api.tx(pallet, "bond", vec![json!(params.amount.to_string())]);
        let fee = match api.estimate_fee(&probe, &params.address).await {
            Ok(fee) => fee,
            Err(e) => {
                warn!("⚠️ Fee estimation failed for {}: {}", pool.slug, e);
                0
            }
        };
        let fee_slug = pool.fee_asset().unwrap_or(input_slug);

        Ok(plan_join_path(JoinPathRequest {
            amount: params.amount,
            local_balance,
            xcm_fee: None,
            stake_name: name.to_string(),
            stake_type,
            stake_fee: YieldFee::new(fee_slug, fee),
        }))
    }

    async fn build_step(
        &self,
        address: &str,
        params: &OptimalYieldPathParams,
        path: &OptimalYieldPath,
        step_index: usize,
        request: &StepSubmitData,
    ) -> Result<ExecutionPlan, AdapterError> {
        let pool = &params.pool.pool;
        let step = path.step(step_index)?;

        let YieldStepType::Stake(extrinsic_type) = step.step_type else {
            return Err(AdapterError::InvalidStep(step_index));
        };

        let api = self.ctx.apis.ready(&pool.chain).await?;
        let operation = self.join_call(&api, address, request).await?;

        Ok(ExecutionPlan {
            target_chain: pool.chain.clone(),
            extrinsic_type,
            operation,
            tx_data: TxData::YieldStep(request.clone()),
            transfer_native_amount: 0,
        })
    }

    async fn build_action(
        &self,
        pool: &PoolInfo,
        action: YieldAction,
        request: &ActionRequest,
    ) -> Result<(ExtrinsicType, ChainCall), AdapterError> {
        if !actions_by_type(pool.pool_type).contains(&action) {
            return Err(unsupported(pool, action));
        }

        let api = self.ctx.apis.ready(&pool.chain).await?;
        let amount = json!(request.amount.to_string());

        match self.pool_type {
            PoolType::NominationPool => match action {
                YieldAction::Unstake => Ok((
                    ExtrinsicType::StakingLeavePool,
                    api.tx("nominationPools", "unbond", vec![json!(request.address), amount]),
                )),
                YieldAction::Withdraw => Ok((
                    ExtrinsicType::StakingPoolWithdraw,
                    api.tx("nominationPools", "withdrawUnbonded", vec![json!(request.address), json!(0)]),
                )),
                YieldAction::ClaimReward => Ok((
                    ExtrinsicType::StakingClaimReward,
                    api.tx("nominationPools", "claimPayout", vec![]),
                )),
                other => Err(unsupported(pool, other)),
            },
            PoolType::ParachainStaking => {
                let collator = request
                    .target
                    .as_deref()
                    .ok_or_else(|| AdapterError::InvalidPool(format!("{:?} on {} needs a collator", action, pool.slug)))?;

                match action {
                    YieldAction::Unstake => Ok((
                        ExtrinsicType::StakingUnbond,
                        api.tx("parachainStaking", "scheduleDelegatorBondLess", vec![json!(collator), amount]),
                    )),
                    YieldAction::CancelUnstake => Ok((
                        ExtrinsicType::StakingCancelUnstake,
                        api.tx("parachainStaking", "cancelDelegationRequest", vec![json!(collator)]),
                    )),
                    YieldAction::Withdraw => Ok((
                        ExtrinsicType::StakingWithdraw,
                        api.tx(
                            "parachainStaking",
                            "executeDelegationRequest",
                            vec![json!(request.address), json!(collator)],
                        ),
                    )),
                    other => Err(unsupported(pool, other)),
                }
            }
            _ => match action {
                YieldAction::Unstake => Ok((ExtrinsicType::StakingUnbond, api.tx("staking", "unbond", vec![amount]))),
                YieldAction::CancelUnstake => Ok((
                    ExtrinsicType::StakingCancelUnstake,
                    api.tx("staking", "rebond", vec![amount]),
                )),
                YieldAction::Withdraw => Ok((
                    ExtrinsicType::StakingWithdraw,
                    api.tx("staking", "withdrawUnbonded", vec![json!(0)]),
                )),
                other => Err(unsupported(pool, other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pool::{YieldPoolInfo, YieldRate, UNAVAILABLE_SENTINEL};
    use crate::testing::{asset, simple_pool, FakeSubstrateApi};

    fn adapter(pool_type: PoolType, api: Option<Arc<FakeSubstrateApi>>) -> StakingPoolAdapter {
        let mut ctx = AdapterContext::for_tests();
        if let Some(api) = api {
            ctx.apis.register(api);
        }
        ctx.assets = Arc::new(
            [asset("polkadot-NATIVE-DOT", "polkadot", 10, None)]
                .into_iter()
                .map(|a| (a.slug.clone(), a))
                .collect(),
        );
        StakingPoolAdapter::new(pool_type, ctx)
    }

    fn native_pool() -> PoolInfo {
        let mut pool = simple_pool("DOT___native_staking___polkadot", "polkadot", PoolType::NativeStaking, "polkadot-NATIVE-DOT");
        pool.params.min_join_pool = 1;
        pool
    }

    fn params(pool: PoolInfo, amount: Balance) -> OptimalYieldPathParams {
        OptimalYieldPathParams {
            address: "5Alice".to_string(),
            amount,
            pool: YieldPoolInfo::new(Arc::new(pool)),
        }
    }

    #[tokio::test]
    async fn test_stats_read_minimum_and_tvl_from_chain() {
        let api = Arc::new(FakeSubstrateApi::new("polkadot"));
        api.set("staking", "minNominatorBond", &[], None, json!("2,500,000,000,000"));
        api.set("staking", "activeEra", &[], None, json!({ "index": "1,200" }));
        api.set("staking", "erasTotalStake", &[json!(1200)], None, json!("0x0de0b6b3a7640000"));

        let stats = adapter(PoolType::NativeStaking, Some(api)).fetch_stats(&native_pool()).await.unwrap();

        assert!(!stats.is_available);
        assert_eq!(stats.yield_rate, YieldRate::Apy(UNAVAILABLE_SENTINEL));
        assert_eq!(stats.min_join_pool, 2_500_000_000_000);
        assert_eq!(stats.tvl, 1_000_000_000_000_000_000);
        assert!(stats.validate_for(PoolType::NativeStaking).is_ok());
    }

    #[tokio::test]
    async fn test_stats_without_connection_use_configuration() {
        let stats = adapter(PoolType::NativeStaking, None).fetch_stats(&native_pool()).await.unwrap();

        assert_eq!(stats.min_join_pool, 1);
        assert_eq!(stats.tvl, 0);
        assert_eq!(stats.asset_earning[0].rate, UNAVAILABLE_SENTINEL);
    }

    #[test]
    fn test_native_ledger_splits_withdrawable_chunks() {
        let pool = native_pool();
        let ledger = json!({
            "total": "3,000",
            "active": "1,000",
            "unlocking": [
                { "value": "1,500", "era": "98" },
                { "value": "500", "era": 120 }
            ]
        });

        let position = decode_staking_position(&pool, "polkadot-NATIVE-DOT", "5Alice", Some(&ledger), 100);

        assert_eq!(position.total_balance(), 3_000);
        assert_eq!(position.active_balance(), 1_000);
        assert_eq!(position.withdrawable_amount(), 1_500);
        assert!(position.has_pending_unlocking());
    }

    #[test]
    fn test_pool_member_counts_unbonding_in_total() {
        let pool = simple_pool("DOT___nomination_pool___polkadot", "polkadot", PoolType::NominationPool, "polkadot-NATIVE-DOT");
        let member = json!({ "poolId": 12, "points": "4,000", "unbondingEras": { "1,300": "600" } });

        let position = decode_staking_position(&pool, "polkadot-NATIVE-DOT", "5Alice", Some(&member), 1_301);

        assert_eq!(position.total_balance(), 4_600);
        assert_eq!(position.active_balance(), 4_000);
        assert_eq!(position.withdrawable_amount(), 600);
    }

    #[test]
    fn test_missing_ledger_is_empty_position() {
        let position = decode_staking_position(&native_pool(), "polkadot-NATIVE-DOT", "5Bob", None, 10);
        assert_eq!(position.total_balance(), 0);
        assert!(position.metadata.unstakings.is_empty());
    }

    #[tokio::test]
    async fn test_native_join_batches_bond_and_nominate() {
        let api = Arc::new(FakeSubstrateApi::new("polkadot"));
        let adapter = adapter(PoolType::NativeStaking, Some(api.clone()));
        let p = params(native_pool(), 100);
        let path = adapter.generate_path(&p).await.unwrap();
        let request = StepSubmitData::NativeStaking {
            amount: 100,
            validators: vec!["5Val".to_string()],
        };

        let plan = adapter.build_step("5Alice", &p, &path, 1, &request).await.unwrap();
        assert_eq!(plan.extrinsic_type, ExtrinsicType::StakingBond);
        assert!(plan.operation.is("utility", "batchAll"));

        api.set("staking", "ledger", &[json!("5Alice")], None, json!({ "active": "100" }));
        let plan = adapter.build_step("5Alice", &p, &path, 1, &request).await.unwrap();
        assert!(plan.operation.is("staking", "bondExtra"));
    }

    #[tokio::test]
    async fn test_join_rejects_default_step_and_mismatched_request() {
        let api = Arc::new(FakeSubstrateApi::new("polkadot"));
        let adapter = adapter(PoolType::NativeStaking, Some(api));
        let p = params(native_pool(), 100);
        let path = adapter.generate_path(&p).await.unwrap();

        assert!(matches!(
            adapter.build_step("5Alice", &p, &path, 0, &StepSubmitData::Yield { amount: 100 }).await,
            Err(AdapterError::InvalidStep(0))
        ));
        assert!(matches!(
            adapter.build_step("5Alice", &p, &path, 1, &StepSubmitData::Yield { amount: 100 }).await,
            Err(AdapterError::InvalidPool(_))
        ));
    }

    #[tokio::test]
    async fn test_actions_follow_pool_type() {
        let api = Arc::new(FakeSubstrateApi::new("polkadot"));
        let pool = simple_pool("DOT___nomination_pool___polkadot", "polkadot", PoolType::NominationPool, "polkadot-NATIVE-DOT");
        let adapter = adapter(PoolType::NominationPool, Some(api));
        let request = ActionRequest {
            address: "5Alice".to_string(),
            amount: 50,
            target: None,
        };

        let (extrinsic, call) = adapter.build_action(&pool, YieldAction::Unstake, &request).await.unwrap();
        assert_eq!(extrinsic, ExtrinsicType::StakingLeavePool);
        assert_eq!(call.args, vec![json!("5Alice"), json!("50")]);

        let (extrinsic, _) = adapter.build_action(&pool, YieldAction::ClaimReward, &request).await.unwrap();
        assert_eq!(extrinsic, ExtrinsicType::StakingClaimReward);

        assert!(matches!(
            adapter.build_action(&pool, YieldAction::CancelUnstake, &request).await,
            Err(AdapterError::UnsupportedAction { .. })
        ));
    }
}
