//! Parallel liquid staking: DOT staked for sDOT on the Parallel parachain

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use super::factory::AdapterContext;
use super::position_tracker::track_asset_positions;
use super::traits::{unsupported, PositionSink, YieldProtocolAdapter};
use crate::domain::execution::{
    ActionRequest, ChainCall, ExecutionPlan, ExtrinsicType, OptimalYieldPathParams,
    RequestCrossChainTransfer, StepSubmitData, TxData,
};
use crate::domain::path::{plan_join_path, transfer_amount_for, JoinPathRequest, OptimalYieldPath, YieldFee, YieldStepType};
use crate::domain::pool::{AssetEarning, PoolInfo, PoolStats, PoolType, YieldRate};
use crate::domain::position::YieldAction;
use crate::infrastructure::chain::XcmRequest;
use crate::math::{
    annualized_yield_ms, convert_derivative_to_origin, from_fixed_point, min_output_amount,
    reference_block,
};
use crate::shared::errors::{AdapterError, ChainError};
use crate::shared::subscription::SubscriptionHandle;
use crate::shared::types::Balance;
use crate::shared::utils::{value_to_balance, value_to_f64};

/// Fixed-point scale of `liquidStaking.exchangeRate`
const EXCHANGE_RATE_DECIMALS: u32 = 18;
/// Days between the two exchange rate samples
const APY_WINDOW_DAYS: u64 = 14;
const MIN_JOIN_POOL: Balance = 10_000_000_000;
const MIN_WITHDRAWAL: Balance = 5_000_000_000;
const STAKE_STEP_NAME: &str = "Mint sDOT";

pub struct ParallelLiquidStakingAdapter {
    ctx: AdapterContext,
}

impl ParallelLiquidStakingAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    fn decode(item: &str, value: &serde_json::Value) -> ChainError {
        ChainError::Decode {
            item: item.to_string(),
            value: value.to_string(),
        }
    }

    /// Bridge request moving the origin chain's native token to the pool chain
    fn xcm_request(&self, pool: &PoolInfo, recipient: &str, value: Balance) -> Result<XcmRequest, AdapterError> {
        let origin_chain = pool
            .params
            .origin_chain
            .as_deref()
            .ok_or_else(|| AdapterError::InvalidPool(format!("{} has no origin chain", pool.slug)))?;
        let origin_chain_info = self.ctx.chain(origin_chain)?;
        let origin_token = self.ctx.asset(&origin_chain_info.native_token_slug)?.clone();
        let destination_token = self.ctx.asset(pool.input_asset()?)?.clone();

        Ok(XcmRequest {
            origin_chain: origin_chain.to_string(),
            destination_chain: destination_token.origin_chain.clone(),
            origin_token,
            destination_token,
            recipient: recipient.to_string(),
            value,
        })
    }

    async fn local_input_balance(&self, pool: &PoolInfo, address: &str) -> Result<Balance, AdapterError> {
        let input_slug = pool.input_asset()?;
        let input_token = self.ctx.asset(input_slug)?;
        let balance = self
            .ctx
            .balance_service
            .get_token_free_balance(address, &input_token.origin_chain, input_slug)
            .await?;
        Ok(balance.value)
    }
}

#[async_trait]
impl YieldProtocolAdapter for ParallelLiquidStakingAdapter {
    fn pool_type(&self) -> PoolType {
        PoolType::LiquidStaking
    }

    async fn fetch_stats(&self, pool: &PoolInfo) -> Result<PoolStats, AdapterError> {
        let api = self.ctx.apis.ready(&pool.chain).await?;

        let (raw_rate, header, raw_now, ledgers) = tokio::try_join!(
            api.query("liquidStaking", "exchangeRate", &[], None),
            api.header(),
            api.query("timestamp", "now", &[], None),
            api.entries("liquidStaking", "stakingLedgers"),
        )?;

        let tvl = ledgers
            .iter()
            .filter_map(|(_, ledger)| ledger.get("total").and_then(value_to_balance))
            .fold(0 as Balance, Balance::saturating_add);

        let exchange_rate = value_to_f64(&raw_rate).ok_or_else(|| Self::decode("exchangeRate", &raw_rate))?;
        let current_ts = value_to_balance(&raw_now).ok_or_else(|| Self::decode("timestamp", &raw_now))? as u64;

        let begin_block = reference_block(header.number, pool.params.block_time_secs, APY_WINDOW_DAYS);
        let begin_hash = api.block_hash(begin_block).await?;

        let (raw_begin_now, raw_begin_rate) = tokio::try_join!(
            api.query("timestamp", "now", &[], Some(&begin_hash)),
            api.query("liquidStaking", "exchangeRate", &[], Some(&begin_hash)),
        )?;
        let begin_ts = value_to_balance(&raw_begin_now).ok_or_else(|| Self::decode("timestamp", &raw_begin_now))? as u64;
        let begin_rate = value_to_f64(&raw_begin_rate).ok_or_else(|| Self::decode("exchangeRate", &raw_begin_rate))?;

        let apy = annualized_yield_ms(begin_rate, exchange_rate, begin_ts, current_ts)
            .map_err(|e| AdapterError::InconsistentStats(e.to_string()))?;
        let apy_percent = apy * 100.0;

        debug!(
            "{} apy {:.4}% over blocks {}..{}, tvl {}",
            pool.slug, apy_percent, begin_block, header.number, tvl
        );

        Ok(PoolStats {
            tvl,
            yield_rate: YieldRate::Apy(apy_percent),
            asset_earning: vec![AssetEarning {
                slug: pool.reward_asset().to_string(),
                rate: apy_percent,
                exchange_rate: from_fixed_point(exchange_rate, EXCHANGE_RATE_DECIMALS),
            }],
            is_available: true,
            min_join_pool: MIN_JOIN_POOL,
            min_withdrawal: MIN_WITHDRAWAL,
            max_candidate_per_farmer: 1,
            max_withdrawal_request_per_farmer: 1,
        })
    }

    async fn track_positions(
        &self,
        addresses: &[String],
        pool: &PoolInfo,
        sink: PositionSink,
    ) -> Result<SubscriptionHandle, AdapterError> {
        let api = self.ctx.apis.ready(&pool.chain).await?;
        track_asset_positions(api, addresses, pool, &self.ctx.assets, sink).await
    }

    async fn generate_path(&self, params: &OptimalYieldPathParams) -> Result<OptimalYieldPath, AdapterError> {
        let pool = &params.pool.pool;
        let local_balance = self.local_input_balance(pool, &params.address).await?;

        let xcm_fee = if local_balance < params.amount && pool.params.origin_chain.is_some() {
            let request = self.xcm_request(pool, &params.address, params.amount)?;
            let fee = self.ctx.xcm.estimate_fee(&request).await?;
            Some(YieldFee::new(&request.origin_token.slug, fee))
        } else {
            None
        };

        let api = self.ctx.apis.ready(&pool.chain).await?;
        let stake_call = api.tx("liquidStaking", "stake", vec![json!(params.amount.to_string())]);
        let stake_fee = match api.estimate_fee(&stake_call, &params.address).await {
            Ok(fee) => fee,
            Err(e) => {
                warn!("⚠️ Fee estimation failed for {}: {}", pool.slug, e);
                0
            }
        };
        let fee_slug = match pool.fee_asset() {
            Some(slug) => slug.to_string(),
            None => self.ctx.chain(&pool.chain)?.native_token_slug.clone(),
        };

        Ok(plan_join_path(JoinPathRequest {
            amount: params.amount,
            local_balance,
            xcm_fee,
            stake_name: STAKE_STEP_NAME.to_string(),
            stake_type: ExtrinsicType::MintSdot,
            stake_fee: YieldFee::new(&fee_slug, stake_fee),
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

        match step.step_type {
            YieldStepType::Xcm => {
                let input_balance = self.local_input_balance(pool, &params.address).await?;
                let amount = transfer_amount_for(path, step_index, request.amount(), input_balance);
                let xcm = self.xcm_request(pool, address, amount)?;
                let operation = self.ctx.xcm.create_xcm_extrinsic(&xcm).await?;

                info!("🌉 Transfer {} {} from {} to {}", amount, xcm.origin_token.slug, xcm.origin_chain, xcm.destination_chain);

                Ok(ExecutionPlan {
                    target_chain: xcm.origin_chain.clone(),
                    extrinsic_type: ExtrinsicType::TransferXcm,
                    operation,
                    tx_data: TxData::CrossChainTransfer(RequestCrossChainTransfer {
                        origin_network_key: xcm.origin_chain.clone(),
                        destination_network_key: xcm.destination_chain.clone(),
                        from: address.to_string(),
                        to: address.to_string(),
                        value: amount,
                        token_slug: xcm.origin_token.slug.clone(),
                        show_extra_warning: true,
                    }),
                    transfer_native_amount: amount,
                })
            }
            YieldStepType::Stake(_) => {
                let api = self.ctx.apis.ready(&pool.chain).await?;
                let operation = api.tx("liquidStaking", "stake", vec![json!(request.amount().to_string())]);

                Ok(ExecutionPlan {
                    target_chain: pool.chain.clone(),
                    extrinsic_type: ExtrinsicType::MintSdot,
                    operation,
                    tx_data: TxData::YieldStep(request.clone()),
                    transfer_native_amount: 0,
                })
            }
            YieldStepType::Default => Err(AdapterError::InvalidStep(step_index)),
        }
    }

    async fn build_redeem(
        &self,
        params: &OptimalYieldPathParams,
        amount: Balance,
        _address: &str,
    ) -> Result<(ExtrinsicType, ChainCall), AdapterError> {
        let pool = &params.pool.pool;
        let derivative_slug = pool
            .derivative_asset()
            .ok_or_else(|| AdapterError::InvalidPool(format!("{} has no derivative asset", pool.slug)))?;
        let derivative = self.ctx.asset(derivative_slug)?;
        let origin = self.ctx.asset(pool.input_asset()?)?;

        let exchange_rate = params
            .pool
            .stats
            .as_ref()
            .and_then(|s| s.exchange_rate())
            .ok_or_else(|| AdapterError::InconsistentStats(format!("{} has no exchange rate yet", pool.slug)))?;

        let converted = convert_derivative_to_origin(amount, exchange_rate, derivative.decimals, origin.decimals);
        let min_amount = min_output_amount(converted, pool.params.min_amount_percent);

        let route = [derivative, origin]
            .iter()
            .map(|asset| {
                asset
                    .on_chain_asset_id()
                    .map(|id| json!(id))
                    .ok_or_else(|| AdapterError::InvalidPool(format!("{} has no asset id", asset.slug)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let api = self.ctx.apis.ready(&pool.chain).await?;
        let operation = api.tx(
            "ammRoute",
            "swapExactTokensForTokens",
            vec![json!(route), json!(amount.to_string()), json!(min_amount.to_string())],
        );

        Ok((ExtrinsicType::RedeemSdot, operation))
    }

    async fn build_action(
        &self,
        pool: &PoolInfo,
        action: YieldAction,
        request: &ActionRequest,
    ) -> Result<(ExtrinsicType, ChainCall), AdapterError> {
        let api = self.ctx.apis.ready(&pool.chain).await?;

        match action {
            YieldAction::Unstake => Ok((
                ExtrinsicType::LiquidUnstake,
                api.tx("liquidStaking", "unstake", vec![json!(request.amount.to_string())]),
            )),
            YieldAction::Withdraw => Ok((
                ExtrinsicType::LiquidClaim,
                api.tx("liquidStaking", "claimFor", vec![json!(request.address)]),
            )),
            other => Err(unsupported(pool, other)),
        }
    }
}
