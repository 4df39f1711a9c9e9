//! Builds and submits the operation for one step of a yield path

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

use crate::domain::execution::{
    ActionRequest, ExecutionPlan, OptimalYieldPathParams, StepSubmitData, TransactionValidator, TxData,
};
use crate::domain::path::OptimalYieldPath;
use crate::domain::pool::{PoolInfo, YieldPoolInfo};
use crate::domain::position::{available_actions, PositionInfo, YieldAction};
use crate::infrastructure::chain::{TransactionResponse, TransactionService};
use crate::infrastructure::yield_adapters::AdapterFactory;
use crate::shared::errors::{ExecutionError, ValidationError};
use crate::shared::types::Balance;
use crate::shared::utils::generate_id;

type StepKey = (String, String, usize);

/// Removes its key from the in-flight set when dropped
struct InFlightStep {
    key: StepKey,
    set: Arc<Mutex<HashSet<StepKey>>>,
}

impl Drop for InFlightStep {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

pub struct StepExecutor {
    factory: Arc<AdapterFactory>,
    transactions: Arc<dyn TransactionService>,
    in_flight: Arc<Mutex<HashSet<StepKey>>>,
}

impl StepExecutor {
    pub fn new(factory: Arc<AdapterFactory>, transactions: Arc<dyn TransactionService>) -> Self {
        Self {
            factory,
            transactions,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn acquire(&self, key: StepKey) -> Result<InFlightStep, ExecutionError> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(key.clone()) {
            return Err(ExecutionError::Validation(vec![ValidationError::StepInFlight]));
        }
        Ok(InFlightStep {
            key,
            set: Arc::clone(&self.in_flight),
        })
    }

    pub async fn generate_path(&self, params: &OptimalYieldPathParams) -> Result<OptimalYieldPath, ExecutionError> {
        let adapter = self.factory.create_adapter(params.pool.pool.pool_type);
        Ok(adapter.generate_path(params).await?)
    }

    /// Problems with joining at `step_index`; empty when the step can be submitted
    pub fn validate(
        &self,
        params: &OptimalYieldPathParams,
        path: &OptimalYieldPath,
        step_index: usize,
        available: Balance,
    ) -> Vec<ValidationError> {
        TransactionValidator::validate_join(params, path, step_index, available)
    }

    /// Problems with unstaking `amount` out of `position`
    pub fn validate_unstake(&self, pool: &YieldPoolInfo, position: &PositionInfo, amount: Balance) -> Vec<ValidationError> {
        let min_withdrawal = pool
            .stats
            .as_ref()
            .map(|s| s.min_withdrawal)
            .unwrap_or(pool.pool.params.min_withdrawal);
        TransactionValidator::validate_exit(amount, position.active_balance(), min_withdrawal)
    }

    pub fn actions_for(&self, pool: &PoolInfo, position: &PositionInfo) -> Vec<YieldAction> {
        available_actions(position, pool.pool_type, position.pending_reward())
    }

    pub async fn build_extrinsic(
        &self,
        address: &str,
        params: &OptimalYieldPathParams,
        path: &OptimalYieldPath,
        step_index: usize,
        request: &StepSubmitData,
    ) -> Result<ExecutionPlan, ExecutionError> {
        let adapter = self.factory.create_adapter(params.pool.pool.pool_type);
        Ok(adapter.build_step(address, params, path, step_index, request).await?)
    }

    /// Build the step's plan and hand it to the transaction service.
    ///
    /// Only one submission per (address, pool, step) may be in flight.
    pub async fn submit(
        &self,
        address: &str,
        params: &OptimalYieldPathParams,
        path: &OptimalYieldPath,
        step_index: usize,
        request: &StepSubmitData,
    ) -> Result<TransactionResponse, ExecutionError> {
        let _guard = self.acquire((address.to_string(), params.pool.slug().to_string(), step_index))?;

        let plan = self.build_extrinsic(address, params, path, step_index, request).await?;
        let request_id = generate_id();
        info!(
            "🚀 [{}] Submitting {:?} on {} for {}",
            request_id,
            plan.extrinsic_type,
            plan.target_chain,
            params.pool.slug()
        );

        let response = self.transactions.handle_transaction(plan).await?;
        if !response.is_success() {
            warn!("⚠️ [{}] Step {} of {} failed: {:?}", request_id, step_index, params.pool.slug(), response.errors);
        }
        Ok(response)
    }

    /// Swap a derivative position back to the input token
    pub async fn build_redeem(
        &self,
        params: &OptimalYieldPathParams,
        amount: Balance,
        address: &str,
    ) -> Result<ExecutionPlan, ExecutionError> {
        let adapter = self.factory.create_adapter(params.pool.pool.pool_type);
        let (extrinsic_type, operation) = adapter.build_redeem(params, amount, address).await?;

        Ok(ExecutionPlan {
            target_chain: params.pool.pool.chain.clone(),
            extrinsic_type,
            operation,
            tx_data: TxData::Action(ActionRequest {
                address: address.to_string(),
                amount,
                target: None,
            }),
            transfer_native_amount: 0,
        })
    }

    pub async fn build_action(
        &self,
        pool: &PoolInfo,
        action: YieldAction,
        request: &ActionRequest,
    ) -> Result<ExecutionPlan, ExecutionError> {
        let adapter = self.factory.create_adapter(pool.pool_type);
        let (extrinsic_type, operation) = adapter.build_action(pool, action, request).await?;

        Ok(ExecutionPlan {
            target_chain: pool.chain.clone(),
            extrinsic_type,
            operation,
            tx_data: TxData::Action(request.clone()),
            transfer_native_amount: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExtrinsicType;
    use crate::domain::pool::{PoolType, YieldPoolInfo};
    use crate::infrastructure::yield_adapters::AdapterContext;
    use crate::testing::{asset, simple_pool, FakeSubstrateApi, FakeTransactionService};
    use tokio::sync::Notify;

    struct Fixture {
        executor: Arc<StepExecutor>,
        transactions: Arc<FakeTransactionService>,
        gate: Arc<Notify>,
        params: OptimalYieldPathParams,
    }

    fn fixture() -> Fixture {
        let mut ctx = AdapterContext::for_tests();
        ctx.apis.register(Arc::new(FakeSubstrateApi::new("polkadot")));
        ctx.assets = Arc::new(
            [asset("polkadot-NATIVE-DOT", "polkadot", 10, None)]
                .into_iter()
                .map(|a| (a.slug.clone(), a))
                .collect(),
        );

        let gate = Arc::new(Notify::new());
        let transactions = Arc::new(FakeTransactionService::gated(gate.clone()));
        let executor = Arc::new(StepExecutor::new(Arc::new(AdapterFactory::new(ctx)), transactions.clone()));
        let pool = simple_pool("DOT___nomination_pool___polkadot", "polkadot", PoolType::NominationPool, "polkadot-NATIVE-DOT");

        Fixture {
            executor,
            transactions,
            gate,
            params: OptimalYieldPathParams {
                address: "5Alice".to_string(),
                amount: 100,
                pool: YieldPoolInfo::new(Arc::new(pool)),
            },
        }
    }

    #[tokio::test]
    async fn test_second_submission_of_same_step_is_rejected() {
        let f = fixture();
        let path = f.executor.generate_path(&f.params).await.unwrap();
        let request = StepSubmitData::NominationPool { amount: 100, pool_id: 7 };

        let first = {
            let (executor, params, path, request) = (f.executor.clone(), f.params.clone(), path.clone(), request.clone());
            tokio::spawn(async move { executor.submit("5Alice", &params, &path, 1, &request).await })
        };
        while f.transactions.plans.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        let second = f.executor.submit("5Alice", &f.params, &path, 1, &request).await;
        assert!(matches!(
            second,
            Err(ExecutionError::Validation(ref errors)) if errors == &vec![ValidationError::StepInFlight]
        ));

        f.gate.notify_one();
        let response = first.await.unwrap().unwrap();
        assert!(response.is_success());

        let plan = &f.transactions.plans.lock().unwrap()[0];
        assert_eq!(plan.extrinsic_type, ExtrinsicType::StakingJoinPool);
        assert!(plan.operation.is("nominationPools", "join"));
    }

    #[tokio::test]
    async fn test_guard_released_after_response() {
        let f = fixture();
        let path = f.executor.generate_path(&f.params).await.unwrap();
        let request = StepSubmitData::NominationPool { amount: 100, pool_id: 7 };

        f.gate.notify_one();
        f.executor.submit("5Alice", &f.params, &path, 1, &request).await.unwrap();
        f.gate.notify_one();
        assert!(f.executor.submit("5Alice", &f.params, &path, 1, &request).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_build_releases_guard() {
        let f = fixture();
        let path = f.executor.generate_path(&f.params).await.unwrap();

        assert!(f.executor.submit("5Alice", &f.params, &path, 9, &StepSubmitData::Yield { amount: 1 }).await.is_err());
        assert!(f.executor.in_flight.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unstake_checks_active_balance() {
        let f = fixture();
        let position = PositionInfo::single(f.params.pool.slug(), "polkadot", "5Alice", "polkadot-NATIVE-DOT", 500);

        assert!(f.executor.validate_unstake(&f.params.pool, &position, 200).is_empty());
        assert_eq!(
            f.executor.validate_unstake(&f.params.pool, &position, 800),
            vec![ValidationError::InsufficientBalance { available: 500, required: 800 }]
        );
        assert!(f.executor.actions_for(&f.params.pool.pool, &position).contains(&YieldAction::Unstake));
    }

    #[tokio::test]
    async fn test_validate_reports_minimum() {
        let f = fixture();
        let mut params = f.params.clone();
        params.pool.pool = Arc::new({
            let mut pool = (*params.pool.pool).clone();
            pool.params.min_join_pool = 1_000;
            pool
        });
        let path = f.executor.generate_path(&params).await.unwrap();

        let errors = f.executor.validate(&params, &path, 1, 10_000);
        assert!(errors.contains(&ValidationError::BelowMinimum { amount: 100, minimum: 1_000 }));
    }
}
