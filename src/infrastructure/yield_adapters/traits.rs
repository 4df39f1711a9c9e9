use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::poller::{Poller, PollerHandle};
use crate::domain::execution::{
    ActionRequest, ChainCall, ExecutionPlan, ExtrinsicType, OptimalYieldPathParams, StepSubmitData,
};
use crate::domain::path::OptimalYieldPath;
use crate::domain::pool::{PoolInfo, PoolStats, PoolType, YieldPoolInfo};
use crate::domain::position::{PositionInfo, YieldAction};
use crate::shared::errors::AdapterError;
use crate::shared::subscription::SubscriptionHandle;
use crate::shared::types::Balance;

pub type StatsSink = mpsc::UnboundedSender<YieldPoolInfo>;
pub type PositionSink = mpsc::UnboundedSender<PositionInfo>;

/// Trait for protocol-specific yield adapters
/// This provides a unified interface over staking, liquid staking and lending pools
#[async_trait]
pub trait YieldProtocolAdapter: Send + Sync {
    /// Get the pool type this adapter handles
    fn pool_type(&self) -> PoolType;

    /// Fetch stats for one pool once
    async fn fetch_stats(&self, pool: &PoolInfo) -> Result<PoolStats, AdapterError>;

    /// Subscribe to the position of every address; one record per address per emission
    async fn track_positions(
        &self,
        addresses: &[String],
        pool: &PoolInfo,
        sink: PositionSink,
    ) -> Result<SubscriptionHandle, AdapterError>;

    /// Ordered steps to join the pool with `params.amount`
    async fn generate_path(&self, params: &OptimalYieldPathParams) -> Result<OptimalYieldPath, AdapterError>;

    /// Build the operation for `path.steps[step_index]`
    async fn build_step(
        &self,
        address: &str,
        params: &OptimalYieldPathParams,
        path: &OptimalYieldPath,
        step_index: usize,
        request: &StepSubmitData,
    ) -> Result<ExecutionPlan, AdapterError>;

    /// Swap a derivative amount back to the origin token
    async fn build_redeem(
        &self,
        params: &OptimalYieldPathParams,
        _amount: Balance,
        _address: &str,
    ) -> Result<(ExtrinsicType, ChainCall), AdapterError> {
        Err(AdapterError::UnsupportedAction {
            pool: params.pool.slug().to_string(),
            action: "redeem".to_string(),
        })
    }

    /// Build a lifecycle action on an existing position
    async fn build_action(
        &self,
        pool: &PoolInfo,
        action: YieldAction,
        _request: &ActionRequest,
    ) -> Result<(ExtrinsicType, ChainCall), AdapterError> {
        Err(unsupported(pool, action))
    }
}

pub(crate) fn unsupported(pool: &PoolInfo, action: YieldAction) -> AdapterError {
    AdapterError::UnsupportedAction {
        pool: pool.slug.clone(),
        action: format!("{:?}", action),
    }
}

/// Poll `adapter` for `pool` stats: once now, then every `period`.
///
/// Failed or inconsistent fetches are logged and dropped; the timer keeps running.
pub fn subscribe_pool_stats(
    adapter: Arc<dyn YieldProtocolAdapter>,
    pool: Arc<PoolInfo>,
    period: Duration,
    sink: StatsSink,
) -> PollerHandle {
    let name = format!("stats:{}", pool.slug);

    Poller::spawn(name, period, true, move || {
        let adapter = Arc::clone(&adapter);
        let pool = Arc::clone(&pool);
        let sink = sink.clone();

        async move {
            let stats = adapter
                .fetch_stats(&pool)
                .await
                .and_then(|stats| stats.validate_for(pool.pool_type).map(|_| stats));

            match stats {
                Ok(stats) => {
                    if sink.send(YieldPoolInfo::with_stats(pool.clone(), stats)).is_err() {
                        debug!("Stats receiver for {} dropped", pool.slug);
                    }
                }
                Err(e) => warn!("⚠️ Failed to fetch stats for {}: {}", pool.slug, e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pool::{AssetEarning, YieldRate};
    use crate::testing::simple_pool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PERIOD: Duration = Duration::from_millis(100);

    /// Reports `yield_rate` on every fetch, failing the first `failures` calls
    struct ScriptedAdapter {
        pool_type: PoolType,
        yield_rate: YieldRate,
        failures: usize,
        calls: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn new(pool_type: PoolType, yield_rate: YieldRate, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                pool_type,
                yield_rate,
                failures,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl YieldProtocolAdapter for ScriptedAdapter {
        fn pool_type(&self) -> PoolType {
            self.pool_type
        }

        async fn fetch_stats(&self, pool: &PoolInfo) -> Result<PoolStats, AdapterError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(AdapterError::Collaborator("rpc timeout".to_string()));
            }
            Ok(PoolStats {
                tvl: 1_000,
                yield_rate: self.yield_rate,
                asset_earning: vec![AssetEarning {
                    slug: pool.input_assets[0].clone(),
                    rate: self.yield_rate.value(),
                    exchange_rate: 1.0,
                }],
                is_available: true,
                min_join_pool: 0,
                min_withdrawal: 0,
                max_candidate_per_farmer: 1,
                max_withdrawal_request_per_farmer: 1,
            })
        }

        async fn track_positions(
            &self,
            _addresses: &[String],
            _pool: &PoolInfo,
            _sink: PositionSink,
        ) -> Result<SubscriptionHandle, AdapterError> {
            Ok(SubscriptionHandle::noop())
        }

        async fn generate_path(&self, params: &OptimalYieldPathParams) -> Result<OptimalYieldPath, AdapterError> {
            Err(AdapterError::UnsupportedPool(params.pool.slug().to_string()))
        }

        async fn build_step(
            &self,
            _address: &str,
            _params: &OptimalYieldPathParams,
            _path: &OptimalYieldPath,
            step_index: usize,
            _request: &StepSubmitData,
        ) -> Result<ExecutionPlan, AdapterError> {
            Err(AdapterError::InvalidStep(step_index))
        }
    }

    fn lending_pool() -> Arc<PoolInfo> {
        Arc::new(simple_pool("xcDOT___lending___moonwell", "moonbeam", PoolType::Lending, "moonbeam-LOCAL-xcDOT"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_polling() {
        let adapter = ScriptedAdapter::new(PoolType::Lending, YieldRate::Apr(4.2), 1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = subscribe_pool_stats(adapter.clone(), lending_pool(), PERIOD, tx);

        tokio::time::sleep(PERIOD / 2).await;
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(PERIOD).await;
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
        let info = rx.try_recv().unwrap();
        assert_eq!(info.slug(), "xcDOT___lending___moonwell");
        assert_eq!(info.stats.unwrap().yield_rate, YieldRate::Apr(4.2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_rate_convention_never_reaches_sink() {
        let adapter = ScriptedAdapter::new(PoolType::Lending, YieldRate::Apy(4.2), 0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = subscribe_pool_stats(adapter.clone(), lending_pool(), PERIOD, tx);

        tokio::time::sleep(PERIOD * 3 + PERIOD / 2).await;
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 4);
        assert!(rx.try_recv().is_err());
    }
}
