//! In-memory collaborators shared by unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

use crate::domain::execution::{ChainCall, ExecutionPlan};
use crate::domain::pool::{PoolInfo, PoolParams, PoolType};
use crate::infrastructure::chain::{
    BalanceService, BlockHeader, ChainConnection, FreeBalance, StorageSubscription, SubstrateApi,
    TransactionResponse, TransactionService, XcmBuilder, XcmRequest,
};
use crate::shared::errors::{AdapterError, ChainError, ExecutionError};
use crate::shared::subscription::SubscriptionHandle;
use crate::shared::types::{AssetInfoMap, Balance, ChainAsset, ChainInfo, ChainKind};

fn storage_key(pallet: &str, item: &str, keys: &[Value], at: Option<&str>) -> String {
    format!(
        "{}.{}{}@{}",
        pallet,
        item,
        serde_json::to_string(keys).unwrap_or_default(),
        at.unwrap_or("latest")
    )
}

pub struct FakeSubstrateApi {
    chain: String,
    pub header: Mutex<u64>,
    storage: Mutex<HashMap<String, Value>>,
    entries: Mutex<HashMap<String, Vec<(Value, Value)>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Vec<Option<Value>>>>>,
    pub subscribed_keys: Mutex<Vec<Vec<Value>>>,
    pub fail: AtomicBool,
    pub queries: AtomicUsize,
    pub fee: Balance,
}

impl FakeSubstrateApi {
    pub fn new(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            header: Mutex::new(0),
            storage: Mutex::new(HashMap::new()),
            entries: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            subscribed_keys: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
            fee: 1_000,
        }
    }

    pub fn set_header(&self, number: u64) {
        *self.header.lock().unwrap() = number;
    }

    pub fn set(&self, pallet: &str, item: &str, keys: &[Value], at: Option<&str>, value: Value) {
        self.storage
            .lock()
            .unwrap()
            .insert(storage_key(pallet, item, keys, at), value);
    }

    pub fn set_entries(&self, pallet: &str, item: &str, entries: Vec<(Value, Value)>) {
        self.entries
            .lock()
            .unwrap()
            .insert(format!("{}.{}", pallet, item), entries);
    }

    /// Push one emission to every live multi-subscription
    pub fn emit(&self, values: Vec<Option<Value>>) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(values.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn check(&self) -> Result<(), ChainError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(ChainError::Rpc("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubstrateApi for FakeSubstrateApi {
    fn chain(&self) -> &str {
        &self.chain
    }

    async fn ready(&self) -> Result<(), ChainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChainError::NotReady(self.chain.clone()));
        }
        Ok(())
    }

    async fn header(&self) -> Result<BlockHeader, ChainError> {
        self.check()?;
        Ok(BlockHeader {
            number: *self.header.lock().unwrap(),
        })
    }

    async fn block_hash(&self, number: u64) -> Result<String, ChainError> {
        self.check()?;
        Ok(format!("0x{:064x}", number))
    }

    async fn query(&self, pallet: &str, item: &str, keys: &[Value], at: Option<&str>) -> Result<Value, ChainError> {
        self.check()?;
        Ok(self
            .storage
            .lock()
            .unwrap()
            .get(&storage_key(pallet, item, keys, at))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn entries(&self, pallet: &str, item: &str) -> Result<Vec<(Value, Value)>, ChainError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&format!("{}.{}", pallet, item))
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe_multi(
        &self,
        _pallet: &str,
        _item: &str,
        keys: Vec<Vec<Value>>,
    ) -> Result<StorageSubscription, ChainError> {
        self.check()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        self.subscribed_keys.lock().unwrap().extend(keys);
        Ok(StorageSubscription {
            updates: rx,
            handle: SubscriptionHandle::noop(),
        })
    }

    async fn estimate_fee(&self, _call: &ChainCall, _address: &str) -> Result<Balance, ChainError> {
        self.check()?;
        Ok(self.fee)
    }
}

pub struct FakeConnection {
    slug: String,
    kind: ChainKind,
    pub connected: AtomicBool,
    pub listening: AtomicBool,
    pub recover_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl FakeConnection {
    pub fn new(slug: &str, kind: ChainKind, connected: bool) -> Self {
        Self {
            slug: slug.to_string(),
            kind,
            connected: AtomicBool::new(connected),
            listening: AtomicBool::new(connected),
            recover_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChainConnection for FakeConnection {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn kind(&self) -> ChainKind {
        self.kind
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn recover_connect(&self) {
        self.recover_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    async fn refresh(&self) {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeBalanceService {
    balances: Mutex<HashMap<(String, String), Balance>>,
}

impl FakeBalanceService {
    pub fn set(&self, address: &str, token: &str, value: Balance) {
        self.balances
            .lock()
            .unwrap()
            .insert((address.to_string(), token.to_string()), value);
    }
}

#[async_trait]
impl BalanceService for FakeBalanceService {
    async fn get_token_free_balance(&self, address: &str, _chain: &str, token_slug: &str) -> Result<FreeBalance, AdapterError> {
        let value = self
            .balances
            .lock()
            .unwrap()
            .get(&(address.to_string(), token_slug.to_string()))
            .copied()
            .unwrap_or(0);
        Ok(FreeBalance { value })
    }
}

/// Records submitted plans; optionally holds each submission until released
#[derive(Default)]
pub struct FakeTransactionService {
    pub plans: Mutex<Vec<ExecutionPlan>>,
    pub gate: Option<Arc<Notify>>,
}

impl FakeTransactionService {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            plans: Mutex::new(Vec::new()),
            gate: Some(gate),
        }
    }
}

#[async_trait]
impl TransactionService for FakeTransactionService {
    async fn handle_transaction(&self, plan: ExecutionPlan) -> Result<TransactionResponse, ExecutionError> {
        self.plans.lock().unwrap().push(plan);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(TransactionResponse {
            id: uuid::Uuid::new_v4().to_string(),
            extrinsic_hash: Some("0xabc".to_string()),
            errors: vec![],
        })
    }
}

pub struct FakeXcmBuilder {
    pub fee: Balance,
    pub requests: Mutex<Vec<XcmRequest>>,
}

impl FakeXcmBuilder {
    pub fn new(fee: Balance) -> Self {
        Self {
            fee,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl XcmBuilder for FakeXcmBuilder {
    async fn create_xcm_extrinsic(&self, request: &XcmRequest) -> Result<ChainCall, AdapterError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(ChainCall::new(
            &request.origin_chain,
            "xcmPallet",
            "limitedReserveTransferAssets",
            vec![json!(request.value.to_string())],
        ))
    }

    async fn estimate_fee(&self, _request: &XcmRequest) -> Result<Balance, AdapterError> {
        Ok(self.fee)
    }
}

pub fn chain(slug: &str, kind: ChainKind) -> ChainInfo {
    ChainInfo {
        slug: slug.to_string(),
        name: slug.to_string(),
        kind,
        rpc_url: format!("https://{}.example", slug),
        native_token_slug: format!("{}-NATIVE", slug),
        coingecko_key: Some(slug.to_string()),
        supports_bonding: true,
        active: true,
    }
}

pub fn asset(slug: &str, chain: &str, decimals: u8, asset_id: Option<&str>) -> ChainAsset {
    ChainAsset {
        slug: slug.to_string(),
        origin_chain: chain.to_string(),
        symbol: slug.to_string(),
        decimals,
        asset_id: asset_id.map(str::to_string),
    }
}

/// Parallel sDOT pool with its asset registry
pub fn parallel_pool() -> (PoolInfo, AssetInfoMap) {
    let pool = PoolInfo {
        slug: "DOT___liquid_staking___parallel".to_string(),
        chain: "parallel".to_string(),
        pool_type: PoolType::LiquidStaking,
        name: "Parallel Liquid Staking".to_string(),
        input_assets: vec!["parallel-LOCAL-DOT".to_string()],
        derivative_assets: vec!["parallel-LOCAL-sDOT".to_string()],
        reward_assets: vec!["parallel-LOCAL-DOT".to_string()],
        fee_assets: vec!["parallel-NATIVE-PARA".to_string()],
        params: PoolParams {
            origin_chain: Some("polkadot".to_string()),
            ..PoolParams::default()
        },
    };

    let assets = [
        asset("parallel-LOCAL-DOT", "parallel", 10, Some("101")),
        asset("parallel-LOCAL-sDOT", "parallel", 10, Some("1001")),
        asset("parallel-NATIVE-PARA", "parallel", 12, None),
        asset("polkadot-NATIVE-DOT", "polkadot", 10, None),
    ]
    .into_iter()
    .map(|a| (a.slug.clone(), a))
    .collect();

    (pool, assets)
}

pub fn simple_pool(slug: &str, chain: &str, pool_type: PoolType, token: &str) -> PoolInfo {
    PoolInfo {
        slug: slug.to_string(),
        chain: chain.to_string(),
        pool_type,
        name: slug.to_string(),
        input_assets: vec![token.to_string()],
        derivative_assets: vec![],
        reward_assets: vec![token.to_string()],
        fee_assets: vec![token.to_string()],
        params: PoolParams::default(),
    }
}
