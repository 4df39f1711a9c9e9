//! Typed storage surface of a substrate chain connection

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::execution::ChainCall;
use crate::shared::errors::ChainError;
use crate::shared::subscription::SubscriptionHandle;
use crate::shared::types::Balance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
}

/// Live multi-key storage subscription.
///
/// Each emission carries one entry per requested key, in request order, in
/// the chain's human-readable form (`None` for missing entries).
pub struct StorageSubscription {
    pub updates: mpsc::UnboundedReceiver<Vec<Option<Value>>>,
    pub handle: SubscriptionHandle,
}

/// Storage reads, historical reads and call construction for one chain.
/// Protocol adapters do all chain I/O through this trait.
#[async_trait]
pub trait SubstrateApi: Send + Sync {
    fn chain(&self) -> &str;

    /// Resolves once the connection can serve queries
    async fn ready(&self) -> Result<(), ChainError>;

    async fn header(&self) -> Result<BlockHeader, ChainError>;

    async fn block_hash(&self, number: u64) -> Result<String, ChainError>;

    /// Read a storage item in primitive form, optionally at a historical block
    async fn query(
        &self,
        pallet: &str,
        item: &str,
        keys: &[Value],
        at: Option<&str>,
    ) -> Result<Value, ChainError>;

    /// Iterate a whole storage map
    async fn entries(&self, pallet: &str, item: &str) -> Result<Vec<(Value, Value)>, ChainError>;

    async fn subscribe_multi(
        &self,
        pallet: &str,
        item: &str,
        keys: Vec<Vec<Value>>,
    ) -> Result<StorageSubscription, ChainError>;

    async fn estimate_fee(&self, call: &ChainCall, address: &str) -> Result<Balance, ChainError>;

    fn tx(&self, pallet: &str, method: &str, args: Vec<Value>) -> ChainCall {
        ChainCall::new(self.chain(), pallet, method, args)
    }
}

/// Chain slug -> substrate connection
#[derive(Clone, Default)]
pub struct ChainApiRegistry {
    apis: HashMap<String, Arc<dyn SubstrateApi>>,
}

impl ChainApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, api: Arc<dyn SubstrateApi>) {
        self.apis.insert(api.chain().to_string(), api);
    }

    pub fn get(&self, chain: &str) -> Result<Arc<dyn SubstrateApi>, ChainError> {
        self.apis
            .get(chain)
            .cloned()
            .ok_or_else(|| ChainError::ChainNotFound(chain.to_string()))
    }

    /// Connection for `chain`, once it reports ready
    pub async fn ready(&self, chain: &str) -> Result<Arc<dyn SubstrateApi>, ChainError> {
        let api = self.get(chain)?;
        api.ready().await?;
        Ok(api)
    }

    pub fn chains(&self) -> impl Iterator<Item = &str> {
        self.apis.keys().map(String::as_str)
    }
}
