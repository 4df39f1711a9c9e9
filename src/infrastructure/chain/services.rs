//! Balance, transaction and cross-chain transfer collaborators

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::substrate_api::ChainApiRegistry;
use crate::domain::execution::{ChainCall, ExecutionPlan};
use crate::shared::errors::{AdapterError, ExecutionError};
use crate::shared::types::{AssetInfoMap, Balance, ChainAsset};
use crate::shared::utils::value_to_balance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeBalance {
    pub value: Balance,
}

#[async_trait]
pub trait BalanceService: Send + Sync {
    async fn get_token_free_balance(
        &self,
        address: &str,
        chain: &str,
        token_slug: &str,
    ) -> Result<FreeBalance, AdapterError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: String,
    #[serde(default)]
    pub extrinsic_hash: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl TransactionResponse {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Signs, broadcasts and tracks a plan
#[async_trait]
pub trait TransactionService: Send + Sync {
    async fn handle_transaction(&self, plan: ExecutionPlan) -> Result<TransactionResponse, ExecutionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct XcmRequest {
    pub origin_chain: String,
    pub destination_chain: String,
    pub origin_token: ChainAsset,
    pub destination_token: ChainAsset,
    pub recipient: String,
    pub value: Balance,
}

#[async_trait]
pub trait XcmBuilder: Send + Sync {
    async fn create_xcm_extrinsic(&self, request: &XcmRequest) -> Result<ChainCall, AdapterError>;

    async fn estimate_fee(&self, request: &XcmRequest) -> Result<Balance, AdapterError>;
}

/// Free balances read straight from `system.account` / `assets.account`
pub struct ChainBalanceService {
    apis: ChainApiRegistry,
    assets: Arc<AssetInfoMap>,
}

impl ChainBalanceService {
    pub fn new(apis: ChainApiRegistry, assets: Arc<AssetInfoMap>) -> Self {
        Self { apis, assets }
    }
}

#[async_trait]
impl BalanceService for ChainBalanceService {
    async fn get_token_free_balance(
        &self,
        address: &str,
        chain: &str,
        token_slug: &str,
    ) -> Result<FreeBalance, AdapterError> {
        let asset = self
            .assets
            .get(token_slug)
            .ok_or_else(|| AdapterError::AssetNotFound(token_slug.to_string()))?;
        let api = self.apis.ready(chain).await?;

        let value = match asset.on_chain_asset_id() {
            Some(asset_id) => {
                let account = api
                    .query("assets", "account", &[json!(asset_id), json!(address)], None)
                    .await?;
                account.get("balance").and_then(value_to_balance).unwrap_or(0)
            }
            None => {
                let account = api.query("system", "account", &[json!(address)], None).await?;
                account
                    .get("data")
                    .and_then(|d| d.get("free"))
                    .and_then(value_to_balance)
                    .unwrap_or(0)
            }
        };

        Ok(FreeBalance { value })
    }
}

/// Reserve transfers through the relay chain's `xcmPallet`
pub struct PalletXcmBuilder {
    apis: ChainApiRegistry,
    /// Parachain id per destination chain slug
    para_ids: std::collections::HashMap<String, u32>,
}

impl PalletXcmBuilder {
    pub fn new(apis: ChainApiRegistry) -> Self {
        Self {
            apis,
            para_ids: [("parallel".to_string(), 2012), ("moonbeam".to_string(), 2004)]
                .into_iter()
                .collect(),
        }
    }

    fn call_args(&self, request: &XcmRequest) -> Result<Vec<Value>, AdapterError> {
        let para_id = self
            .para_ids
            .get(&request.destination_chain)
            .ok_or_else(|| AdapterError::InvalidPool(format!("no parachain id for {}", request.destination_chain)))?;

        Ok(vec![
            json!({ "V3": { "parents": 0, "interior": { "X1": { "Parachain": para_id } } } }),
            json!({ "V3": { "parents": 0, "interior": { "X1": { "AccountId32": { "id": request.recipient } } } } }),
            json!({ "V3": [{ "id": { "Concrete": { "parents": 0, "interior": "Here" } }, "fun": { "Fungible": request.value.to_string() } }] }),
            json!(0),
            json!("Unlimited"),
        ])
    }
}

#[async_trait]
impl XcmBuilder for PalletXcmBuilder {
    async fn create_xcm_extrinsic(&self, request: &XcmRequest) -> Result<ChainCall, AdapterError> {
        let api = self.apis.ready(&request.origin_chain).await?;
        let args = self.call_args(request)?;
        Ok(api.tx("xcmPallet", "limitedReserveTransferAssets", args))
    }

    async fn estimate_fee(&self, request: &XcmRequest) -> Result<Balance, AdapterError> {
        let api = self.apis.ready(&request.origin_chain).await?;
        let call = api.tx("xcmPallet", "limitedReserveTransferAssets", self.call_args(request)?);
        Ok(api.estimate_fee(&call, &request.recipient).await?)
    }
}
