//! Plans produced by the step builders

use serde::{Deserialize, Serialize};

use super::extrinsic::{ChainCall, ExtrinsicType};
use crate::domain::pool::YieldPoolInfo;
use crate::shared::types::Balance;
use crate::shared::utils::balance_string;

/// Input of a path computation
#[derive(Debug, Clone)]
pub struct OptimalYieldPathParams {
    pub address: String,
    pub amount: Balance,
    pub pool: YieldPoolInfo,
}

/// Data the user filled in for a join step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepSubmitData {
    Yield {
        #[serde(with = "balance_string")]
        amount: Balance,
    },
    NativeStaking {
        #[serde(with = "balance_string")]
        amount: Balance,
        validators: Vec<String>,
    },
    NominationPool {
        #[serde(with = "balance_string")]
        amount: Balance,
        pool_id: u32,
    },
    ParachainStaking {
        #[serde(with = "balance_string")]
        amount: Balance,
        collator: String,
    },
}

impl StepSubmitData {
    pub fn amount(&self) -> Balance {
        match self {
            StepSubmitData::Yield { amount }
            | StepSubmitData::NativeStaking { amount, .. }
            | StepSubmitData::NominationPool { amount, .. }
            | StepSubmitData::ParachainStaking { amount, .. } => *amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCrossChainTransfer {
    pub origin_network_key: String,
    pub destination_network_key: String,
    pub from: String,
    pub to: String,
    #[serde(with = "balance_string")]
    pub value: Balance,
    pub token_slug: String,
    pub show_extra_warning: bool,
}

/// Request for a lifecycle action on an existing position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub address: String,
    #[serde(with = "balance_string")]
    pub amount: Balance,
    /// Validator, collator or pool the action targets, when the pallet needs one
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum TxData {
    YieldStep(StepSubmitData),
    CrossChainTransfer(RequestCrossChainTransfer),
    Action(ActionRequest),
}

/// Everything the transaction service needs to sign and track one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub target_chain: String,
    pub extrinsic_type: ExtrinsicType,
    pub operation: ChainCall,
    pub tx_data: TxData,
    #[serde(with = "balance_string")]
    pub transfer_native_amount: Balance,
}
