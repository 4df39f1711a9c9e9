use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrinsicType {
    TransferXcm,
    MintSdot,
    RedeemSdot,
    StakingBond,
    StakingJoinPool,
    StakingUnbond,
    StakingLeavePool,
    StakingWithdraw,
    StakingPoolWithdraw,
    StakingCancelUnstake,
    StakingClaimReward,
    ParachainDelegate,
    LiquidUnstake,
    LiquidClaim,
}

/// Submittable operation handed to the transaction service.
/// Signing and encoding happen on the other side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCall {
    pub chain: String,
    pub pallet: String,
    pub method: String,
    pub args: Vec<Value>,
}

impl ChainCall {
    pub fn new(chain: &str, pallet: &str, method: &str, args: Vec<Value>) -> Self {
        Self {
            chain: chain.to_string(),
            pallet: pallet.to_string(),
            method: method.to_string(),
            args,
        }
    }

    /// `utility.batchAll` wrapping several calls on the same chain
    pub fn batch_all(chain: &str, calls: Vec<ChainCall>) -> Self {
        let inner = calls
            .into_iter()
            .map(|c| serde_json::json!({ "pallet": c.pallet, "method": c.method, "args": c.args }))
            .collect::<Vec<_>>();
        Self::new(chain, "utility", "batchAll", vec![Value::Array(inner)])
    }

    pub fn is(&self, pallet: &str, method: &str) -> bool {
        self.pallet == pallet && self.method == method
    }
}

impl fmt::Display for ChainCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}.{}", self.chain, self.pallet, self.method)
    }
}
