use serde::{Deserialize, Serialize};

use crate::domain::execution::ExtrinsicType;
use crate::math::xcm_transfer_amount;
use crate::shared::errors::AdapterError;
use crate::shared::types::Balance;
use crate::shared::utils::balance_string;

pub const DEFAULT_STEP_NAME: &str = "Fill information";
pub const XCM_STEP_NAME: &str = "Transfer DOT from Polkadot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "extrinsic", rename_all = "snake_case")]
pub enum YieldStepType {
    Default,
    Xcm,
    Stake(ExtrinsicType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldStep {
    pub id: usize,
    pub name: String,
    pub step_type: YieldStepType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldFee {
    pub slug: String,
    #[serde(with = "balance_string")]
    pub amount: Balance,
}

impl YieldFee {
    pub fn new(slug: &str, amount: Balance) -> Self {
        Self {
            slug: slug.to_string(),
            amount,
        }
    }

    pub fn zero() -> Self {
        Self::new("", 0)
    }
}

/// Steps to run in order plus one fee estimate per step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimalYieldPath {
    pub steps: Vec<YieldStep>,
    pub total_fee: Vec<YieldFee>,
}

impl OptimalYieldPath {
    /// Path holding only the "fill information" step
    pub fn new() -> Self {
        Self {
            steps: vec![YieldStep {
                id: 0,
                name: DEFAULT_STEP_NAME.to_string(),
                step_type: YieldStepType::Default,
            }],
            total_fee: vec![YieldFee::zero()],
        }
    }

    pub fn push_step(&mut self, name: &str, step_type: YieldStepType, fee: YieldFee) {
        self.steps.push(YieldStep {
            id: self.steps.len(),
            name: name.to_string(),
            step_type,
        });
        self.total_fee.push(fee);
    }

    pub fn step(&self, index: usize) -> Result<&YieldStep, AdapterError> {
        self.steps.get(index).ok_or(AdapterError::InvalidStep(index))
    }

    pub fn fee_at(&self, index: usize) -> Balance {
        self.total_fee.get(index).map(|f| f.amount).unwrap_or(0)
    }

    pub fn has_xcm_step(&self) -> bool {
        self.steps.iter().any(|s| s.step_type == YieldStepType::Xcm)
    }
}

impl Default for OptimalYieldPath {
    fn default() -> Self {
        Self::new()
    }
}

/// What a protocol needs to decide its join path
#[derive(Debug, Clone)]
pub struct JoinPathRequest {
    pub amount: Balance,
    /// Free balance of the input token on the pool chain
    pub local_balance: Balance,
    /// Cross-chain transfer fee, when the input token can be bridged in
    pub xcm_fee: Option<YieldFee>,
    pub stake_name: String,
    pub stake_type: ExtrinsicType,
    pub stake_fee: YieldFee,
}

/// Default step, then a transfer step if the local balance is short, then the stake step
pub fn plan_join_path(request: JoinPathRequest) -> OptimalYieldPath {
    let mut path = OptimalYieldPath::new();

    if let Some(xcm_fee) = request.xcm_fee {
        if request.local_balance < request.amount {
            path.push_step(XCM_STEP_NAME, YieldStepType::Xcm, xcm_fee);
        }
    }

    path.push_step(
        &request.stake_name,
        YieldStepType::Stake(request.stake_type),
        request.stake_fee,
    );

    path
}

/// Amount the transfer step has to bring to the pool chain
pub fn transfer_amount_for(path: &OptimalYieldPath, step: usize, requested: Balance, local: Balance) -> Balance {
    xcm_transfer_amount(requested, local, path.fee_at(step))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(local_balance: Balance) -> JoinPathRequest {
        JoinPathRequest {
            amount: 20_000_000_000,
            local_balance,
            xcm_fee: Some(YieldFee::new("polkadot-NATIVE-DOT", 150_000_000)),
            stake_name: "Mint sDOT".to_string(),
            stake_type: ExtrinsicType::MintSdot,
            stake_fee: YieldFee::new("parallel-NATIVE-PARA", 3_000_000),
        }
    }

    #[test]
    fn test_direct_stake_when_balance_suffices() {
        let path = plan_join_path(request(25_000_000_000));

        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0].step_type, YieldStepType::Default);
        assert_eq!(path.steps[1].step_type, YieldStepType::Stake(ExtrinsicType::MintSdot));
        assert_eq!(path.total_fee.len(), path.steps.len());
    }

    #[test]
    fn test_transfer_inserted_when_balance_short() {
        let path = plan_join_path(request(5_000_000_000));

        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[1].step_type, YieldStepType::Xcm);
        assert_eq!(path.steps[2].id, 2);
        assert_eq!(path.fee_at(1), 150_000_000);
        assert_eq!(
            transfer_amount_for(&path, 1, 20_000_000_000, 5_000_000_000),
            15_150_000_000
        );
    }

    #[test]
    fn test_step_lookup_out_of_range() {
        let path = OptimalYieldPath::new();
        assert_eq!(path.step(3), Err(AdapterError::InvalidStep(3)));
    }
}
