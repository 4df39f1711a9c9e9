//! Synchronous checks run before a step is built

use super::execution_plan::OptimalYieldPathParams;
use crate::domain::path::OptimalYieldPath;
use crate::shared::errors::ValidationError;
use crate::shared::types::Balance;

/// Validates join requests against pool limits and balances
pub struct TransactionValidator;

impl TransactionValidator {
    /// All problems with a join request; an empty list means it can proceed.
    ///
    /// `available` is what the address can spend on the input token across
    /// the pool chain and the bridge origin chain.
    pub fn validate_join(
        params: &OptimalYieldPathParams,
        path: &OptimalYieldPath,
        step_index: usize,
        available: Balance,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if step_index >= path.steps.len() {
            errors.push(ValidationError::InvalidStep(step_index));
        }

        if !params.pool.is_available() {
            errors.push(ValidationError::PoolUnavailable(params.pool.slug().to_string()));
        }

        if params.amount == 0 {
            errors.push(ValidationError::InvalidAmount("amount must be positive".to_string()));
            return errors;
        }

        let minimum = params.pool.min_join_pool();
        if params.amount < minimum {
            errors.push(ValidationError::BelowMinimum {
                amount: params.amount,
                minimum,
            });
        }

        let input_fees: Balance = match params.pool.pool.input_assets.first() {
            Some(input) => path
                .total_fee
                .iter()
                .filter(|fee| &fee.slug == input)
                .map(|fee| fee.amount)
                .sum(),
            None => 0,
        };
        let required = params.amount.saturating_add(input_fees);
        if available < required {
            errors.push(ValidationError::InsufficientBalance { available, required });
        }

        errors
    }

    /// Checks for leaving a position
    pub fn validate_exit(amount: Balance, staked: Balance, min_withdrawal: Balance) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if amount == 0 {
            errors.push(ValidationError::InvalidAmount("amount must be positive".to_string()));
        } else if amount < min_withdrawal {
            errors.push(ValidationError::BelowMinimum {
                amount,
                minimum: min_withdrawal,
            });
        }

        if amount > staked {
            errors.push(ValidationError::InsufficientBalance {
                available: staked,
                required: amount,
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::path::{OptimalYieldPath, YieldFee, YieldStepType};
    use crate::domain::pool::{PoolInfo, PoolParams, PoolStats, PoolType, YieldPoolInfo};
    use crate::domain::execution::ExtrinsicType;
    use std::sync::Arc;

    fn params(amount: Balance, available: bool) -> OptimalYieldPathParams {
        let pool = Arc::new(PoolInfo {
            slug: "xDOT___liquid_staking___parallel".into(),
            chain: "parallel".into(),
            pool_type: PoolType::LiquidStaking,
            name: "Parallel".into(),
            input_assets: vec!["parallel-LOCAL-DOT".into()],
            derivative_assets: vec!["parallel-LOCAL-sDOT".into()],
            reward_assets: vec!["parallel-LOCAL-DOT".into()],
            fee_assets: vec![],
            params: PoolParams::default(),
        });
        let mut stats = PoolStats::unavailable(PoolType::LiquidStaking, "parallel-LOCAL-DOT", 10_000_000_000);
        stats.is_available = available;

        OptimalYieldPathParams {
            address: "5Alice".into(),
            amount,
            pool: YieldPoolInfo::with_stats(pool, stats),
        }
    }

    fn path() -> OptimalYieldPath {
        let mut path = OptimalYieldPath::new();
        path.push_step(
            "Mint sDOT",
            YieldStepType::Stake(ExtrinsicType::MintSdot),
            YieldFee::new("parallel-LOCAL-DOT", 1_000),
        );
        path
    }

    #[test]
    fn test_valid_join_has_no_errors() {
        let errors = TransactionValidator::validate_join(&params(20_000_000_000, true), &path(), 1, 30_000_000_000);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_join_collects_every_problem() {
        let errors = TransactionValidator::validate_join(&params(1_000, false), &path(), 5, 0);

        assert!(errors.contains(&ValidationError::InvalidStep(5)));
        assert!(errors.contains(&ValidationError::PoolUnavailable("xDOT___liquid_staking___parallel".into())));
        assert!(errors.contains(&ValidationError::BelowMinimum {
            amount: 1_000,
            minimum: 10_000_000_000
        }));
        assert!(errors.contains(&ValidationError::InsufficientBalance {
            available: 0,
            required: 2_000
        }));
    }

    #[test]
    fn test_exit_checks() {
        assert!(TransactionValidator::validate_exit(10, 100, 5).is_empty());
        assert_eq!(TransactionValidator::validate_exit(0, 100, 5).len(), 1);
        assert_eq!(
            TransactionValidator::validate_exit(200, 100, 0),
            vec![ValidationError::InsufficientBalance {
                available: 100,
                required: 200
            }]
        );
    }
}
