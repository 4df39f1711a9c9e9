//! User-facing actions derived from a position

use serde::{Deserialize, Serialize};

use super::position_info::PositionInfo;
use crate::domain::pool::PoolType;
use crate::shared::types::Balance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YieldAction {
    StartEarning,
    StakeMore,
    Unstake,
    CancelUnstake,
    Withdraw,
    ClaimReward,
    WithdrawEarning,
}

/// Actions a pool type supports at all
pub fn actions_by_type(pool_type: PoolType) -> &'static [YieldAction] {
    use YieldAction::*;

    match pool_type {
        PoolType::NominationPool => &[StakeMore, Unstake, Withdraw, ClaimReward],
        PoolType::NativeStaking | PoolType::ParachainStaking => {
            &[StakeMore, Unstake, Withdraw, CancelUnstake]
        }
        PoolType::LiquidStaking => &[StakeMore, Unstake, WithdrawEarning],
        PoolType::Lending => &[StakeMore, WithdrawEarning],
        PoolType::SingleFarming => &[StakeMore, Unstake],
    }
}

/// Actions currently possible for a position
pub fn available_actions(
    position: &PositionInfo,
    pool_type: PoolType,
    unclaimed_reward: Balance,
) -> Vec<YieldAction> {
    let supported = actions_by_type(pool_type);
    let supports = |action: YieldAction| supported.contains(&action);
    let mut actions = Vec::new();

    if position.active_balance() > 0 {
        actions.push(YieldAction::StakeMore);

        if supports(YieldAction::Unstake) {
            actions.push(YieldAction::Unstake);
        }
        if supports(YieldAction::WithdrawEarning) {
            actions.push(YieldAction::WithdrawEarning);
        }
    } else {
        actions.push(YieldAction::StartEarning);
    }

    if supports(YieldAction::Withdraw) && position.withdrawable_amount() > 0 {
        actions.push(YieldAction::Withdraw);
    }

    if supports(YieldAction::CancelUnstake) && position.has_pending_unlocking() {
        actions.push(YieldAction::CancelUnstake);
    }

    if supports(YieldAction::ClaimReward) && unclaimed_reward > 0 {
        actions.push(YieldAction::ClaimReward);
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{UnlockingRequest, UnstakingStatus};

    fn position(active: Balance) -> PositionInfo {
        PositionInfo::single("DOT___nomination_pool", "polkadot", "5Alice", "polkadot-NATIVE-DOT", active)
    }

    #[test]
    fn test_empty_position_can_only_start() {
        let actions = available_actions(&position(0), PoolType::LiquidStaking, 0);
        assert_eq!(actions, vec![YieldAction::StartEarning]);
    }

    #[test]
    fn test_nomination_pool_actions() {
        let mut pos = position(1_000);
        pos.metadata.unstakings.push(UnlockingRequest {
            slug: "polkadot-NATIVE-DOT".into(),
            amount: 500,
            status: UnstakingStatus::Withdrawable,
            target_era: Some(1200),
        });

        let actions = available_actions(&pos, PoolType::NominationPool, 42);
        assert_eq!(
            actions,
            vec![
                YieldAction::StakeMore,
                YieldAction::Unstake,
                YieldAction::Withdraw,
                YieldAction::ClaimReward
            ]
        );
    }

    #[test]
    fn test_cancel_unstake_needs_pending_chunk() {
        let mut pos = position(1_000);
        assert!(!available_actions(&pos, PoolType::NativeStaking, 0).contains(&YieldAction::CancelUnstake));

        pos.metadata.unstakings.push(UnlockingRequest {
            slug: "polkadot-NATIVE-DOT".into(),
            amount: 10,
            status: UnstakingStatus::Unlocking,
            target_era: None,
        });
        assert!(available_actions(&pos, PoolType::NativeStaking, 0).contains(&YieldAction::CancelUnstake));
        // nomination pools have no rebond
        assert!(!available_actions(&pos, PoolType::NominationPool, 0).contains(&YieldAction::CancelUnstake));
    }
}
