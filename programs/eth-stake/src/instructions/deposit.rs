use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::{
    config::PoolConfig,
    error::{Result, StakeError},
    state::{Participant, PoolState},
};
use super::reward_math::{accrue, pending_reward};

/// What a successful deposit recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReceipt {
    pub participant: Pubkey,
    pub amount: u128,
    /// Participant principal after the deposit
    pub principal: u128,
    /// Reward carried into `accrued_reward` (non-zero only on a top-up)
    pub carried_reward: u128,
    pub timestamp: u64,
}

// ─── Handler ──────────────────────────────────────────────────────────────
/// Record a stake. The ETH itself is already in pool custody; this only
/// updates the accounting.
///
/// Checkpoints the accumulator first. A top-up settles the participant's
/// pending reward into `accrued_reward` before the principal grows, so the
/// larger principal never earns retroactively.
pub fn handler(
    state: &mut PoolState,
    config: &PoolConfig,
    participant: &Pubkey,
    amount: u128,
    now: u64,
) -> Result<DepositReceipt> {
    state.require_live()?;
    if amount < config.minimum_deposit {
        return Err(StakeError::BelowMinimum {
            amount,
            minimum: config.minimum_deposit,
        });
    }

    // Everything fallible is computed on locals before the first write
    let accrual = accrue(
        now,
        state.total_staked,
        state.reward_reserve,
        state.reward_per_share,
        state.last_accrual_timestamp,
        config.emission_per_second,
    )?;
    let position = state.participant(participant);
    let carried = pending_reward(&position, accrual.reward_per_share)?;
    let principal = position
        .principal
        .checked_add(amount)
        .ok_or(StakeError::MathOverflow)?;
    let total_staked = state
        .total_staked
        .checked_add(amount)
        .ok_or(StakeError::MathOverflow)?;

    state.apply_accrual(&accrual)?;
    state.participants.insert(
        *participant,
        Participant {
            principal,
            reward_debt: accrual.reward_per_share,
            accrued_reward: carried,
        },
    );
    state.total_staked = total_staked;

    info!(
        %participant,
        amount,
        principal,
        total_staked,
        emitted = accrual.emitted,
        "Deposited"
    );
    Ok(DepositReceipt {
        participant: *participant,
        amount,
        principal,
        carried_reward: carried.saturating_sub(position.accrued_reward),
        timestamp: now,
    })
}
