use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::{
    config::PoolConfig,
    error::{Result, StakeError},
    state::{PendingPayout, PoolState},
};
use super::reward_math::{accrue, pending_reward};

/// A committed withdrawal whose payout still has to go through the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalTicket {
    pub participant: Pubkey,
    pub principal: u128,
    pub reward: u128,
    pub timestamp: u64,
}

/// What the caller got back from a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawReceipt {
    pub participant: Pubkey,
    /// Wei returned
    pub principal: u128,
    /// Reward-token units paid
    pub reward: u128,
    /// Principal valued in reward-token units at withdrawal time, when a
    /// fresh price was available
    pub principal_quote: Option<u128>,
    pub timestamp: u64,
}

// ─── Handler ──────────────────────────────────────────────────────────────
/// Full withdrawal. Checkpoints, then zeroes the participant and moves the
/// principal plus everything owed into a pending payout. The ledger is not
/// touched here; the pool executes the payout after this commit.
pub fn handler(
    state: &mut PoolState,
    config: &PoolConfig,
    participant: &Pubkey,
    now: u64,
) -> Result<WithdrawalTicket> {
    state.require_live()?;
    let position = state.participant(participant);
    if !position.is_staked() {
        return Err(StakeError::NoStake);
    }
    if state.pending_payouts.contains_key(participant) {
        return Err(StakeError::PayoutPending(*participant));
    }

    let accrual = accrue(
        now,
        state.total_staked,
        state.reward_reserve,
        state.reward_per_share,
        state.last_accrual_timestamp,
        config.emission_per_second,
    )?;
    let reward = pending_reward(&position, accrual.reward_per_share)?;
    let total_staked = state
        .total_staked
        .checked_sub(position.principal)
        .ok_or_else(|| {
            StakeError::InvariantViolation(format!(
                "principal {} exceeds total staked {}",
                position.principal, state.total_staked
            ))
        })?;

    state.apply_accrual(&accrual)?;
    state.participants.remove(participant);
    state.total_staked = total_staked;
    state.pending_payouts.insert(
        *participant,
        PendingPayout {
            principal: position.principal,
            reward,
            principal_paid: false,
            attempts: 0,
            in_flight: true,
        },
    );

    info!(
        %participant,
        principal = position.principal,
        reward,
        total_staked,
        emitted = accrual.emitted,
        "Withdrawal committed"
    );
    Ok(WithdrawalTicket {
        participant: *participant,
        principal: position.principal,
        reward,
        timestamp: now,
    })
}
