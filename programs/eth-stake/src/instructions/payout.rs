use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::{
    error::{Result, StakeError},
    oracle::LedgerError,
    state::{PendingPayout, PoolState},
};

/// How far a payout got through the ledger on one attempt.
///
/// The principal leg runs first; the reward leg only runs once the
/// principal is out, so `error == None` means both legs are done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutProgress {
    pub principal_paid: bool,
    pub error: Option<LedgerError>,
}

/// Result of recording a payout attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Both legs went through; the pending entry is gone.
    Completed(PendingPayout),
    /// Something failed; the entry stays buffered for a retry.
    Deferred(PendingPayout, LedgerError),
}

/// Claim a buffered payout for another attempt.
pub fn begin_retry(state: &mut PoolState, participant: &Pubkey) -> Result<PendingPayout> {
    let payout = state
        .pending_payouts
        .get_mut(participant)
        .ok_or(StakeError::NoPendingPayout(*participant))?;
    if payout.in_flight {
        return Err(StakeError::PayoutInFlight(*participant));
    }
    payout.in_flight = true;
    Ok(payout.clone())
}

/// Record the outcome of a ledger attempt for `participant`'s payout.
pub fn settle(
    state: &mut PoolState,
    participant: &Pubkey,
    progress: PayoutProgress,
) -> Result<Settlement> {
    let payout = state
        .pending_payouts
        .get_mut(participant)
        .ok_or(StakeError::NoPendingPayout(*participant))?;
    payout.in_flight = false;
    if progress.principal_paid {
        payout.principal_paid = true;
    }

    match progress.error {
        None => {
            let reward = payout.reward;
            state.total_reward_paid = state.total_reward_paid.saturating_add(reward);
            let done = state
                .pending_payouts
                .remove(participant)
                .ok_or(StakeError::NoPendingPayout(*participant))?;
            info!(%participant, principal = done.principal, reward, "Payout settled");
            Ok(Settlement::Completed(done))
        }
        Some(error) => {
            payout.attempts = payout.attempts.saturating_add(1);
            warn!(
                %participant,
                principal = payout.principal,
                reward = payout.reward,
                principal_paid = payout.principal_paid,
                attempts = payout.attempts,
                %error,
                "Payout deferred"
            );
            Ok(Settlement::Deferred(payout.clone(), error))
        }
    }
}
