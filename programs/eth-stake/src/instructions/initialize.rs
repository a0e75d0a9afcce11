use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::{
    error::{Result, StakeError},
    state::{Lifecycle, PoolState},
};

/// Claim the one-time initialization slot: Uninitialized → Funding.
///
/// Only the owner may initialize. While Funding, deposits and withdrawals
/// still report `NotInitialized` and a second initialize reports
/// `AlreadyInitialized`.
pub fn begin(
    state: &mut PoolState,
    caller: &Pubkey,
    reward_token: Pubkey,
    price_feed: Pubkey,
) -> Result<()> {
    if state.lifecycle != Lifecycle::Uninitialized {
        return Err(StakeError::AlreadyInitialized);
    }
    if *caller != state.owner {
        return Err(StakeError::Unauthorized { caller: *caller });
    }

    state.lifecycle = Lifecycle::Funding;
    state.reward_token = Some(reward_token);
    state.price_feed = Some(price_feed);
    Ok(())
}

/// The reserve is in custody: Funding → Live.
pub fn complete(state: &mut PoolState, reserve: u128) {
    state.lifecycle = Lifecycle::Live;
    state.initial_reserve = reserve;
    state.reward_reserve = reserve;
    state.total_emitted = 0;
    state.total_reward_paid = 0;
    state.reward_per_share = 0;
    state.last_accrual_timestamp = 0;

    info!(
        reward_token = ?state.reward_token,
        price_feed = ?state.price_feed,
        reserve,
        "Pool initialized"
    );
}

/// Funding failed: back to Uninitialized so the owner can try again.
pub fn abort(state: &mut PoolState) {
    state.lifecycle = Lifecycle::Uninitialized;
    state.reward_token = None;
    state.price_feed = None;
}
