use crate::{
    constants::Q64,
    error::{Result, StakeError},
    state::Participant,
};

/// Outcome of bringing the reward-per-share accumulator up to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    /// Q64.64 reward owed per wei of stake since genesis.
    pub reward_per_share: u128,
    /// Reserve left after this accrual.
    pub reward_reserve: u128,
    /// Reward-token units released by this accrual.
    pub emitted: u128,
    /// New checkpoint timestamp (always `now`).
    pub timestamp: u64,
}

/// Advance the accumulator from `last_timestamp` to `now`.
///
/// * `total_staked`        – wei staked across all participants
/// * `reserve`             – reward-token units still available
/// * `accumulator`         – current Q64.64 reward-per-share
/// * `emission_per_second` – reward units released per elapsed second
///
/// Emission is capped by the reserve, so an empty reserve pins it at zero.
/// With nothing staked no reward is released but the checkpoint still moves.
/// The per-share delta rounds down; the dust is never paid out.
pub fn accrue(
    now: u64,
    total_staked: u128,
    reserve: u128,
    accumulator: u128,
    last_timestamp: u64,
    emission_per_second: u128,
) -> Result<Accrual> {
    let elapsed = now.checked_sub(last_timestamp).ok_or(StakeError::TimeTravel {
        now,
        last: last_timestamp,
    })?;

    if total_staked == 0 || elapsed == 0 {
        return Ok(Accrual {
            reward_per_share: accumulator,
            reward_reserve: reserve,
            emitted: 0,
            timestamp: now,
        });
    }

    let emitted = emission_per_second
        .saturating_mul(elapsed as u128)
        .min(reserve);

    // delta = emitted * Q64 / total_staked  (Q64.64, truncated)
    let delta = mul_div_floor(emitted, Q64, total_staked).ok_or(StakeError::MathOverflow)?;
    let reward_per_share = accumulator
        .checked_add(delta)
        .ok_or(StakeError::MathOverflow)?;

    Ok(Accrual {
        reward_per_share,
        reward_reserve: reserve - emitted, // emitted <= reserve
        emitted,
        timestamp: now,
    })
}

/// Reward owed to `participant` at accumulator value `reward_per_share`:
/// `accrued_reward + principal × (reward_per_share − reward_debt) >> 64`.
pub fn pending_reward(participant: &Participant, reward_per_share: u128) -> Result<u128> {
    let delta = reward_per_share.saturating_sub(participant.reward_debt);
    let fresh = mul_div_floor(participant.principal, delta, Q64).ok_or(StakeError::MathOverflow)?;
    participant
        .accrued_reward
        .checked_add(fresh)
        .ok_or(StakeError::MathOverflow)
}

// ─── 256-bit intermediate arithmetic ──────────────────────────────────────────

/// `floor(a * b / denom)` without intermediate overflow.
///
/// Returns `None` when `denom == 0` or the quotient does not fit in a u128.
pub fn mul_div_floor(a: u128, b: u128, denom: u128) -> Option<u128> {
    if denom == 0 {
        return None;
    }
    let (hi, lo) = widening_mul(a, b);
    if hi == 0 {
        return Some(lo / denom);
    }
    if hi >= denom {
        return None;
    }

    // Binary long division of hi:lo by denom. `rem < denom` holds between steps.
    let mut rem = hi;
    let mut quot: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quot <<= 1;
        if carry == 1 || rem >= denom {
            rem = rem.wrapping_sub(denom);
            quot |= 1;
        }
    }
    Some(quot)
}

/// Full 128×128 → 256-bit product as `(high, low)` halves.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | (mid << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}
