//! Read models returned by [`crate::StakeClient`]. All serialize to the JSON
//! the CLI prints with `--json`.

use eth_stake::{Lifecycle, PendingPayout, PoolConfig, PositionValue};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

// ─── Pool ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolInfo {
    #[serde(with = "eth_stake::pubkey_serde")]
    pub owner: Pubkey,
    #[serde(with = "eth_stake::pubkey_serde")]
    pub vault: Pubkey,
    pub lifecycle: Lifecycle,
    #[serde(with = "eth_stake::pubkey_serde::option")]
    pub reward_token: Option<Pubkey>,
    #[serde(with = "eth_stake::pubkey_serde::option")]
    pub price_feed: Option<Pubkey>,
    /// Wei staked across all participants
    #[serde(with = "eth_stake::amount_serde")]
    pub total_staked: u128,
    /// Reward-token units left in the reserve
    #[serde(with = "eth_stake::amount_serde")]
    pub stake_rewards: u128,
    pub latest_reward_timestamp: u64,
    /// Q64.64
    #[serde(with = "eth_stake::amount_serde")]
    pub reward_per_share: u128,
    #[serde(with = "eth_stake::amount_serde")]
    pub initial_reserve: u128,
    #[serde(with = "eth_stake::amount_serde")]
    pub total_emitted: u128,
    #[serde(with = "eth_stake::amount_serde")]
    pub total_reward_paid: u128,
    pub participants: usize,
    pub pending_payouts: usize,
    pub config: PoolConfig,
}

// ─── Position ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionInfo {
    #[serde(with = "eth_stake::pubkey_serde")]
    pub participant: Pubkey,
    /// Wei staked; 0 when the participant has no active stake
    #[serde(with = "eth_stake::amount_serde")]
    pub principal: u128,
    /// Reward owed as of the last checkpoint
    #[serde(with = "eth_stake::amount_serde")]
    pub pending_reward: u128,
    /// Reward owed if the pool checkpointed at `as_of`
    #[serde(with = "eth_stake::amount_serde")]
    pub projected_reward: u128,
    pub as_of: u64,
    pub pending_payout: Option<PendingPayout>,
    /// Valuation at the current oracle quote, when one is available and fresh
    pub value: Option<PositionValue>,
    /// Why `value` is missing
    pub value_error: Option<String>,
}

// ─── Balances ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balances {
    #[serde(with = "eth_stake::pubkey_serde")]
    pub owner: Pubkey,
    /// Wei
    #[serde(with = "eth_stake::amount_serde")]
    pub native: u128,
    /// Reward-token units; `None` until the pool names its reward token
    #[serde(with = "eth_stake::amount_serde::option")]
    pub reward: Option<u128>,
}
