use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::{
    config::PoolConfig,
    error::{Result, StakeError},
    instructions::reward_math::{pending_reward, Accrual},
};

// ─── Lifecycle ─────────────────────────────────────────────────────────────
// Uninitialized → Funding (reserve pull in progress) → Live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Uninitialized,
    Funding,
    Live,
}

// ─── Participant ───────────────────────────────────────────────────────────
// One depositor's stake. A zeroed record means "no active stake".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Wei currently staked
    #[serde(with = "crate::amount_serde")]
    pub principal: u128,
    /// Accumulator snapshot at the last checkpoint (Q64.64)
    #[serde(with = "crate::amount_serde")]
    pub reward_debt: u128,
    /// Reward settled at an earlier checkpoint but not yet paid
    #[serde(with = "crate::amount_serde")]
    pub accrued_reward: u128,
}

impl Participant {
    pub fn is_staked(&self) -> bool {
        self.principal > 0
    }
}

// ─── PendingPayout ─────────────────────────────────────────────────────────
// A committed withdrawal whose ledger transfers have not all succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayout {
    /// Wei owed back to the participant
    #[serde(with = "crate::amount_serde")]
    pub principal: u128,
    /// Reward-token units owed to the participant
    #[serde(with = "crate::amount_serde")]
    pub reward: u128,
    /// The principal leg already went through; only the reward is outstanding
    pub principal_paid: bool,
    /// Failed execution attempts so far
    pub attempts: u32,
    /// Set while a ledger call for this payout is running
    #[serde(skip)]
    pub in_flight: bool,
}

// ─── PoolState ─────────────────────────────────────────────────────────────
// Ledger of truth for one pool. Only the handlers in `instructions` mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    /// Deployer; the only identity allowed to initialize
    pub owner: Pubkey,
    /// Custody address holding staked ETH and the reward reserve
    pub vault: Pubkey,
    pub lifecycle: Lifecycle,
    pub reward_token: Option<Pubkey>,
    pub price_feed: Option<Pubkey>,
    /// Sum of every participant's principal
    pub total_staked: u128,
    /// Reward-token units not yet emitted
    pub reward_reserve: u128,
    /// Cumulative reward per wei staked, Q64.64 fixed-point
    pub reward_per_share: u128,
    /// Unix seconds of the last accrual checkpoint; 0 until the first deposit
    pub last_accrual_timestamp: u64,
    pub initial_reserve: u128,
    pub total_emitted: u128,
    pub total_reward_paid: u128,
    pub participants: HashMap<Pubkey, Participant>,
    pub pending_payouts: HashMap<Pubkey, PendingPayout>,
}

impl PoolState {
    pub fn new(owner: Pubkey, vault: Pubkey) -> Self {
        Self {
            owner,
            vault,
            lifecycle: Lifecycle::Uninitialized,
            reward_token: None,
            price_feed: None,
            total_staked: 0,
            reward_reserve: 0,
            reward_per_share: 0,
            last_accrual_timestamp: 0,
            initial_reserve: 0,
            total_emitted: 0,
            total_reward_paid: 0,
            participants: HashMap::new(),
            pending_payouts: HashMap::new(),
        }
    }

    pub fn require_live(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Live => Ok(()),
            _ => Err(StakeError::NotInitialized),
        }
    }

    pub fn participant(&self, id: &Pubkey) -> Participant {
        self.participants.get(id).copied().unwrap_or_default()
    }

    /// Persist a checkpoint computed by [`crate::instructions::reward_math::accrue`].
    pub fn apply_accrual(&mut self, accrual: &Accrual) -> Result<()> {
        let total_emitted = self
            .total_emitted
            .checked_add(accrual.emitted)
            .ok_or(StakeError::MathOverflow)?;
        self.reward_per_share = accrual.reward_per_share;
        self.reward_reserve = accrual.reward_reserve;
        self.total_emitted = total_emitted;
        self.last_accrual_timestamp = accrual.timestamp;
        Ok(())
    }

    /// Check the conservation invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let staked = self
            .participants
            .values()
            .try_fold(0u128, |acc, p| acc.checked_add(p.principal))
            .ok_or(StakeError::MathOverflow)?;
        if staked != self.total_staked {
            return Err(StakeError::InvariantViolation(format!(
                "total_staked {} != sum of principals {}",
                self.total_staked, staked
            )));
        }

        let accounted = self.reward_reserve.checked_add(self.total_emitted);
        if accounted != Some(self.initial_reserve) {
            return Err(StakeError::InvariantViolation(format!(
                "reserve {} + emitted {} != initial reserve {}",
                self.reward_reserve, self.total_emitted, self.initial_reserve
            )));
        }

        let mut owed = self.total_reward_paid;
        for p in self.participants.values() {
            owed = owed
                .checked_add(pending_reward(p, self.reward_per_share)?)
                .ok_or(StakeError::MathOverflow)?;
        }
        for payout in self.pending_payouts.values() {
            owed = owed.checked_add(payout.reward).ok_or(StakeError::MathOverflow)?;
        }
        if owed > self.total_emitted {
            return Err(StakeError::InvariantViolation(format!(
                "reward paid or owed {} exceeds reward emitted {}",
                owed, self.total_emitted
            )));
        }
        Ok(())
    }

    pub fn to_snapshot(&self, config: &PoolConfig) -> PoolSnapshot {
        let mut participants: Vec<ParticipantEntry> = self
            .participants
            .iter()
            .map(|(k, p)| ParticipantEntry { participant: *k, stake: *p })
            .collect();
        participants.sort_by_key(|e| e.participant);

        let mut pending_payouts: Vec<PendingPayoutEntry> = self
            .pending_payouts
            .iter()
            .map(|(k, p)| PendingPayoutEntry { participant: *k, payout: p.clone() })
            .collect();
        pending_payouts.sort_by_key(|e| e.participant);

        PoolSnapshot {
            owner: self.owner,
            vault: self.vault,
            lifecycle: self.lifecycle,
            reward_token: self.reward_token,
            price_feed: self.price_feed,
            total_staked: self.total_staked,
            reward_reserve: self.reward_reserve,
            reward_per_share: self.reward_per_share,
            last_accrual_timestamp: self.last_accrual_timestamp,
            initial_reserve: self.initial_reserve,
            total_emitted: self.total_emitted,
            total_reward_paid: self.total_reward_paid,
            participants,
            pending_payouts,
            config: config.clone(),
        }
    }

    /// Rebuild state from a snapshot, refusing one that breaks the invariants.
    pub fn from_snapshot(snapshot: PoolSnapshot) -> Result<(Self, PoolConfig)> {
        if snapshot.lifecycle == Lifecycle::Funding {
            return Err(StakeError::InvariantViolation(
                "snapshot was taken while the reserve was being funded".into(),
            ));
        }
        snapshot.config.validate()?;

        let mut participants = HashMap::with_capacity(snapshot.participants.len());
        for entry in snapshot.participants {
            if participants.insert(entry.participant, entry.stake).is_some() {
                return Err(StakeError::InvariantViolation(format!(
                    "participant {} listed twice",
                    entry.participant
                )));
            }
        }
        let pending_payouts = snapshot
            .pending_payouts
            .into_iter()
            .map(|e| (e.participant, e.payout))
            .collect();

        let state = Self {
            owner: snapshot.owner,
            vault: snapshot.vault,
            lifecycle: snapshot.lifecycle,
            reward_token: snapshot.reward_token,
            price_feed: snapshot.price_feed,
            total_staked: snapshot.total_staked,
            reward_reserve: snapshot.reward_reserve,
            reward_per_share: snapshot.reward_per_share,
            last_accrual_timestamp: snapshot.last_accrual_timestamp,
            initial_reserve: snapshot.initial_reserve,
            total_emitted: snapshot.total_emitted,
            total_reward_paid: snapshot.total_reward_paid,
            participants,
            pending_payouts,
        };
        state.check_invariants()?;
        Ok((state, snapshot.config))
    }
}

// ─── Snapshot ──────────────────────────────────────────────────────────────
// Serializable copy of a pool. Participants are sorted by key so two
// snapshots of the same state serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    #[serde(with = "crate::pubkey_serde")]
    pub owner: Pubkey,
    #[serde(with = "crate::pubkey_serde")]
    pub vault: Pubkey,
    pub lifecycle: Lifecycle,
    #[serde(with = "crate::pubkey_serde::option", default)]
    pub reward_token: Option<Pubkey>,
    #[serde(with = "crate::pubkey_serde::option", default)]
    pub price_feed: Option<Pubkey>,
    #[serde(with = "crate::amount_serde")]
    pub total_staked: u128,
    #[serde(with = "crate::amount_serde")]
    pub reward_reserve: u128,
    #[serde(with = "crate::amount_serde")]
    pub reward_per_share: u128,
    pub last_accrual_timestamp: u64,
    #[serde(with = "crate::amount_serde")]
    pub initial_reserve: u128,
    #[serde(with = "crate::amount_serde")]
    pub total_emitted: u128,
    #[serde(with = "crate::amount_serde")]
    pub total_reward_paid: u128,
    pub participants: Vec<ParticipantEntry>,
    pub pending_payouts: Vec<PendingPayoutEntry>,
    pub config: PoolConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantEntry {
    #[serde(with = "crate::pubkey_serde")]
    pub participant: Pubkey,
    pub stake: Participant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayoutEntry {
    #[serde(with = "crate::pubkey_serde")]
    pub participant: Pubkey,
    pub payout: PendingPayout,
}
