//! `StakePool`: the single-writer service that owns a pool's state and talks
//! to the ledger and oracle.
//!
//! Every mutation runs inside one critical section. Ledger and oracle calls
//! happen only after the state change is committed and the lock is released;
//! the outcome is then recorded under a fresh lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, error, warn};

use crate::{
    config::PoolConfig,
    error::{Result, StakeError},
    events::StakeEvent,
    instructions::{
        deposit, initialize,
        payout::{self, PayoutProgress, Settlement},
        reward_math::{accrue, pending_reward},
        withdraw, DepositReceipt, WithdrawReceipt,
    },
    oracle::{fresh_quote, quote_value, Asset, PriceOracle, PriceQuote, TokenLedger},
    state::{Lifecycle, Participant, PendingPayout, PoolSnapshot, PoolState},
};

struct Inner {
    state: PoolState,
    events: Vec<StakeEvent>,
}

/// A participant's position valued at an oracle quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionValue {
    /// Wei staked
    #[serde(with = "crate::amount_serde")]
    pub principal: u128,
    /// Reward-token units owed if the participant withdrew at `now`
    #[serde(with = "crate::amount_serde")]
    pub pending_reward: u128,
    pub price: PriceQuote,
    /// Principal in reward-token units
    #[serde(with = "crate::amount_serde")]
    pub principal_value: u128,
    #[serde(with = "crate::amount_serde")]
    pub total_value: u128,
}

/// Everything known about one participant, read under a single lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionView {
    /// Zeroed when the participant has no active stake
    pub stake: Participant,
    /// Reward owed as of the last checkpoint
    pub pending_reward: u128,
    /// Reward owed if the pool checkpointed at `as_of`
    pub projected_reward: u128,
    pub as_of: u64,
    pub pending_payout: Option<PendingPayout>,
    pub price_feed: Option<Pubkey>,
}

pub struct StakePool<L, O> {
    config: PoolConfig,
    ledger: L,
    oracle: O,
    inner: Mutex<Inner>,
}

impl<L: TokenLedger, O: PriceOracle> StakePool<L, O> {
    /// A fresh, uninitialized pool. `vault` is the custody address the ledger
    /// holds staked ETH and the reward reserve under.
    pub fn new(
        owner: Pubkey,
        vault: Pubkey,
        config: PoolConfig,
        ledger: L,
        oracle: O,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_state(PoolState::new(owner, vault), config, ledger, oracle))
    }

    /// Restore a pool from a snapshot taken with [`StakePool::snapshot`].
    pub fn from_snapshot(snapshot: PoolSnapshot, ledger: L, oracle: O) -> Result<Self> {
        let (state, config) = PoolState::from_snapshot(snapshot)?;
        Ok(Self::with_state(state, config, ledger, oracle))
    }

    fn with_state(state: PoolState, config: PoolConfig, ledger: L, oracle: O) -> Self {
        Self {
            config,
            ledger,
            oracle,
            inner: Mutex::new(Inner { state, events: Vec::new() }),
        }
    }

    // A panic while holding the lock cannot leave a half-written state: every
    // handler computes on locals before its first write.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Operations ──────────────────────────────────────────────────────────

    /// One-time setup: record the reward token and price feed, then pull
    /// `reserve` reward tokens from `caller` into the vault. The caller must
    /// be the owner and must have approved the vault beforehand.
    pub fn initialize(
        &self,
        caller: &Pubkey,
        reward_token: Pubkey,
        price_feed: Pubkey,
        reserve: u128,
    ) -> Result<()> {
        let vault = {
            let mut inner = self.lock();
            let begun = initialize::begin(&mut inner.state, caller, reward_token, price_feed);
            if let Err(e) = begun {
                log_rejection("initialize", &e);
                return Err(e);
            }
            inner.state.vault
        };

        let pulled = self.ledger.transfer_from(
            Asset::Token(reward_token),
            &vault,
            caller,
            &vault,
            reserve,
        );

        let mut inner = self.lock();
        match pulled {
            Ok(()) => {
                initialize::complete(&mut inner.state, reserve);
                inner.events.push(StakeEvent::Initialized { reward_token, price_feed, reserve });
                Ok(())
            }
            Err(e) => {
                initialize::abort(&mut inner.state);
                warn!(
                    %caller, reserve, error = %e,
                    "Reserve funding failed; pool left uninitialized"
                );
                Err(StakeError::Ledger(e))
            }
        }
    }

    /// Record `amount` wei staked by `participant` at `now`.
    pub fn deposit(&self, participant: &Pubkey, amount: u128, now: u64) -> Result<DepositReceipt> {
        let mut inner = self.lock();
        let Inner { state, events } = &mut *inner;
        match deposit::handler(state, &self.config, participant, amount, now) {
            Ok(receipt) => {
                events.push(StakeEvent::Deposited {
                    participant: *participant,
                    amount,
                    timestamp: now,
                });
                Ok(receipt)
            }
            Err(e) => {
                log_rejection("deposit", &e);
                Err(e)
            }
        }
    }

    /// Withdraw `participant`'s whole principal plus everything owed.
    ///
    /// The withdrawal is committed before any value moves. If the ledger then
    /// fails, the call returns [`StakeError::PayoutFailed`] and the payout
    /// stays buffered for [`StakePool::retry_payout`].
    pub fn withdraw(&self, participant: &Pubkey, now: u64) -> Result<WithdrawReceipt> {
        let (ticket, pending, vault, reward_token, price_feed) = {
            let mut inner = self.lock();
            let (reward_token, price_feed) =
                match (inner.state.reward_token, inner.state.price_feed) {
                    (Some(token), Some(feed)) => (token, feed),
                    _ => return Err(StakeError::NotInitialized),
                };
            let ticket = match withdraw::handler(&mut inner.state, &self.config, participant, now) {
                Ok(t) => t,
                Err(e) => {
                    log_rejection("withdraw", &e);
                    return Err(e);
                }
            };
            let pending = inner
                .state
                .pending_payouts
                .get(participant)
                .cloned()
                .unwrap_or_default();
            (ticket, pending, inner.state.vault, reward_token, price_feed)
        };

        let principal_quote = self.principal_quote(&price_feed, ticket.principal, now);

        self.run_payout(participant, pending, &vault, reward_token)?;
        Ok(WithdrawReceipt {
            participant: *participant,
            principal: ticket.principal,
            reward: ticket.reward,
            principal_quote,
            timestamp: now,
        })
    }

    /// Replay a buffered payout. Returns the payout once both legs went through.
    pub fn retry_payout(&self, participant: &Pubkey) -> Result<PendingPayout> {
        let (pending, vault, reward_token) = {
            let mut inner = self.lock();
            let pending = match payout::begin_retry(&mut inner.state, participant) {
                Ok(p) => p,
                Err(e) => {
                    log_rejection("retry_payout", &e);
                    return Err(e);
                }
            };
            let reward_token = inner.state.reward_token.ok_or(StakeError::NotInitialized)?;
            (pending, inner.state.vault, reward_token)
        };
        debug!(%participant, attempts = pending.attempts, "Retrying payout");
        self.run_payout(participant, pending, &vault, reward_token)
    }

    // Principal leg first, then the reward leg. Runs without the lock.
    fn run_payout(
        &self,
        participant: &Pubkey,
        pending: PendingPayout,
        vault: &Pubkey,
        reward_token: Pubkey,
    ) -> Result<PendingPayout> {
        let mut progress = PayoutProgress { principal_paid: pending.principal_paid, error: None };

        if !progress.principal_paid {
            match self.ledger.transfer(Asset::Native, vault, participant, pending.principal) {
                Ok(()) => progress.principal_paid = true,
                Err(e) => progress.error = Some(e),
            }
        }
        if progress.error.is_none() && pending.reward > 0 {
            let paid = self.ledger.transfer(
                Asset::Token(reward_token),
                vault,
                participant,
                pending.reward,
            );
            if let Err(e) = paid {
                progress.error = Some(e);
            }
        }

        let mut inner = self.lock();
        let Inner { state, events } = &mut *inner;
        match payout::settle(state, participant, progress)? {
            Settlement::Completed(done) => {
                events.push(StakeEvent::Withdrawn {
                    participant: *participant,
                    amount: done.principal,
                    reward_paid: done.reward,
                });
                Ok(done)
            }
            Settlement::Deferred(left, source) => {
                events.push(StakeEvent::PayoutDeferred {
                    participant: *participant,
                    principal: left.principal,
                    reward: left.reward,
                    attempts: left.attempts,
                });
                Err(StakeError::PayoutFailed {
                    participant: *participant,
                    principal: left.principal,
                    reward: left.reward,
                    source,
                })
            }
        }
    }

    // Best-effort valuation for a receipt; a bad price never blocks a withdrawal.
    fn principal_quote(&self, feed: &Pubkey, principal: u128, now: u64) -> Option<u128> {
        let valued = self
            .current_quote(feed, now)
            .and_then(|q| self.value_principal(principal, &q));
        match valued {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    pair = %self.config.price_pair, error = %e,
                    "Could not value withdrawn principal"
                );
                None
            }
        }
    }

    fn current_quote(&self, feed: &Pubkey, now: u64) -> Result<PriceQuote> {
        let max_age = self.config.max_price_age_secs;
        fresh_quote(&self.oracle, feed, &self.config.price_pair, now, max_age)
    }

    fn value_principal(&self, principal: u128, quote: &PriceQuote) -> Result<u128> {
        let config = &self.config;
        quote_value(principal, config.base_decimals, quote, config.reward_decimals)
    }

    // ─── Reads ───────────────────────────────────────────────────────────────
    // Reads copy out of the lock and never trigger accrual.

    pub fn owner(&self) -> Pubkey {
        self.lock().state.owner
    }

    pub fn vault(&self) -> Pubkey {
        self.lock().state.vault
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lock().state.lifecycle
    }

    pub fn reward_token(&self) -> Option<Pubkey> {
        self.lock().state.reward_token
    }

    pub fn price_feed(&self) -> Option<Pubkey> {
        self.lock().state.price_feed
    }

    pub fn total_staked(&self) -> u128 {
        self.lock().state.total_staked
    }

    /// Timestamp of the last accrual checkpoint; 0 before the first deposit.
    pub fn latest_reward_timestamp(&self) -> u64 {
        self.lock().state.last_accrual_timestamp
    }

    /// Reward-token units left in the reserve.
    pub fn stake_rewards(&self) -> u128 {
        self.lock().state.reward_reserve
    }

    pub fn reward_per_share(&self) -> u128 {
        self.lock().state.reward_per_share
    }

    pub fn participant(&self, id: &Pubkey) -> Option<Participant> {
        self.lock().state.participants.get(id).copied()
    }

    /// Reward owed to `id` as of the last checkpoint.
    pub fn pending_reward(&self, id: &Pubkey) -> Result<u128> {
        let inner = self.lock();
        pending_reward(&inner.state.participant(id), inner.state.reward_per_share)
    }

    /// Reward `id` would be owed if the pool checkpointed at `now`.
    /// Nothing is written.
    pub fn projected_reward(&self, id: &Pubkey, now: u64) -> Result<u128> {
        let inner = self.lock();
        projected(&inner.state, &self.config, id, now)
    }

    pub fn pending_payout(&self, id: &Pubkey) -> Option<PendingPayout> {
        self.lock().state.pending_payouts.get(id).cloned()
    }

    /// Stake, rewards and any buffered payout of `id`, all from one
    /// consistent state.
    pub fn position_view(&self, id: &Pubkey, now: u64) -> Result<PositionView> {
        let inner = self.lock();
        let state = &inner.state;
        let stake = state.participant(id);
        Ok(PositionView {
            stake,
            pending_reward: pending_reward(&stake, state.reward_per_share)?,
            projected_reward: projected(state, &self.config, id, now)?,
            as_of: now,
            pending_payout: state.pending_payouts.get(id).cloned(),
            price_feed: state.price_feed,
        })
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.lock().state.to_snapshot(&self.config)
    }

    pub fn check_invariants(&self) -> Result<()> {
        self.lock().state.check_invariants()
    }

    /// Take every event buffered since the last drain, oldest first.
    pub fn drain_events(&self) -> Vec<StakeEvent> {
        std::mem::take(&mut self.lock().events)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Value `id`'s principal and projected reward at the oracle's current
    /// quote. Fails with `StalePrice` rather than valuing at an old rate.
    pub fn position_value(&self, id: &Pubkey, now: u64) -> Result<PositionValue> {
        let view = self.position_view(id, now)?;
        self.value_position(&view)
    }

    /// Value a view taken with [`StakePool::position_view`] at the oracle's
    /// current quote, as of the view's timestamp.
    pub fn value_position(&self, view: &PositionView) -> Result<PositionValue> {
        let feed = view.price_feed.ok_or(StakeError::NotInitialized)?;
        if !view.stake.is_staked() {
            return Err(StakeError::NoStake);
        }
        let principal = view.stake.principal;
        let pending_reward = view.projected_reward;

        let price = self.current_quote(&feed, view.as_of)?;
        let principal_value = self.value_principal(principal, &price)?;
        let total_value = principal_value
            .checked_add(pending_reward)
            .ok_or(StakeError::MathOverflow)?;
        Ok(PositionValue { principal, pending_reward, price, principal_value, total_value })
    }
}

fn projected(state: &PoolState, config: &PoolConfig, id: &Pubkey, now: u64) -> Result<u128> {
    let accrual = accrue(
        now,
        state.total_staked,
        state.reward_reserve,
        state.reward_per_share,
        state.last_accrual_timestamp,
        config.emission_per_second,
    )?;
    pending_reward(&state.participant(id), accrual.reward_per_share)
}

fn log_rejection(op: &str, err: &StakeError) {
    match err {
        StakeError::TimeTravel { now, last } => {
            error!(op, now, last, "Clock went backwards; operation refused")
        }
        _ => warn!(op, error = %err, "Operation rejected"),
    }
}
