//! Engine error type.

use solana_sdk::pubkey::Pubkey;

use crate::oracle::{LedgerError, OracleError};

/// Every failure a pool operation can report.
///
/// All variants except [`StakeError::PayoutFailed`] leave the pool state
/// exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakeError {
    // ── Caller-recoverable ───────────────────────────────────────────────────
    #[error("eth value too low: {amount} wei is below the {minimum} wei minimum")]
    BelowMinimum { amount: u128, minimum: u128 },

    #[error("sender did not stake any eth")]
    NoStake,

    #[error("pool already initialized")]
    AlreadyInitialized,

    #[error("pool is not initialized")]
    NotInitialized,

    #[error("{caller} is not the pool owner")]
    Unauthorized { caller: Pubkey },

    // ── Clock ────────────────────────────────────────────────────────────────
    #[error("timestamp {now} precedes the last accrual checkpoint {last}")]
    TimeTravel { now: u64, last: u64 },

    // ── Settlement ───────────────────────────────────────────────────────────
    /// The withdrawal is committed; the entitlement stays buffered for
    /// [`crate::StakePool::retry_payout`].
    #[error("payout to {participant} failed (principal={principal}, reward={reward}): {source}")]
    PayoutFailed {
        participant: Pubkey,
        principal: u128,
        reward: u128,
        source: LedgerError,
    },

    #[error("no pending payout for {0}")]
    NoPendingPayout(Pubkey),

    #[error("a payout for {0} is still unsettled; retry it before withdrawing again")]
    PayoutPending(Pubkey),

    #[error("a payout for {0} is already being executed")]
    PayoutInFlight(Pubkey),

    // ── External collaborators ───────────────────────────────────────────────
    #[error("price for {pair} is stale: published at {published_at}, now {now}, max age {max_age}s")]
    StalePrice {
        pair: String,
        published_at: u64,
        now: u64,
        max_age: u64,
    },

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // ── Internal ─────────────────────────────────────────────────────────────
    #[error("Math overflow")]
    MathOverflow,

    #[error("invalid pool config: {0}")]
    InvalidConfig(String),

    #[error("pool invariant violated: {0}")]
    InvariantViolation(String),
}

/// Convenience alias so every module can write `Result<T>`.
pub type Result<T> = std::result::Result<T, StakeError>;
