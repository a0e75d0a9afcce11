//! ETH-Stake — single-asset staking pool with time-weighted reward accrual.
//!
//! Operations (all on [`StakePool`]):
//!   initialize    — owner seeds the reward reserve and names token + price feed
//!   deposit       — stake at least the minimum; top-ups carry earned reward
//!   withdraw      — full exit: principal back in ETH, reward in the reward token
//!   retry_payout  — replay a withdrawal whose ledger transfer failed
//!
//! Reward accrues per second from the reserve into a Q64.64 reward-per-share
//! accumulator and is split pro rata across staked principal.

pub mod amount_serde;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod instructions;
pub mod oracle;
pub mod pool;
pub mod pubkey_serde;
pub mod state;

pub use config::PoolConfig;
pub use error::{Result, StakeError};
pub use events::StakeEvent;
pub use instructions::{DepositReceipt, WithdrawReceipt};
pub use oracle::{Asset, LedgerError, OracleError, PriceOracle, PriceQuote, TokenLedger};
pub use pool::{PositionValue, PositionView, StakePool};
pub use state::{Lifecycle, Participant, PendingPayout, PoolSnapshot, PoolState};
