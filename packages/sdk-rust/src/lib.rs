//! ETH-Stake Rust SDK
//!
//! Runs an [`eth_stake::StakePool`] against an in-process token ledger and a
//! settable price oracle, and persists the whole deployment to one JSON file.
//!
//! # Feature Overview
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`StakeClient::reconfigure`] | Swap the config of a pool that never went live |
//! | [`StakeClient::initialize`] | Seed the reward reserve (after [`StakeClient::approve_reserve`]) |
//! | [`StakeClient::deposit`] | Move wei into the vault and record the stake |
//! | [`StakeClient::withdraw`] | Full exit: principal plus accrued reward |
//! | [`StakeClient::retry_payout`] | Replay a payout the ledger refused |
//! | [`StakeClient::pool_info`] | Totals, reserve, accumulator, config |
//! | [`StakeClient::position`] | One participant's stake, reward and valuation |
//! | [`StakeClient::balances`] | Ledger balances for an address |

pub mod client;
pub mod error;
pub mod local;
pub mod store;
pub mod types;

pub use client::{unix_now, LocalPool, StakeClient};
pub use error::{Error, Result};
pub use local::{FixedPriceOracle, LedgerSnapshot, LocalLedger};
pub use store::{StateFile, DEFAULT_STATE_PATH};
pub use types::*;
