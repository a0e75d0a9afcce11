//! Seams to the external collaborators: the token ledger that moves value and
//! the price oracle that values it. The engine calls through these traits and
//! never implements them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::{
    error::{Result, StakeError},
    instructions::reward_math::mul_div_floor,
};

// ─── Ledger ───────────────────────────────────────────────────────────────────

/// A balance the ledger can move: the staked base asset or an SPL-style token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    Native,
    Token(Pubkey),
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(mint) => write!(f, "{mint}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient {asset} balance for {owner}: need {needed}, have {available}")]
    InsufficientBalance {
        asset: Asset,
        owner: Pubkey,
        needed: u128,
        available: u128,
    },

    #[error("insufficient allowance from {owner} to {spender}: need {needed}, approved {approved}")]
    InsufficientAllowance {
        owner: Pubkey,
        spender: Pubkey,
        needed: u128,
        approved: u128,
    },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Fungible balance store. Each call either moves the full amount or fails
/// without moving anything.
pub trait TokenLedger: Send + Sync {
    fn balance_of(&self, asset: Asset, owner: &Pubkey) -> u128;

    fn transfer(
        &self,
        asset: Asset,
        from: &Pubkey,
        to: &Pubkey,
        amount: u128,
    ) -> std::result::Result<(), LedgerError>;

    fn approve(
        &self,
        asset: Asset,
        owner: &Pubkey,
        spender: &Pubkey,
        amount: u128,
    ) -> std::result::Result<(), LedgerError>;

    fn transfer_from(
        &self,
        asset: Asset,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u128,
    ) -> std::result::Result<(), LedgerError>;
}

impl<T: TokenLedger + ?Sized> TokenLedger for Arc<T> {
    fn balance_of(&self, asset: Asset, owner: &Pubkey) -> u128 {
        (**self).balance_of(asset, owner)
    }

    fn transfer(
        &self,
        asset: Asset,
        from: &Pubkey,
        to: &Pubkey,
        amount: u128,
    ) -> std::result::Result<(), LedgerError> {
        (**self).transfer(asset, from, to, amount)
    }

    fn approve(
        &self,
        asset: Asset,
        owner: &Pubkey,
        spender: &Pubkey,
        amount: u128,
    ) -> std::result::Result<(), LedgerError> {
        (**self).approve(asset, owner, spender, amount)
    }

    fn transfer_from(
        &self,
        asset: Asset,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u128,
    ) -> std::result::Result<(), LedgerError> {
        (**self).transfer_from(asset, spender, from, to, amount)
    }
}

// ─── Price oracle ─────────────────────────────────────────────────────────────

/// One oracle reading: `rate / 10^decimals` quote units per whole base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    #[serde(with = "crate::amount_serde")]
    pub rate: u128,
    pub decimals: u8,
    /// Unix seconds at which the feed published this rate.
    pub published_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("price feed {feed} has no quote for {pair}")]
    NoQuote { feed: Pubkey, pair: String },

    #[error("price feed unavailable: {0}")]
    Unavailable(String),
}

/// Read-only price source.
pub trait PriceOracle: Send + Sync {
    fn latest_price(
        &self,
        feed: &Pubkey,
        pair: &str,
    ) -> std::result::Result<PriceQuote, OracleError>;
}

impl<T: PriceOracle + ?Sized> PriceOracle for Arc<T> {
    fn latest_price(
        &self,
        feed: &Pubkey,
        pair: &str,
    ) -> std::result::Result<PriceQuote, OracleError> {
        (**self).latest_price(feed, pair)
    }
}

// ─── Adapter helpers ──────────────────────────────────────────────────────────

/// Fetch a quote and refuse it if it is older than `max_age` seconds or
/// claims to be published after `now`.
pub fn fresh_quote<O: PriceOracle + ?Sized>(
    oracle: &O,
    feed: &Pubkey,
    pair: &str,
    now: u64,
    max_age: Option<u64>,
) -> Result<PriceQuote> {
    let quote = oracle.latest_price(feed, pair)?;
    if let Some(max_age) = max_age {
        let age = now.checked_sub(quote.published_at);
        if age.map_or(true, |age| age > max_age) {
            return Err(StakeError::StalePrice {
                pair: pair.to_string(),
                published_at: quote.published_at,
                now,
                max_age,
            });
        }
    }
    Ok(quote)
}

/// Value `amount` base-asset atomic units in quote-token atomic units.
///
/// `value = amount * rate * 10^quote_decimals / 10^(base_decimals + quote.decimals)`,
/// rounded down.
pub fn quote_value(
    amount: u128,
    base_decimals: u8,
    quote: &PriceQuote,
    quote_decimals: u8,
) -> Result<u128> {
    let down = base_decimals as u32 + quote.decimals as u32;
    let up = quote_decimals as u32;
    if down >= up {
        let divisor = 10u128
            .checked_pow(down - up)
            .ok_or(StakeError::MathOverflow)?;
        mul_div_floor(amount, quote.rate, divisor).ok_or(StakeError::MathOverflow)
    } else {
        let factor = 10u128
            .checked_pow(up - down)
            .ok_or(StakeError::MathOverflow)?;
        amount
            .checked_mul(quote.rate)
            .and_then(|v| v.checked_mul(factor))
            .ok_or(StakeError::MathOverflow)
    }
}
