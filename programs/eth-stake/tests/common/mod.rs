#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use eth_stake::{
    constants::WEI_PER_ETH, Asset, LedgerError, OracleError, PoolConfig, PriceOracle, PriceQuote,
    StakePool, TokenLedger,
};
use solana_sdk::pubkey::Pubkey;

pub const T0: u64 = 1_700_000_000;
pub const RESERVE: u128 = 50_000_000_000_000;

/// In-memory ledger with switches to make either leg of a payout fail.
#[derive(Default)]
pub struct MockLedger {
    balances: Mutex<HashMap<(Asset, Pubkey), u128>>,
    allowances: Mutex<HashMap<(Asset, Pubkey, Pubkey), u128>>,
    pub fail_native: AtomicBool,
    pub fail_token: AtomicBool,
}

impl MockLedger {
    pub fn mint(&self, asset: Asset, owner: &Pubkey, amount: u128) {
        *self.balances.lock().unwrap().entry((asset, *owner)).or_default() += amount;
    }

    pub fn set_failing(&self, native: bool, token: bool) {
        self.fail_native.store(native, Ordering::SeqCst);
        self.fail_token.store(token, Ordering::SeqCst);
    }

    fn check_online(&self, asset: Asset) -> Result<(), LedgerError> {
        let down = match asset {
            Asset::Native => self.fail_native.load(Ordering::SeqCst),
            Asset::Token(_) => self.fail_token.load(Ordering::SeqCst),
        };
        if down {
            return Err(LedgerError::Unavailable(format!("{asset} transfers halted")));
        }
        Ok(())
    }

    fn debit_credit(&self, asset: Asset, from: &Pubkey, to: &Pubkey, amount: u128) -> Result<(), LedgerError> {
        let mut balances = self.balances.lock().unwrap();
        let available = balances.get(&(asset, *from)).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientBalance { asset, owner: *from, needed: amount, available });
        }
        balances.insert((asset, *from), available - amount);
        *balances.entry((asset, *to)).or_default() += amount;
        Ok(())
    }
}

impl TokenLedger for MockLedger {
    fn balance_of(&self, asset: Asset, owner: &Pubkey) -> u128 {
        self.balances.lock().unwrap().get(&(asset, *owner)).copied().unwrap_or(0)
    }

    fn transfer(&self, asset: Asset, from: &Pubkey, to: &Pubkey, amount: u128) -> Result<(), LedgerError> {
        self.check_online(asset)?;
        self.debit_credit(asset, from, to, amount)
    }

    fn approve(&self, asset: Asset, owner: &Pubkey, spender: &Pubkey, amount: u128) -> Result<(), LedgerError> {
        self.allowances.lock().unwrap().insert((asset, *owner, *spender), amount);
        Ok(())
    }

    fn transfer_from(
        &self,
        asset: Asset,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.check_online(asset)?;
        let key = (asset, *from, *spender);
        let approved = self.allowances.lock().unwrap().get(&key).copied().unwrap_or(0);
        if approved < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: *from,
                spender: *spender,
                needed: amount,
                approved,
            });
        }
        self.debit_credit(asset, from, to, amount)?;
        self.allowances.lock().unwrap().insert(key, approved - amount);
        Ok(())
    }
}

/// Oracle returning whatever quote was last set.
#[derive(Default)]
pub struct MockOracle {
    quote: Mutex<Option<PriceQuote>>,
}

impl MockOracle {
    pub fn set(&self, quote: PriceQuote) {
        *self.quote.lock().unwrap() = Some(quote);
    }
}

impl PriceOracle for MockOracle {
    fn latest_price(&self, feed: &Pubkey, pair: &str) -> Result<PriceQuote, OracleError> {
        (*self.quote.lock().unwrap()).ok_or_else(|| OracleError::NoQuote { feed: *feed, pair: pair.to_string() })
    }
}

pub struct Harness {
    pub pool: StakePool<MockLedger, MockOracle>,
    pub owner: Pubkey,
    pub vault: Pubkey,
    pub reward_token: Pubkey,
    pub price_feed: Pubkey,
}

impl Harness {
    pub fn uninitialized(config: PoolConfig) -> Self {
        let owner = Pubkey::new_unique();
        let vault = Pubkey::new_unique();
        let pool = StakePool::new(owner, vault, config, MockLedger::default(), MockOracle::default()).unwrap();
        Self { pool, owner, vault, reward_token: Pubkey::new_unique(), price_feed: Pubkey::new_unique() }
    }

    /// A live pool whose vault holds `reserve` reward tokens.
    pub fn live(config: PoolConfig, reserve: u128) -> Self {
        let h = Self::uninitialized(config);
        let token = Asset::Token(h.reward_token);
        h.pool.ledger().mint(token, &h.owner, reserve);
        h.pool.ledger().approve(token, &h.owner, &h.vault, reserve).unwrap();
        h.pool.initialize(&h.owner, h.reward_token, h.price_feed, reserve).unwrap();
        h
    }

    /// Put `amount` wei in pool custody on the participant's behalf, then record it.
    pub fn stake(&self, who: &Pubkey, amount: u128, now: u64) {
        self.pool.ledger().mint(Asset::Native, &self.vault, amount);
        self.pool.deposit(who, amount, now).unwrap();
    }

    pub fn eth(&self, who: &Pubkey) -> u128 {
        self.pool.ledger().balance_of(Asset::Native, who)
    }

    pub fn reward(&self, who: &Pubkey) -> u128 {
        self.pool.ledger().balance_of(Asset::Token(self.reward_token), who)
    }
}

pub fn eth(n: u128) -> u128 {
    n * WEI_PER_ETH
}
