//! In-process collaborators: a balance book that implements [`TokenLedger`]
//! and a settable [`PriceOracle`]. Both serialize so a whole deployment can
//! live in one state file.

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{Mutex, MutexGuard, PoisonError},
};

use eth_stake::{Asset, LedgerError, OracleError, PriceOracle, PriceQuote, TokenLedger};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

// ─── Ledger ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Book {
    balances: HashMap<(Asset, Pubkey), u128>,
    allowances: HashMap<(Asset, Pubkey, Pubkey), u128>,
}

/// Fungible balances for the native asset and any number of tokens.
#[derive(Default)]
pub struct LocalLedger {
    book: Mutex<Book>,
}

impl LocalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credit `amount` out of thin air (faucet for local pools and tests).
    pub fn mint(&self, asset: Asset, owner: &Pubkey, amount: u128) -> Result<(), LedgerError> {
        let mut book = self.book();
        let balance = book.balances.entry((asset, *owner)).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| overflow(asset, owner))?;
        debug!(%asset, %owner, amount, "Minted");
        Ok(())
    }

    pub fn allowance(&self, asset: Asset, owner: &Pubkey, spender: &Pubkey) -> u128 {
        self.book()
            .allowances
            .get(&(asset, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let book = Book {
            balances: snapshot
                .balances
                .into_iter()
                .map(|b| ((b.asset.0, b.owner), b.amount))
                .collect(),
            allowances: snapshot
                .allowances
                .into_iter()
                .map(|a| ((a.asset.0, a.owner, a.spender), a.amount))
                .collect(),
        };
        Self { book: Mutex::new(book) }
    }

    /// Non-zero balances and allowances, sorted for stable output.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let book = self.book();
        let mut balances: Vec<BalanceEntry> = book
            .balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(&(asset, owner), &amount)| BalanceEntry {
                asset: AssetKey(asset),
                owner,
                amount,
            })
            .collect();
        balances.sort_by_key(|b| (b.asset.0, b.owner));

        let mut allowances: Vec<AllowanceEntry> = book
            .allowances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(&(asset, owner, spender), &amount)| AllowanceEntry {
                asset: AssetKey(asset),
                owner,
                spender,
                amount,
            })
            .collect();
        allowances.sort_by_key(|a| (a.asset.0, a.owner, a.spender));

        LedgerSnapshot { balances, allowances }
    }
}

fn move_balance(
    book: &mut Book,
    asset: Asset,
    from: &Pubkey,
    to: &Pubkey,
    amount: u128,
) -> Result<(), LedgerError> {
    let available = book.balances.get(&(asset, *from)).copied().unwrap_or(0);
    if available < amount {
        return Err(LedgerError::InsufficientBalance {
            asset,
            owner: *from,
            needed: amount,
            available,
        });
    }
    if from == to {
        return Ok(());
    }
    let credited = book
        .balances
        .get(&(asset, *to))
        .copied()
        .unwrap_or(0)
        .checked_add(amount)
        .ok_or_else(|| overflow(asset, to))?;
    book.balances.insert((asset, *from), available - amount);
    book.balances.insert((asset, *to), credited);
    Ok(())
}

fn overflow(asset: Asset, owner: &Pubkey) -> LedgerError {
    LedgerError::Unavailable(format!("{asset} balance of {owner} overflows"))
}

impl TokenLedger for LocalLedger {
    fn balance_of(&self, asset: Asset, owner: &Pubkey) -> u128 {
        self.book().balances.get(&(asset, *owner)).copied().unwrap_or(0)
    }

    fn transfer(
        &self,
        asset: Asset,
        from: &Pubkey,
        to: &Pubkey,
        amount: u128,
    ) -> Result<(), LedgerError> {
        move_balance(&mut self.book(), asset, from, to, amount)?;
        debug!(%asset, %from, %to, amount, "Transfer");
        Ok(())
    }

    fn approve(
        &self,
        asset: Asset,
        owner: &Pubkey,
        spender: &Pubkey,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.book().allowances.insert((asset, *owner, *spender), amount);
        debug!(%asset, %owner, %spender, amount, "Approve");
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
        let mut book = self.book();
        let key = (asset, *from, *spender);
        let approved = book.allowances.get(&key).copied().unwrap_or(0);
        if approved < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: *from,
                spender: *spender,
                needed: amount,
                approved,
            });
        }
        move_balance(&mut book, asset, from, to, amount)?;
        book.allowances.insert(key, approved - amount);
        debug!(%asset, %spender, %from, %to, amount, "TransferFrom");
        Ok(())
    }
}

// ─── Ledger snapshot ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
    #[serde(default)]
    pub allowances: Vec<AllowanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub asset: AssetKey,
    #[serde(with = "eth_stake::pubkey_serde")]
    pub owner: Pubkey,
    #[serde(with = "eth_stake::amount_serde")]
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceEntry {
    pub asset: AssetKey,
    #[serde(with = "eth_stake::pubkey_serde")]
    pub owner: Pubkey,
    #[serde(with = "eth_stake::pubkey_serde")]
    pub spender: Pubkey,
    #[serde(with = "eth_stake::amount_serde")]
    pub amount: u128,
}

/// [`Asset`] as it appears in JSON: `"native"` or the token mint in base-58.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetKey(pub Asset);

impl Serialize for AssetKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AssetKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "native" {
            return Ok(AssetKey(Asset::Native));
        }
        Pubkey::from_str(&s)
            .map(|mint| AssetKey(Asset::Token(mint)))
            .map_err(|e| serde::de::Error::custom(format!("invalid asset '{s}': {e}")))
    }
}

// ─── Price oracle ─────────────────────────────────────────────────────────────

/// Oracle that serves one operator-set quote for every feed and pair.
#[derive(Default)]
pub struct FixedPriceOracle {
    quote: Mutex<Option<PriceQuote>>,
}

impl FixedPriceOracle {
    pub fn new(quote: Option<PriceQuote>) -> Self {
        Self { quote: Mutex::new(quote) }
    }

    pub fn set(&self, quote: PriceQuote) {
        *self.quote.lock().unwrap_or_else(PoisonError::into_inner) = Some(quote);
    }

    pub fn current(&self) -> Option<PriceQuote> {
        *self.quote.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PriceOracle for FixedPriceOracle {
    fn latest_price(&self, feed: &Pubkey, pair: &str) -> Result<PriceQuote, OracleError> {
        self.current().ok_or_else(|| OracleError::NoQuote { feed: *feed, pair: pair.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_from_spends_allowance() {
        let ledger = LocalLedger::new();
        let token = Asset::Token(Pubkey::new_unique());
        let (owner, vault) = (Pubkey::new_unique(), Pubkey::new_unique());
        ledger.mint(token, &owner, 100).unwrap();
        ledger.approve(token, &owner, &vault, 60).unwrap();

        ledger.transfer_from(token, &vault, &owner, &vault, 40).unwrap();
        assert_eq!(ledger.balance_of(token, &vault), 40);
        assert_eq!(ledger.allowance(token, &owner, &vault), 20);

        let err = ledger.transfer_from(token, &vault, &owner, &vault, 21).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { approved: 20, .. }));
        assert_eq!(ledger.balance_of(token, &owner), 60);
    }

    #[test]
    fn overdraft_moves_nothing() {
        let ledger = LocalLedger::new();
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        ledger.mint(Asset::Native, &a, 5).unwrap();
        let err = ledger.transfer(Asset::Native, &a, &b, 6).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { available: 5, .. }));
        assert_eq!(ledger.balance_of(Asset::Native, &a), 5);
        assert_eq!(ledger.balance_of(Asset::Native, &b), 0);
    }

    #[test]
    fn self_transfer_keeps_balance() {
        let ledger = LocalLedger::new();
        let a = Pubkey::new_unique();
        ledger.mint(Asset::Native, &a, 5).unwrap();
        ledger.transfer(Asset::Native, &a, &a, 3).unwrap();
        assert_eq!(ledger.balance_of(Asset::Native, &a), 5);
    }

    #[test]
    fn snapshot_survives_json() {
        let ledger = LocalLedger::new();
        let mint = Pubkey::new_unique();
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        ledger.mint(Asset::Native, &a, 7).unwrap();
        ledger.mint(Asset::Token(mint), &b, 9).unwrap();
        ledger.approve(Asset::Token(mint), &b, &a, 4).unwrap();

        let json = serde_json::to_string(&ledger.snapshot()).unwrap();
        assert!(json.contains("\"native\""));
        let restored = LocalLedger::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.snapshot(), ledger.snapshot());
        assert_eq!(restored.allowance(Asset::Token(mint), &b, &a), 4);
    }

    #[test]
    fn oracle_without_quote_reports_no_quote() {
        let oracle = FixedPriceOracle::default();
        let err = oracle.latest_price(&Pubkey::new_unique(), "ETH/USD").unwrap_err();
        assert!(matches!(err, OracleError::NoQuote { .. }));
    }
}
