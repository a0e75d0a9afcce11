//! [`StakeClient`] — a pool wired to an in-process ledger and oracle, with
//! load/save against a JSON state file.

use std::{
    path::Path,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use eth_stake::{
    Asset, DepositReceipt, Lifecycle, PendingPayout, PoolConfig, PriceQuote, StakeError, StakePool,
    TokenLedger, WithdrawReceipt,
};
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    local::{FixedPriceOracle, LocalLedger},
    store::{self, StateFile},
    types::{Balances, PoolInfo, PositionInfo},
};

pub type LocalPool = StakePool<Arc<LocalLedger>, Arc<FixedPriceOracle>>;

// ─── Client ───────────────────────────────────────────────────────────────────

/// Local ETH-Stake deployment.
///
/// ```rust,no_run
/// # use eth_stake_sdk::{StakeClient, unix_now};
/// # use eth_stake::{Asset, PoolConfig};
/// # use solana_sdk::pubkey::Pubkey;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (owner, vault) = (Pubkey::new_unique(), Pubkey::new_unique());
/// let (token, feed) = (Pubkey::new_unique(), Pubkey::new_unique());
/// let client = StakeClient::create(owner, vault, PoolConfig::default())?;
///
/// client.fund(Asset::Token(token), &owner, 50_000_000_000_000)?;
/// client.approve_reserve(&owner, token, 50_000_000_000_000)?;
/// client.initialize(&owner, token, feed, 50_000_000_000_000)?;
///
/// let alice = Pubkey::new_unique();
/// client.fund(Asset::Native, &alice, 5_000_000_000_000_000_000)?;
/// client.deposit(&alice, 5_000_000_000_000_000_000, unix_now()?)?;
/// client.save("./eth-stake-state.json".as_ref())?;
/// # Ok(())
/// # }
/// ```
pub struct StakeClient {
    pool: LocalPool,
    ledger: Arc<LocalLedger>,
    oracle: Arc<FixedPriceOracle>,
}

impl StakeClient {
    /// A new, uninitialized pool with empty balances and no price.
    pub fn create(owner: Pubkey, vault: Pubkey, config: PoolConfig) -> Result<Self> {
        let ledger = Arc::new(LocalLedger::new());
        let oracle = Arc::new(FixedPriceOracle::default());
        let pool = StakePool::new(owner, vault, config, ledger.clone(), oracle.clone())?;
        Ok(Self { pool, ledger, oracle })
    }

    pub fn from_state(state: StateFile) -> Result<Self> {
        let ledger = Arc::new(LocalLedger::from_snapshot(state.ledger));
        let oracle = Arc::new(FixedPriceOracle::new(state.price));
        let pool = StakePool::from_snapshot(state.pool, ledger.clone(), oracle.clone())?;
        Ok(Self { pool, ledger, oracle })
    }

    /// Rebuild a pool that never went live around a new `config`, keeping
    /// its owner, vault, balances and price.
    pub fn reconfigure(self, config: PoolConfig) -> Result<Self> {
        if self.pool.lifecycle() != Lifecycle::Uninitialized {
            return Err(StakeError::AlreadyInitialized.into());
        }
        let mut state = self.to_state();
        state.pool.config = config;
        Self::from_state(state)
    }

    pub fn to_state(&self) -> StateFile {
        StateFile {
            pool: self.pool.snapshot(),
            ledger: self.ledger.snapshot(),
            price: self.oracle.current(),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::from_state(store::load(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        store::save(path, &self.to_state())
    }

    pub fn pool(&self) -> &LocalPool {
        &self.pool
    }

    pub fn ledger(&self) -> &LocalLedger {
        &self.ledger
    }

    // ── Write operations ──────────────────────────────────────────────────────

    /// Credit `amount` of `asset` to `owner` on the local ledger.
    pub fn fund(&self, asset: Asset, owner: &Pubkey, amount: u128) -> Result<()> {
        self.ledger.mint(asset, owner, amount)?;
        Ok(())
    }

    /// Let the pool vault pull up to `amount` reward tokens from `owner`.
    pub fn approve_reserve(
        &self,
        owner: &Pubkey,
        reward_token: Pubkey,
        amount: u128,
    ) -> Result<()> {
        self.ledger
            .approve(Asset::Token(reward_token), owner, &self.pool.vault(), amount)?;
        Ok(())
    }

    pub fn initialize(
        &self,
        caller: &Pubkey,
        reward_token: Pubkey,
        price_feed: Pubkey,
        reserve: u128,
    ) -> Result<()> {
        self.pool.initialize(caller, reward_token, price_feed, reserve)?;
        Ok(())
    }

    /// Move `amount` wei from `participant` into the vault, then record the
    /// stake. If the pool refuses the deposit, the wei is sent back.
    pub fn deposit(&self, participant: &Pubkey, amount: u128, now: u64) -> Result<DepositReceipt> {
        let vault = self.pool.vault();
        self.ledger.transfer(Asset::Native, participant, &vault, amount)?;

        match self.pool.deposit(participant, amount, now) {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                let refunded = self.ledger.transfer(Asset::Native, &vault, participant, amount);
                if let Err(refund) = refunded {
                    warn!(
                        %participant, amount, error = %refund,
                        "Refund of rejected deposit failed"
                    );
                }
                Err(e.into())
            }
        }
    }

    pub fn withdraw(&self, participant: &Pubkey, now: u64) -> Result<WithdrawReceipt> {
        Ok(self.pool.withdraw(participant, now)?)
    }

    pub fn retry_payout(&self, participant: &Pubkey) -> Result<PendingPayout> {
        Ok(self.pool.retry_payout(participant)?)
    }

    pub fn set_price(&self, quote: PriceQuote) {
        info!(
            rate = quote.rate,
            decimals = quote.decimals,
            published_at = quote.published_at,
            "Price set"
        );
        self.oracle.set(quote);
    }

    // ── Read operations ───────────────────────────────────────────────────────

    pub fn pool_info(&self) -> PoolInfo {
        let s = self.pool.snapshot();
        PoolInfo {
            owner: s.owner,
            vault: s.vault,
            lifecycle: s.lifecycle,
            reward_token: s.reward_token,
            price_feed: s.price_feed,
            total_staked: s.total_staked,
            stake_rewards: s.reward_reserve,
            latest_reward_timestamp: s.last_accrual_timestamp,
            reward_per_share: s.reward_per_share,
            initial_reserve: s.initial_reserve,
            total_emitted: s.total_emitted,
            total_reward_paid: s.total_reward_paid,
            participants: s.participants.len(),
            pending_payouts: s.pending_payouts.len(),
            config: s.config,
        }
    }

    /// Where `participant` stands at `now`. Valuation failures are reported
    /// in `value_error` rather than failing the read.
    pub fn position(&self, participant: &Pubkey, now: u64) -> Result<PositionInfo> {
        let view = self.pool.position_view(participant, now)?;
        let (value, value_error) = if view.stake.is_staked() {
            match self.pool.value_position(&view) {
                Ok(v) => (Some(v), None),
                Err(e) => (None, Some(e.to_string())),
            }
        } else {
            (None, None)
        };
        Ok(PositionInfo {
            participant: *participant,
            principal: view.stake.principal,
            pending_reward: view.pending_reward,
            projected_reward: view.projected_reward,
            as_of: view.as_of,
            pending_payout: view.pending_payout,
            value,
            value_error,
        })
    }

    pub fn balances(&self, owner: &Pubkey) -> Balances {
        Balances {
            owner: *owner,
            native: self.ledger.balance_of(Asset::Native, owner),
            reward: self
                .pool
                .reward_token()
                .map(|mint| self.ledger.balance_of(Asset::Token(mint), owner)),
        }
    }
}

/// Current wall-clock time in unix seconds.
pub fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| Error::InvalidArgument(format!("system clock is before 1970: {e}")))
}
