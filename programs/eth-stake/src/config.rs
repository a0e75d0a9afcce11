//! Pool configuration.

use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    error::{Result, StakeError},
};

/// Tunables fixed for the lifetime of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Smallest accepted deposit, in wei.
    #[serde(with = "crate::amount_serde")]
    pub minimum_deposit: u128,
    /// Reward-token units emitted per elapsed second, split pro rata.
    #[serde(with = "crate::amount_serde")]
    pub emission_per_second: u128,
    /// Maximum quote age accepted by valuation reads; `None` disables the check.
    pub max_price_age_secs: Option<u64>,
    /// Label of the asset pair served by the price feed, e.g. `ETH/USD`.
    pub price_pair: String,
    pub base_decimals: u8,
    pub reward_decimals: u8,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            minimum_deposit: MINIMUM_DEPOSIT,
            emission_per_second: DEFAULT_EMISSION_PER_SECOND,
            max_price_age_secs: Some(DEFAULT_MAX_PRICE_AGE_SECS),
            price_pair: DEFAULT_PRICE_PAIR.to_string(),
            base_decimals: BASE_DECIMALS,
            reward_decimals: DEFAULT_REWARD_DECIMALS,
        }
    }
}

impl PoolConfig {
    pub fn with_emission_per_second(mut self, emission_per_second: u128) -> Self {
        self.emission_per_second = emission_per_second;
        self
    }

    pub fn with_minimum_deposit(mut self, minimum_deposit: u128) -> Self {
        self.minimum_deposit = minimum_deposit;
        self
    }

    pub fn with_max_price_age(mut self, max_price_age_secs: Option<u64>) -> Self {
        self.max_price_age_secs = max_price_age_secs;
        self
    }

    /// Reject configurations the accounting cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.minimum_deposit == 0 {
            return Err(StakeError::InvalidConfig(
                "minimum_deposit must be greater than zero".into(),
            ));
        }
        if self.price_pair.trim().is_empty() {
            return Err(StakeError::InvalidConfig("price_pair must not be empty".into()));
        }
        // 10^38 is the largest power of ten a u128 holds
        if self.base_decimals > 38 || self.reward_decimals > 38 {
            return Err(StakeError::InvalidConfig(format!(
                "decimals must be at most 38 (base={}, reward={})",
                self.base_decimals, self.reward_decimals
            )));
        }
        Ok(())
    }
}
