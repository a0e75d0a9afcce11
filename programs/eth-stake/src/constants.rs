/// Base asset (ETH) decimals: 1 ETH = 10^18 wei
pub const BASE_DECIMALS: u8 = 18;
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Deposits below 5 ETH are rejected
pub const MINIMUM_DEPOSIT: u128 = 5 * WEI_PER_ETH;

/// Reward-token atomic units released per second while anything is staked
pub const DEFAULT_EMISSION_PER_SECOND: u128 = 1_000_000;

/// Reward token decimals (devUSD-style 8-decimal stable)
pub const DEFAULT_REWARD_DECIMALS: u8 = 8;

/// Oracle quotes older than this are refused for valuation
pub const DEFAULT_MAX_PRICE_AGE_SECS: u64 = 3_600;

pub const DEFAULT_PRICE_PAIR: &str = "ETH/USD";

/// Q64.64 fixed-point scale (reward-per-share accumulator)
pub const Q64: u128 = 1u128 << 64;
