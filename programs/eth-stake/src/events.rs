use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

/// Observability events, in the order the pool committed them.
///
/// Every event is also logged through `tracing`; the buffered copies can be
/// collected with [`crate::StakePool::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeEvent {
    Initialized {
        #[serde(with = "crate::pubkey_serde")]
        reward_token: Pubkey,
        #[serde(with = "crate::pubkey_serde")]
        price_feed: Pubkey,
        #[serde(with = "crate::amount_serde")]
        reserve: u128,
    },
    Deposited {
        #[serde(with = "crate::pubkey_serde")]
        participant: Pubkey,
        #[serde(with = "crate::amount_serde")]
        amount: u128,
        timestamp: u64,
    },
    Withdrawn {
        #[serde(with = "crate::pubkey_serde")]
        participant: Pubkey,
        #[serde(with = "crate::amount_serde")]
        amount: u128,
        #[serde(with = "crate::amount_serde")]
        reward_paid: u128,
    },
    PayoutDeferred {
        #[serde(with = "crate::pubkey_serde")]
        participant: Pubkey,
        #[serde(with = "crate::amount_serde")]
        principal: u128,
        #[serde(with = "crate::amount_serde")]
        reward: u128,
        attempts: u32,
    },
}
