mod common;

use common::*;
use eth_stake::{
    constants::MINIMUM_DEPOSIT, Lifecycle, PoolConfig, PriceQuote, StakeError, StakeEvent,
};
use solana_sdk::pubkey::Pubkey;

#[test]
fn fresh_pool_reports_zero_state_after_initialize() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    assert_eq!(h.pool.lifecycle(), Lifecycle::Live);
    assert_eq!(h.pool.owner(), h.owner);
    assert_eq!(h.pool.latest_reward_timestamp(), 0);
    assert_eq!(h.pool.stake_rewards(), RESERVE);
    assert_eq!(h.pool.total_staked(), 0);
    assert_eq!(h.reward(&h.vault), RESERVE);
    assert_eq!(h.reward(&h.owner), 0);
    assert_eq!(
        h.pool.drain_events(),
        vec![StakeEvent::Initialized {
            reward_token: h.reward_token,
            price_feed: h.price_feed,
            reserve: RESERVE,
        }]
    );
}

#[test]
fn initialize_needs_owner_allowance_and_runs_once() {
    let h = Harness::uninitialized(PoolConfig::default());
    let err = h.pool.initialize(&h.owner, h.reward_token, h.price_feed, RESERVE).unwrap_err();
    assert!(matches!(err, StakeError::Ledger(_)), "{err}");
    assert_eq!(h.pool.lifecycle(), Lifecycle::Uninitialized);

    let stranger = Pubkey::new_unique();
    let err = h.pool.initialize(&stranger, h.reward_token, h.price_feed, RESERVE).unwrap_err();
    assert_eq!(err, StakeError::Unauthorized { caller: stranger });

    let h = Harness::live(PoolConfig::default(), RESERVE);
    let err = h.pool.initialize(&h.owner, h.reward_token, h.price_feed, 0).unwrap_err();
    assert_eq!(err, StakeError::AlreadyInitialized);
}

#[test]
fn sole_staker_collects_principal_and_all_emitted_reward() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let alice = Pubkey::new_unique();

    h.stake(&alice, eth(5), T0);
    assert_eq!(h.pool.total_staked(), eth(5));
    assert_eq!(h.pool.latest_reward_timestamp(), T0);

    let receipt = h.pool.withdraw(&alice, T0 + 100).unwrap();
    let emitted = 100 * PoolConfig::default().emission_per_second;
    assert_eq!(h.pool.total_staked(), 0);
    assert_eq!(receipt.principal, eth(5));
    assert!(receipt.reward <= emitted && emitted - receipt.reward <= 1);

    assert_eq!(h.eth(&alice), eth(5));
    assert_eq!(h.reward(&alice), receipt.reward);
    assert_eq!(h.pool.stake_rewards(), RESERVE - emitted);
    assert_eq!(h.reward(&h.vault), RESERVE - receipt.reward);
    assert!(h.pool.participant(&alice).is_none());
    h.pool.check_invariants().unwrap();
}

#[test]
fn deposit_and_withdraw_in_the_same_second_earn_nothing() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let alice = Pubkey::new_unique();
    h.stake(&alice, eth(5), T0);
    let receipt = h.pool.withdraw(&alice, T0).unwrap();
    assert_eq!(receipt.reward, 0);
    assert_eq!(h.eth(&alice), eth(5));
    assert_eq!(h.pool.stake_rewards(), RESERVE);
}

#[test]
fn minimum_deposit_is_enforced() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let err = h.pool.deposit(&Pubkey::new_unique(), MINIMUM_DEPOSIT - 1, T0).unwrap_err();
    assert_eq!(err, StakeError::BelowMinimum { amount: MINIMUM_DEPOSIT - 1, minimum: MINIMUM_DEPOSIT });
    assert!(err.to_string().starts_with("eth value too low"));
    assert_eq!(h.pool.total_staked(), 0);
    assert_eq!(h.pool.latest_reward_timestamp(), 0);
}

#[test]
fn operations_before_initialize_are_refused() {
    let h = Harness::uninitialized(PoolConfig::default());
    let who = Pubkey::new_unique();
    assert_eq!(h.pool.deposit(&who, eth(5), T0).unwrap_err(), StakeError::NotInitialized);
    assert_eq!(h.pool.withdraw(&who, T0).unwrap_err(), StakeError::NotInitialized);
}

#[test]
fn backwards_clock_is_refused_without_side_effects() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let alice = Pubkey::new_unique();
    h.stake(&alice, eth(5), T0);
    let before = h.pool.snapshot();

    let err = h.pool.deposit(&Pubkey::new_unique(), eth(5), T0 - 1).unwrap_err();
    assert_eq!(err, StakeError::TimeTravel { now: T0 - 1, last: T0 });
    let err = h.pool.withdraw(&alice, T0 - 1).unwrap_err();
    assert!(matches!(err, StakeError::TimeTravel { .. }));
    assert_eq!(h.pool.snapshot(), before);
}

#[test]
fn two_stakers_split_emission_by_principal() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let (alice, bob) = (Pubkey::new_unique(), Pubkey::new_unique());
    h.stake(&alice, eth(5), T0);
    h.stake(&bob, eth(15), T0);

    let a = h.pool.withdraw(&alice, T0 + 40).unwrap();
    let b = h.pool.withdraw(&bob, T0 + 40).unwrap();
    // 40_000_000 emitted, 1:3 split
    assert!(10_000_000 - a.reward <= 1);
    assert!(30_000_000 - b.reward <= 1);
    h.pool.check_invariants().unwrap();
}

#[test]
fn top_up_keeps_reward_earned_before_it() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let (alice, bob) = (Pubkey::new_unique(), Pubkey::new_unique());
    h.stake(&alice, eth(5), T0);
    h.stake(&bob, eth(5), T0);

    // alice alone holds half the stake for 10s, then doubles it
    h.stake(&alice, eth(10), T0 + 10);
    assert_eq!(h.pool.participant(&alice).unwrap().principal, eth(15));
    assert!(h.pool.pending_reward(&alice).unwrap() >= 5_000_000 - 1);

    let a = h.pool.withdraw(&alice, T0 + 20).unwrap();
    // 5M from the first window + 3/4 of 10M from the second
    assert!(12_500_000 - a.reward <= 2, "reward {}", a.reward);
    assert_eq!(h.eth(&alice), eth(15));
}

#[test]
fn exhausted_reserve_pins_emission_and_pool_keeps_working() {
    let h = Harness::live(PoolConfig::default(), 2_500_000);
    let alice = Pubkey::new_unique();
    h.stake(&alice, eth(5), T0);

    let r = h.pool.withdraw(&alice, T0 + 1_000).unwrap();
    assert!(2_500_000 - r.reward <= 1);
    assert_eq!(h.pool.stake_rewards(), 0);

    h.stake(&alice, eth(5), T0 + 2_000);
    let r = h.pool.withdraw(&alice, T0 + 3_000).unwrap();
    assert_eq!(r.reward, 0);
    assert_eq!(r.principal, eth(5));
    h.pool.check_invariants().unwrap();
}

#[test]
fn withdraw_receipt_values_principal_when_price_is_fresh() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let alice = Pubkey::new_unique();
    h.stake(&alice, eth(5), T0);

    // 2_000 USD, 8 decimals
    h.pool.oracle().set(PriceQuote { rate: 200_000_000_000, decimals: 8, published_at: T0 });
    let r = h.pool.withdraw(&alice, T0 + 10).unwrap();
    assert_eq!(r.principal_quote, Some(1_000_000_000_000));
}

#[test]
fn stale_price_does_not_block_withdrawal() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let alice = Pubkey::new_unique();
    h.stake(&alice, eth(5), T0);
    h.pool.oracle().set(PriceQuote { rate: 200_000_000_000, decimals: 8, published_at: T0 });

    let late = T0 + 3_601;
    let err = h.pool.position_value(&alice, late).unwrap_err();
    assert!(matches!(err, StakeError::StalePrice { .. }));

    let r = h.pool.withdraw(&alice, late).unwrap();
    assert_eq!(r.principal_quote, None);
    assert_eq!(h.eth(&alice), eth(5));
}

#[test]
fn position_value_adds_projected_reward_without_writing() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let alice = Pubkey::new_unique();
    h.stake(&alice, eth(5), T0);
    h.pool.oracle().set(PriceQuote { rate: 200_000_000_000, decimals: 8, published_at: T0 + 50 });

    let before = h.pool.snapshot();
    let v = h.pool.position_value(&alice, T0 + 60).unwrap();
    assert_eq!(v.principal_value, 1_000_000_000_000);
    assert!(60_000_000 - v.pending_reward <= 1);
    assert_eq!(v.total_value, v.principal_value + v.pending_reward);
    assert_eq!(h.pool.snapshot(), before);

    let err = h.pool.position_value(&Pubkey::new_unique(), T0 + 60).unwrap_err();
    assert_eq!(err, StakeError::NoStake);
}

#[test]
fn events_follow_commit_order() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    h.pool.drain_events();
    let alice = Pubkey::new_unique();
    h.stake(&alice, eth(5), T0);
    let r = h.pool.withdraw(&alice, T0 + 1).unwrap();

    assert_eq!(
        h.pool.drain_events(),
        vec![
            StakeEvent::Deposited { participant: alice, amount: eth(5), timestamp: T0 },
            StakeEvent::Withdrawn { participant: alice, amount: eth(5), reward_paid: r.reward },
        ]
    );
    assert!(h.pool.drain_events().is_empty());
}

#[test]
fn snapshot_restores_an_equivalent_pool() {
    let h = Harness::live(PoolConfig::default(), RESERVE);
    let alice = Pubkey::new_unique();
    h.stake(&alice, eth(7), T0);

    let json = serde_json::to_string_pretty(&h.pool.snapshot()).unwrap();
    let restored = eth_stake::StakePool::from_snapshot(
        serde_json::from_str(&json).unwrap(),
        MockLedger::default(),
        MockOracle::default(),
    )
    .unwrap();
    assert_eq!(restored.snapshot(), h.pool.snapshot());
    assert_eq!(restored.pending_reward(&alice).unwrap(), 0);
    assert!(restored.projected_reward(&alice, T0 + 3).unwrap() > 0);
}
