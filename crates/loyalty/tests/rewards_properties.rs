//! Invariants over arbitrary operation sequences: points never go negative,
//! tier never drops, redemptions stay within eligibility and appear once.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rewards_core::loyalty::{milestone, RedeemOutcome, Tier, MILESTONES};
use rewards_core::{AppConfig, Clock, ManualClock};
use rewards_loyalty::RewardsEngine;
use rewards_store::MemoryStore;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Spend(f64),
    Redeem(u32),
    AdvanceDays(i64),
    Reset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-50.0f64..600.0).prop_map(Op::Spend),
        1 => Just(Op::Spend(f64::NAN)),
        3 => prop_oneof![
            proptest::sample::select(MILESTONES.iter().map(|m| m.points).collect::<Vec<_>>()),
            0u32..1100,
        ]
        .prop_map(Op::Redeem),
        2 => (0i64..800).prop_map(Op::AdvanceDays),
        1 => Just(Op::Reset),
    ]
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap()
}

async fn run(ops: Vec<Op>) {
    let mut config = AppConfig::default();
    config.rewards.allow_dev_reset = true;
    let clock = Arc::new(ManualClock::new(start()));
    let engine = RewardsEngine::open(Arc::new(MemoryStore::new()), clock.clone(), &config)
        .await
        .unwrap();

    let mut highest_tier = Tier::White;
    for op in ops {
        let before = engine.snapshot().await.unwrap();
        match op {
            Op::Spend(amount) => {
                let outcome = engine.add_spend(amount).await.unwrap();
                if !(amount.is_finite() && amount > 0.0) {
                    assert!(outcome.is_none());
                    assert_eq!(engine.snapshot().await.unwrap(), before);
                }
            }
            Op::Redeem(points) => {
                let outcome = engine.redeem_milestone(points).await.unwrap();
                let after = engine.snapshot().await.unwrap();
                assert_eq!(after.points, before.points);
                match outcome {
                    RedeemOutcome::Redeemed { milestone: m } => {
                        assert!(!before.is_redeemed(m.points));
                        assert!(after.is_redeemed(m.points));
                        assert!(after.points >= u64::from(m.points));
                    }
                    _ => assert_eq!(after, before),
                }
            }
            Op::AdvanceDays(days) => {
                clock.advance(Duration::days(days));
                engine.ensure_current_cycle().await.unwrap();
            }
            Op::Reset => engine.reset_cycle().await.unwrap(),
        }

        let state = engine.snapshot().await.unwrap();
        assert!(state.tier >= highest_tier, "tier dropped from {highest_tier} to {}", state.tier);
        highest_tier = state.tier;
        assert_eq!(state.tier, state.tier.promote_for(state.points));
        assert!(state
            .redemptions
            .iter()
            .all(|p| milestone(*p).is_some()));
        assert!(state.anniversary_start <= clock.now());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_invariants_hold_over_any_sequence(
        ops in proptest::collection::vec(op_strategy(), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(run(ops));
    }
}
