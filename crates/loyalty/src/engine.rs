//! Rewards engine: owns points, tier, anniversary cycle, and milestone
//! redemptions for one device, and keeps them durable in a key-value store.
//!
//! Every mutation is computed on a copy of the state, written to the store,
//! and only then committed in memory. A failed write leaves the engine exactly
//! as it was and surfaces a storage error.

use crate::claims::validate_claim;
use crate::codec;
use crate::cycle::{self, CycleAdvance};
use chrono::{DateTime, SubsecRound, Utc};
use rewards_core::config::{AppConfig, ClaimsConfig, RewardsConfig};
use rewards_core::loyalty::*;
use rewards_core::{Clock, KeyValueStore, RewardsError, RewardsResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct RewardsEngine {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: RewardsConfig,
    claims: ClaimsConfig,
    /// `None` until `initialize` succeeds. Held across store writes so
    /// operations never interleave.
    state: Mutex<Option<RewardsState>>,
}

impl RewardsEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        Self {
            store,
            clock,
            config: config.rewards.clone(),
            claims: config.claims.clone(),
            state: Mutex::new(None),
        }
    }

    /// Construct and initialize in one step.
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> RewardsResult<Self> {
        let engine = Self::new(store, clock, config);
        engine.initialize().await?;
        Ok(engine)
    }

    /// Millisecond precision so in-memory timestamps match what is persisted.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }

    async fn write(&self, entries: Vec<(String, String)>) -> RewardsResult<()> {
        let keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
        self.store.multi_set(entries).await.map_err(|e| {
            metrics::counter!("rewards.storage_failures").increment(1);
            error!(keys = ?keys, error = %e, "Failed to persist rewards state");
            e
        })
    }

    /// Bring `state` into the cycle containing `now`. Returns the status and
    /// whether the per-cycle fields were cleared.
    fn roll_forward(&self, state: &mut RewardsState, now: DateTime<Utc>) -> CycleStatus {
        match cycle::advance(state.anniversary_start, now, self.config.max_rollover_iterations) {
            CycleAdvance::Current {
                anniversary_start,
                rollovers,
            } => {
                if rollovers > 0 {
                    info!(
                        previous_start = %state.anniversary_start,
                        anniversary_start = %anniversary_start,
                        rollovers = rollovers,
                        forfeited_points = state.points,
                        tier = %state.tier,
                        "Anniversary cycle rolled over"
                    );
                    metrics::counter!("rewards.cycle_rollovers").increment(1);
                    state.start_cycle(anniversary_start);
                }
                CycleStatus {
                    anniversary_start,
                    rolled_over: rollovers > 0,
                    rollovers,
                }
            }
            CycleAdvance::Exhausted => {
                warn!(
                    stored_start = %state.anniversary_start,
                    max_rollovers = self.config.max_rollover_iterations,
                    "Anniversary start is implausibly old, restarting cycle now"
                );
                metrics::counter!("rewards.cycle_rollovers").increment(1);
                state.start_cycle(now);
                CycleStatus {
                    anniversary_start: now,
                    rolled_over: true,
                    rollovers: 0,
                }
            }
        }
    }

    /// Roll `state` forward and persist the new cycle if one started. On
    /// success the rolled state is committed to `slot`.
    async fn normalize(
        &self,
        slot: &mut Option<RewardsState>,
        state: &mut RewardsState,
    ) -> RewardsResult<CycleStatus> {
        let status = self.roll_forward(state, self.now());
        if status.rolled_over {
            self.write(codec::cycle_entries(state)).await?;
            *slot = Some(state.clone());
        }
        Ok(status)
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────

    /// Load state from the store and normalize the cycle. Must complete before
    /// any other operation; calling it again reloads from the store.
    pub async fn initialize(&self) -> RewardsResult<CycleStatus> {
        let mut slot = self.state.lock().await;

        let values = self.store.multi_get(&codec::ALL_KEYS).await?;
        let loaded = codec::decode(&values);
        let repaired = loaded.repaired.clone();
        let now = self.now();

        let (state, status, mut entries) = match loaded.anniversary_start {
            None if loaded.start_unreadable() => {
                // Same treatment as an implausibly old start.
                let mut state = loaded.into_state(now);
                state.start_cycle(now);
                let entries = codec::cycle_entries(&state);
                let status = CycleStatus {
                    anniversary_start: now,
                    rolled_over: true,
                    rollovers: 0,
                };
                (state, status, entries)
            }
            None => {
                let state = loaded.into_state(now);
                let entries = vec![codec::anniversary_entry(&state)];
                let status = CycleStatus {
                    anniversary_start: now,
                    rolled_over: false,
                    rollovers: 0,
                };
                (state, status, entries)
            }
            Some(start) => {
                let mut state = loaded.into_state(start);
                let status = self.roll_forward(&mut state, now);
                let entries = if status.rolled_over {
                    codec::cycle_entries(&state)
                } else {
                    Vec::new()
                };
                (state, status, entries)
            }
        };

        for key in repaired {
            if !entries.iter().any(|(k, _)| k == key) {
                entries.extend(codec::entry_for(key, &state));
            }
        }

        if !entries.is_empty() {
            self.write(entries).await?;
        }

        info!(
            points = state.points,
            tier = %state.tier,
            anniversary_start = %state.anniversary_start,
            redemptions = state.redemptions.len(),
            rolled_over = status.rolled_over,
            "Rewards engine initialized"
        );

        *slot = Some(state);
        Ok(status)
    }

    /// Advance the anniversary cycle to the one containing "now", clearing
    /// points and redemptions if at least one year boundary has passed.
    pub async fn ensure_current_cycle(&self) -> RewardsResult<CycleStatus> {
        let mut slot = self.state.lock().await;
        let mut state = slot.clone().ok_or(RewardsError::NotInitialized)?;
        self.normalize(&mut slot, &mut state).await
    }

    // ─── Accrual ───────────────────────────────────────────────────────────

    /// Credit a completed purchase. Non-finite or non-positive amounts are
    /// ignored and return `Ok(None)`.
    pub async fn add_spend(&self, amount: f64) -> RewardsResult<Option<SpendOutcome>> {
        if !amount.is_finite() || amount <= 0.0 {
            metrics::counter!("rewards.spend_ignored").increment(1);
            debug!(amount = amount, "Ignoring spend with invalid amount");
            return Ok(None);
        }

        let mut slot = self.state.lock().await;
        let mut state = slot.clone().ok_or(RewardsError::NotInitialized)?;
        let cycle = self.normalize(&mut slot, &mut state).await?;

        let previous_tier = state.tier;
        let earn_rate = previous_tier.earn_rate();
        // Float-to-int `as` saturates, so absurd amounts cap instead of wrapping.
        let points_earned = (amount * f64::from(earn_rate)).floor() as u64;

        state.points = state.points.saturating_add(points_earned);
        state.tier = previous_tier.promote_for(state.points);
        let promoted = state.tier != previous_tier;

        let mut entries = vec![codec::points_entry(&state)];
        if promoted {
            entries.push(codec::tier_entry(&state));
        }
        self.write(entries).await?;

        metrics::counter!("rewards.points_earned").increment(points_earned);
        debug!(
            amount = amount,
            earn_rate = earn_rate,
            points_earned = points_earned,
            points = state.points,
            "Points earned"
        );
        if promoted {
            metrics::counter!("rewards.tier_promotions").increment(1);
            info!(
                old = %previous_tier,
                new = %state.tier,
                points = state.points,
                "Tier promotion"
            );
        }

        let outcome = SpendOutcome {
            amount,
            points_earned,
            earn_rate,
            points: state.points,
            previous_tier,
            tier: state.tier,
            promoted,
            rolled_over: cycle.rolled_over,
        };
        *slot = Some(state);
        Ok(Some(outcome))
    }

    // ─── Redemption ────────────────────────────────────────────────────────

    /// Unlock a milestone for this cycle. Points are not deducted. Unknown,
    /// already-redeemed, and not-yet-eligible milestones change nothing.
    pub async fn redeem_milestone(&self, points_required: u32) -> RewardsResult<RedeemOutcome> {
        let mut slot = self.state.lock().await;
        let mut state = slot.clone().ok_or(RewardsError::NotInitialized)?;
        self.normalize(&mut slot, &mut state).await?;

        let Some(milestone) = milestone(points_required) else {
            debug!(points = points_required, "Redeem ignored: not a milestone");
            return Ok(RedeemOutcome::UnknownMilestone {
                points: points_required,
            });
        };
        if state.is_redeemed(points_required) {
            debug!(points = points_required, "Redeem ignored: already redeemed this cycle");
            return Ok(RedeemOutcome::AlreadyRedeemed {
                points: points_required,
            });
        }
        if state.points < u64::from(points_required) {
            debug!(
                required = points_required,
                points = state.points,
                "Redeem ignored: not enough points"
            );
            return Ok(RedeemOutcome::NotEligible {
                required: points_required,
                points: state.points,
            });
        }

        state.redemptions.insert(points_required);
        self.write(vec![codec::redemptions_entry(&state)]).await?;

        metrics::counter!("rewards.milestones_redeemed").increment(1);
        info!(
            milestone = points_required,
            title = milestone.title,
            points = state.points,
            "Milestone redeemed"
        );

        *slot = Some(state);
        Ok(RedeemOutcome::Redeemed {
            milestone: *milestone,
        })
    }

    // ─── Claims ────────────────────────────────────────────────────────────

    /// Validate a hand-entered receipt and credit it like a checkout spend.
    pub async fn claim_missing_points(
        &self,
        claim: &MissingPointsClaim,
    ) -> RewardsResult<ClaimReceipt> {
        let today = self.clock.now().date_naive();
        let validated = validate_claim(claim, &self.claims, today).map_err(|rejection| {
            metrics::counter!("rewards.claims_rejected").increment(1);
            info!(reason = %rejection, "Missing-points claim rejected");
            RewardsError::ClaimRejected(rejection)
        })?;

        let outcome = self.add_spend(validated.amount).await?;
        let (points_earned, tier) = match outcome {
            Some(o) => (o.points_earned, o.tier),
            None => (0, self.tier().await?),
        };

        metrics::counter!("rewards.claims_accepted").increment(1);
        info!(
            code = %validated.code,
            amount = validated.amount,
            purchase_date = %validated.purchase_date,
            points_earned = points_earned,
            "Missing-points claim credited"
        );

        Ok(ClaimReceipt {
            code: validated.code,
            amount: validated.amount,
            purchase_date: validated.purchase_date,
            points_earned,
            tier,
        })
    }

    // ─── Dev Tools ─────────────────────────────────────────────────────────

    /// Start a fresh cycle now: points and redemptions cleared, tier kept.
    pub async fn reset_cycle(&self) -> RewardsResult<()> {
        if !self.config.allow_dev_reset {
            return Err(RewardsError::DevToolsDisabled);
        }

        let mut slot = self.state.lock().await;
        let mut state = slot.clone().ok_or(RewardsError::NotInitialized)?;
        state.start_cycle(self.now());
        self.write(codec::cycle_entries(&state)).await?;

        warn!(
            anniversary_start = %state.anniversary_start,
            tier = %state.tier,
            "Rewards cycle reset by developer tooling"
        );
        *slot = Some(state);
        Ok(())
    }

    // ─── Read Accessors ────────────────────────────────────────────────────

    /// Every read first brings the cycle up to date, so values from an ended
    /// cycle are never observed.
    async fn read<T>(&self, f: impl FnOnce(&RewardsState) -> T) -> RewardsResult<T> {
        let mut slot = self.state.lock().await;
        let mut state = slot.clone().ok_or(RewardsError::NotInitialized)?;
        self.normalize(&mut slot, &mut state).await?;
        Ok(f(&state))
    }

    /// Copy of the state in the current cycle.
    pub async fn snapshot(&self) -> RewardsResult<RewardsState> {
        self.read(RewardsState::clone).await
    }

    pub async fn points(&self) -> RewardsResult<u64> {
        self.read(|s| s.points).await
    }

    pub async fn tier(&self) -> RewardsResult<Tier> {
        self.read(|s| s.tier).await
    }

    pub async fn tier_info(&self) -> RewardsResult<&'static TierInfo> {
        self.read(|s| s.tier_info()).await
    }

    pub async fn next_tier_threshold(&self) -> RewardsResult<Option<u64>> {
        self.read(|s| s.next_tier_threshold()).await
    }

    pub async fn remaining_to_next_tier(&self) -> RewardsResult<Option<u64>> {
        self.read(|s| s.remaining_to_next_tier()).await
    }

    pub async fn tier_progress(&self) -> RewardsResult<f64> {
        self.read(|s| s.tier_progress()).await
    }

    pub async fn anniversary_start(&self) -> RewardsResult<DateTime<Utc>> {
        self.read(|s| s.anniversary_start).await
    }

    /// When the current cycle ends and points reset.
    pub async fn cycle_ends_at(&self) -> RewardsResult<Option<DateTime<Utc>>> {
        self.read(|s| cycle::one_year_after(s.anniversary_start)).await
    }

    pub async fn redemptions(&self) -> RewardsResult<BTreeSet<u32>> {
        self.read(|s| s.redemptions.clone()).await
    }

    pub async fn available_rewards(&self) -> RewardsResult<Vec<&'static Milestone>> {
        self.read(|s| s.available_rewards()).await
    }
}
