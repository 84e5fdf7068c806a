//! Rewards program domain types: sticky tiers, anniversary-cycle points,
//! and once-per-cycle milestone redemptions.
//!
//! - Four-tier ladder: White → Yellow → Red → Lightning
//! - Points earned per whole currency unit at the tier's earn rate
//! - Milestones unlock rewards without deducting points

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ─── Tier System ────────────────────────────────────────────────────────────

/// Loyalty status levels, ordered by rank.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Entry tier. 1 point per unit spent.
    #[default]
    White,
    /// 300 points in a cycle. 3 points per unit.
    Yellow,
    /// 800 points in a cycle. 4 points per unit.
    Red,
    /// 2000 points in a cycle. 5 points per unit. Terminal.
    Lightning,
}

/// Static descriptor for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierInfo {
    pub tier: Tier,
    pub label: &'static str,
    pub earn_rate: u32,
    /// Cycle points needed to leave this tier; `None` for the terminal tier.
    pub promotion_threshold: Option<u64>,
    pub blurb: &'static str,
}

pub static TIERS: [TierInfo; 4] = [
    TierInfo {
        tier: Tier::White,
        label: "White",
        earn_rate: 1,
        promotion_threshold: Some(300),
        blurb: "Welcome tier. Start earning perks!",
    },
    TierInfo {
        tier: Tier::Yellow,
        label: "Yellow",
        earn_rate: 3,
        promotion_threshold: Some(800),
        blurb: "Accelerated earning for regulars.",
    },
    TierInfo {
        tier: Tier::Red,
        label: "Red",
        earn_rate: 4,
        promotion_threshold: Some(2000),
        blurb: "Premium status with bigger perks.",
    },
    TierInfo {
        tier: Tier::Lightning,
        label: "Lightning",
        earn_rate: 5,
        promotion_threshold: None,
        blurb: "Top tier. Exclusive offers & drops.",
    },
];

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::White, Tier::Yellow, Tier::Red, Tier::Lightning];

    pub fn info(self) -> &'static TierInfo {
        &TIERS[self as usize]
    }

    pub fn earn_rate(self) -> u32 {
        self.info().earn_rate
    }

    pub fn promotion_threshold(self) -> Option<u64> {
        self.info().promotion_threshold
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// The tier directly above this one.
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::White => Some(Tier::Yellow),
            Tier::Yellow => Some(Tier::Red),
            Tier::Red => Some(Tier::Lightning),
            Tier::Lightning => None,
        }
    }

    /// Climb one step at a time while `points` clears each threshold, so a
    /// single large purchase can pass through several tiers. Never demotes.
    pub fn promote_for(self, points: u64) -> Tier {
        let mut tier = self;
        while let (Some(threshold), Some(next)) = (tier.promotion_threshold(), tier.next()) {
            if points < threshold {
                break;
            }
            tier = next;
        }
        tier
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::White => "WHITE",
            Tier::Yellow => "YELLOW",
            Tier::Red => "RED",
            Tier::Lightning => "LIGHTNING",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier '{0}'")]
pub struct ParseTierError(pub String);

impl FromStr for Tier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseTierError(s.to_string()))
    }
}

// ─── Milestones ─────────────────────────────────────────────────────────────

/// A point threshold that unlocks a reward once per anniversary cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub points: u32,
    pub title: &'static str,
}

const fn milestone_entry(points: u32, title: &'static str) -> Milestone {
    Milestone { points, title }
}

/// Milestone catalog, ascending by threshold.
pub static MILESTONES: [Milestone; 21] = [
    milestone_entry(50, "Free drink"),
    milestone_entry(75, "Free side"),
    milestone_entry(100, "Free tender"),
    milestone_entry(150, "Free slider"),
    milestone_entry(200, "Free slider"),
    milestone_entry(250, "Free tender"),
    milestone_entry(300, "Free tender"),
    milestone_entry(350, "Free slider"),
    milestone_entry(400, "Free slider"),
    milestone_entry(450, "Free tender"),
    milestone_entry(500, "Free side"),
    milestone_entry(550, "Free drink"),
    milestone_entry(600, "Free tender"),
    milestone_entry(650, "Free side"),
    milestone_entry(700, "Free slider"),
    milestone_entry(750, "Free slider"),
    milestone_entry(800, "Free slider"),
    milestone_entry(850, "Free side"),
    milestone_entry(900, "Free slider"),
    milestone_entry(950, "Free tender"),
    milestone_entry(
        1000,
        "Free meal (Slider Flight, Tender Flight, and Party Packs excluded)",
    ),
];

/// Look up a configured milestone by its threshold.
pub fn milestone(points: u32) -> Option<&'static Milestone> {
    MILESTONES.iter().find(|m| m.points == points)
}

// ─── Rewards State ──────────────────────────────────────────────────────────

/// Mutable rewards state for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsState {
    /// Points earned in the current anniversary cycle.
    pub points: u64,
    /// Highest tier reached. Survives cycle rollovers.
    pub tier: Tier,
    /// Start of the current one-year cycle.
    pub anniversary_start: DateTime<Utc>,
    /// Milestone thresholds redeemed in the current cycle.
    pub redemptions: BTreeSet<u32>,
}

impl RewardsState {
    /// First-launch state: cycle starts at `now`, White tier, nothing earned.
    pub fn new(anniversary_start: DateTime<Utc>) -> Self {
        Self {
            points: 0,
            tier: Tier::White,
            anniversary_start,
            redemptions: BTreeSet::new(),
        }
    }

    pub fn tier_info(&self) -> &'static TierInfo {
        self.tier.info()
    }

    pub fn next_tier_threshold(&self) -> Option<u64> {
        self.tier.promotion_threshold()
    }

    pub fn remaining_to_next_tier(&self) -> Option<u64> {
        self.next_tier_threshold()
            .map(|threshold| threshold.saturating_sub(self.points))
    }

    /// Progress toward next tier as a fraction [0.0, 1.0]; 1.0 at the top.
    pub fn tier_progress(&self) -> f64 {
        match self.next_tier_threshold() {
            Some(threshold) => (self.points as f64 / threshold as f64).min(1.0),
            None => 1.0,
        }
    }

    pub fn eligible_for_promotion(&self) -> bool {
        self.remaining_to_next_tier() == Some(0)
    }

    pub fn is_redeemed(&self, milestone_points: u32) -> bool {
        self.redemptions.contains(&milestone_points)
    }

    /// Milestones unlocked by the current points and not yet redeemed this cycle.
    pub fn available_rewards(&self) -> Vec<&'static Milestone> {
        MILESTONES
            .iter()
            .filter(|m| self.points >= u64::from(m.points) && !self.is_redeemed(m.points))
            .collect()
    }

    /// Clear the per-cycle fields and start a new cycle. Tier is kept.
    pub fn start_cycle(&mut self, anniversary_start: DateTime<Utc>) {
        self.anniversary_start = anniversary_start;
        self.points = 0;
        self.redemptions.clear();
    }
}

// ─── Operation Outcomes ─────────────────────────────────────────────────────

/// Result of bringing the anniversary cycle up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleStatus {
    pub anniversary_start: DateTime<Utc>,
    pub rolled_over: bool,
    /// Number of one-year steps taken.
    pub rollovers: u32,
}

/// Result of an accepted spend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendOutcome {
    pub amount: f64,
    pub points_earned: u64,
    /// Rate of the tier held before this purchase.
    pub earn_rate: u32,
    pub points: u64,
    pub previous_tier: Tier,
    pub tier: Tier,
    pub promoted: bool,
    /// The purchase landed in a new cycle and the old one was cleared first.
    pub rolled_over: bool,
}

/// Result of a redemption attempt. Only `Redeemed` changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedeemOutcome {
    Redeemed { milestone: Milestone },
    UnknownMilestone { points: u32 },
    AlreadyRedeemed { points: u32 },
    NotEligible { required: u32, points: u64 },
}

impl RedeemOutcome {
    pub fn is_redeemed(&self) -> bool {
        matches!(self, RedeemOutcome::Redeemed { .. })
    }
}

/// A customer's request to credit a purchase that was not recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingPointsClaim {
    /// Receipt code printed by the point of sale.
    pub code: String,
    /// Amount as typed, e.g. "$12.34".
    pub amount: String,
    /// Purchase date as `YYYY-MM-DD`.
    pub purchase_date: String,
}

/// An accepted missing-points claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimReceipt {
    pub code: String,
    pub amount: f64,
    pub purchase_date: NaiveDate,
    pub points_earned: u64,
    pub tier: Tier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn state_with(points: u64, tier: Tier) -> RewardsState {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        RewardsState {
            points,
            tier,
            ..RewardsState::new(start)
        }
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::White < Tier::Yellow);
        assert!(Tier::Yellow < Tier::Red);
        assert!(Tier::Red < Tier::Lightning);
    }

    #[test]
    fn test_tier_table_matches_variants() {
        for tier in Tier::ALL {
            assert_eq!(tier.info().tier, tier);
        }
        assert_eq!(Tier::Lightning.next(), None);
        assert_eq!(Tier::Lightning.promotion_threshold(), None);
    }

    #[test]
    fn test_default_tier_is_entry_tier() {
        assert_eq!(Tier::default(), Tier::White);
        assert_eq!(Tier::default(), Tier::ALL[0]);
    }

    #[test]
    fn test_promote_single_step() {
        assert_eq!(Tier::White.promote_for(625), Tier::Yellow);
        assert_eq!(Tier::White.promote_for(299), Tier::White);
        assert_eq!(Tier::Yellow.promote_for(800), Tier::Red);
    }

    #[test]
    fn test_promote_multi_step() {
        assert_eq!(Tier::White.promote_for(2100), Tier::Lightning);
        assert_eq!(Tier::White.promote_for(800), Tier::Red);
        assert_eq!(Tier::Lightning.promote_for(0), Tier::Lightning);
    }

    #[test]
    fn test_promote_never_demotes() {
        assert_eq!(Tier::Red.promote_for(0), Tier::Red);
    }

    #[test]
    fn test_tier_string_round_trip() {
        assert_eq!("LIGHTNING".parse::<Tier>(), Ok(Tier::Lightning));
        assert!("GOLD".parse::<Tier>().is_err());
        assert_eq!(serde_json::to_string(&Tier::Yellow).unwrap(), "\"YELLOW\"");
    }

    #[test]
    fn test_milestone_catalog() {
        assert_eq!(MILESTONES.len(), 21);
        assert!(MILESTONES.windows(2).all(|w| w[0].points < w[1].points));
        assert_eq!(milestone(75).map(|m| m.title), Some("Free side"));
        assert!(milestone(125).is_none());
    }

    #[test]
    fn test_remaining_to_next_tier() {
        assert_eq!(state_with(120, Tier::White).remaining_to_next_tier(), Some(180));
        assert_eq!(state_with(900, Tier::Yellow).remaining_to_next_tier(), Some(0));
        assert!(state_with(900, Tier::Yellow).eligible_for_promotion());
        assert_eq!(state_with(5000, Tier::Lightning).remaining_to_next_tier(), None);
    }

    #[test]
    fn test_tier_progress() {
        assert!((state_with(150, Tier::White).tier_progress() - 0.5).abs() < f64::EPSILON);
        assert_eq!(state_with(9999, Tier::White).tier_progress(), 1.0);
        assert_eq!(state_with(0, Tier::Lightning).tier_progress(), 1.0);
    }

    #[test]
    fn test_available_rewards_excludes_redeemed() {
        let mut state = state_with(120, Tier::White);
        state.redemptions.insert(75);
        let available: Vec<u32> = state.available_rewards().iter().map(|m| m.points).collect();
        assert_eq!(available, vec![50, 100]);
    }

    #[test]
    fn test_start_cycle_keeps_tier() {
        let mut state = state_with(900, Tier::Red);
        state.redemptions.insert(50);
        let next = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        state.start_cycle(next);
        assert_eq!(state.points, 0);
        assert!(state.redemptions.is_empty());
        assert_eq!(state.tier, Tier::Red);
        assert_eq!(state.anniversary_start, next);
    }
}
