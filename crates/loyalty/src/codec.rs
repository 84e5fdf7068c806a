//! Encoding of rewards state into the four persisted keys.
//!
//! Decoding never fails: malformed values fall back to safe defaults and are
//! reported in `LoadedState::repaired` so the caller can log and rewrite them.

use chrono::{DateTime, SecondsFormat, Utc};
use rewards_core::loyalty::{milestone, RewardsState, Tier};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

pub const POINTS_KEY: &str = "rewards.points";
pub const TIER_KEY: &str = "rewards.tier";
pub const REDEMPTIONS_KEY: &str = "rewards.redemptions";
pub const ANNIVERSARY_START_KEY: &str = "rewards.anniversaryStart";

/// Read order used by `decode`.
pub const ALL_KEYS: [&str; 4] = [POINTS_KEY, TIER_KEY, REDEMPTIONS_KEY, ANNIVERSARY_START_KEY];

/// Raw store contents after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedState {
    pub points: u64,
    pub tier: Tier,
    pub redemptions: BTreeSet<u32>,
    /// `None` on first launch or when the stored date was unreadable. The
    /// two cases differ by `ANNIVERSARY_START_KEY` appearing in `repaired`.
    pub anniversary_start: Option<DateTime<Utc>>,
    /// Keys whose stored value was malformed and replaced by a default.
    pub repaired: Vec<&'static str>,
}

impl LoadedState {
    /// A start date was stored but could not be read.
    pub fn start_unreadable(&self) -> bool {
        self.repaired.contains(&ANNIVERSARY_START_KEY)
    }

    pub fn into_state(self, anniversary_start: DateTime<Utc>) -> RewardsState {
        RewardsState {
            points: self.points,
            tier: self.tier,
            anniversary_start,
            redemptions: self.redemptions,
        }
    }
}

/// Decode values fetched for `ALL_KEYS`, in that order.
pub fn decode(values: &[Option<String>]) -> LoadedState {
    let value = |i: usize| values.get(i).and_then(|v| v.as_deref());
    let mut repaired = Vec::new();

    let points = match value(0) {
        None => 0,
        Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!(key = POINTS_KEY, value = raw, "Malformed points value, resetting to 0");
            repaired.push(POINTS_KEY);
            0
        }),
    };

    let tier = match value(1) {
        None => Tier::White,
        Some(raw) => raw.parse::<Tier>().unwrap_or_else(|e| {
            warn!(key = TIER_KEY, error = %e, "Malformed tier value, resetting to WHITE");
            repaired.push(TIER_KEY);
            Tier::White
        }),
    };

    let redemptions = match value(2) {
        None => BTreeSet::new(),
        Some(raw) => {
            let (set, clean) = decode_redemptions(raw);
            if !clean {
                repaired.push(REDEMPTIONS_KEY);
            }
            set
        }
    };

    let anniversary_start = value(3).and_then(|raw| match decode_timestamp(raw) {
        Some(ts) => Some(ts),
        None => {
            warn!(
                key = ANNIVERSARY_START_KEY,
                value = raw,
                "Unparseable anniversary start, restarting cycle"
            );
            repaired.push(ANNIVERSARY_START_KEY);
            None
        }
    });

    LoadedState {
        points,
        tier,
        redemptions,
        anniversary_start,
        repaired,
    }
}

/// Returns the redeemed thresholds and whether the stored value was clean.
fn decode_redemptions(raw: &str) -> (BTreeSet<u32>, bool) {
    let map = match serde_json::from_str::<BTreeMap<String, Value>>(raw) {
        Ok(map) => map,
        Err(e) => {
            warn!(key = REDEMPTIONS_KEY, error = %e, "Corrupt redemptions, clearing");
            return (BTreeSet::new(), false);
        }
    };

    let mut clean = true;
    let mut set = BTreeSet::new();
    for (key, flag) in map {
        let configured = key.parse::<u32>().ok().filter(|p| milestone(*p).is_some());
        match (configured, flag) {
            (Some(points), Value::Bool(true)) => {
                set.insert(points);
            }
            (Some(_), Value::Bool(false)) => {}
            _ => {
                warn!(
                    key = REDEMPTIONS_KEY,
                    entry = %key,
                    "Dropping unrecognized redemption entry"
                );
                clean = false;
            }
        }
    }
    (set, clean)
}

pub fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn encode_redemptions(redemptions: &BTreeSet<u32>) -> String {
    let map: serde_json::Map<String, Value> = redemptions
        .iter()
        .map(|p| (p.to_string(), Value::Bool(true)))
        .collect();
    Value::Object(map).to_string()
}

pub fn points_entry(state: &RewardsState) -> (String, String) {
    (POINTS_KEY.to_string(), state.points.to_string())
}

pub fn tier_entry(state: &RewardsState) -> (String, String) {
    (TIER_KEY.to_string(), state.tier.as_str().to_string())
}

pub fn redemptions_entry(state: &RewardsState) -> (String, String) {
    (REDEMPTIONS_KEY.to_string(), encode_redemptions(&state.redemptions))
}

pub fn anniversary_entry(state: &RewardsState) -> (String, String) {
    (
        ANNIVERSARY_START_KEY.to_string(),
        encode_timestamp(state.anniversary_start),
    )
}

/// Entries written together whenever a cycle starts.
pub fn cycle_entries(state: &RewardsState) -> Vec<(String, String)> {
    vec![
        anniversary_entry(state),
        points_entry(state),
        redemptions_entry(state),
    ]
}

/// Entry for a single key of `state`.
pub fn entry_for(key: &str, state: &RewardsState) -> Option<(String, String)> {
    match key {
        POINTS_KEY => Some(points_entry(state)),
        TIER_KEY => Some(tier_entry(state)),
        REDEMPTIONS_KEY => Some(redemptions_entry(state)),
        ANNIVERSARY_START_KEY => Some(anniversary_entry(state)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(values: [Option<&str>; 4]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_decode_empty_store() {
        let loaded = decode(&raw([None, None, None, None]));
        assert_eq!(loaded.points, 0);
        assert_eq!(loaded.tier, Tier::White);
        assert!(loaded.redemptions.is_empty());
        assert_eq!(loaded.anniversary_start, None);
        assert!(!loaded.start_unreadable());
        assert!(loaded.repaired.is_empty());
    }

    #[test]
    fn test_decode_values_written_by_older_client() {
        let loaded = decode(&raw([
            Some("625"),
            Some("YELLOW"),
            Some(r#"{"50":true,"75":false,"100":true}"#),
            Some("2025-03-01T12:00:00.000Z"),
        ]));
        assert_eq!(loaded.points, 625);
        assert_eq!(loaded.tier, Tier::Yellow);
        assert_eq!(loaded.redemptions, BTreeSet::from([50, 100]));
        assert_eq!(
            loaded.anniversary_start,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())
        );
        assert!(loaded.repaired.is_empty());
    }

    #[test]
    fn test_decode_repairs_malformed_values() {
        let loaded = decode(&raw([
            Some("-5"),
            Some("GOLD"),
            Some("{oops"),
            Some("last tuesday"),
        ]));
        assert_eq!(loaded.points, 0);
        assert_eq!(loaded.tier, Tier::White);
        assert!(loaded.redemptions.is_empty());
        assert_eq!(loaded.anniversary_start, None);
        assert!(loaded.start_unreadable());
        assert_eq!(
            loaded.repaired,
            vec![POINTS_KEY, TIER_KEY, REDEMPTIONS_KEY, ANNIVERSARY_START_KEY]
        );
    }

    #[test]
    fn test_decode_drops_unknown_milestones() {
        let loaded = decode(&raw([None, None, Some(r#"{"50":true,"125":true,"x":1}"#), None]));
        assert_eq!(loaded.redemptions, BTreeSet::from([50]));
        assert_eq!(loaded.repaired, vec![REDEMPTIONS_KEY]);
    }

    #[test]
    fn test_encode_matches_stored_format() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut state = RewardsState::new(start);
        state.points = 120;
        state.redemptions.insert(50);
        state.redemptions.insert(100);

        let entries = cycle_entries(&state);
        assert_eq!(entries[0].1, "2025-03-01T12:00:00.000Z");
        assert_eq!(entries[1].1, "120");
        assert_eq!(entries[2].1, r#"{"100":true,"50":true}"#);
        assert_eq!(tier_entry(&state).1, "WHITE");
    }
}
