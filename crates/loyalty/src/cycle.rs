//! Anniversary-cycle arithmetic.
//!
//! A cycle covers `[start, start + 1 year)`. Years are calendar years, so a
//! cycle starting Feb 29 ends on Feb 28 of the following year.

use chrono::{DateTime, Months, Utc};

/// End of the cycle that starts at `start`, or `None` past chrono's date range.
pub fn one_year_after(start: DateTime<Utc>) -> Option<DateTime<Utc>> {
    start.checked_add_months(Months::new(12))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleAdvance {
    /// `anniversary_start` is current after `rollovers` one-year steps.
    Current {
        anniversary_start: DateTime<Utc>,
        rollovers: u32,
    },
    /// More than the allowed number of steps were needed; the stored start is
    /// not trustworthy.
    Exhausted,
}

/// Step `start` forward one year at a time until `now` falls inside its cycle.
/// A start in the future is returned unchanged.
pub fn advance(start: DateTime<Utc>, now: DateTime<Utc>, max_rollovers: u32) -> CycleAdvance {
    let mut anniversary_start = start;
    let mut rollovers = 0;
    loop {
        let Some(end) = one_year_after(anniversary_start) else {
            return CycleAdvance::Exhausted;
        };
        if now < end {
            return CycleAdvance::Current {
                anniversary_start,
                rollovers,
            };
        }
        if rollovers == max_rollovers {
            return CycleAdvance::Exhausted;
        }
        anniversary_start = end;
        rollovers += 1;
    }
}
