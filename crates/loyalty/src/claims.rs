//! Missing-points claims: a receipt the customer enters by hand when a
//! purchase was not credited at checkout.

use chrono::NaiveDate;
use rewards_core::config::ClaimsConfig;
use rewards_core::loyalty::MissingPointsClaim;
use rewards_core::ClaimRejection;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedClaim {
    pub code: String,
    pub amount: f64,
    pub purchase_date: NaiveDate,
}

/// Check a claim against `today` (UTC). Rules are applied in order and the
/// first failure is returned.
pub fn validate_claim(
    claim: &MissingPointsClaim,
    config: &ClaimsConfig,
    today: NaiveDate,
) -> Result<ValidatedClaim, ClaimRejection> {
    let code = claim.code.trim();
    if code.len() != config.code_length || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClaimRejection::InvalidCode {
            expected_len: config.code_length,
        });
    }

    let amount = parse_amount(&claim.amount)
        .filter(|a| *a > 0.0 && *a < config.max_amount)
        .ok_or(ClaimRejection::InvalidAmount)?;

    let purchase_date = parse_ymd(&claim.purchase_date).ok_or(ClaimRejection::InvalidDate)?;

    let days_since = (today - purchase_date).num_days();
    if days_since < 0 {
        return Err(ClaimRejection::FutureDate);
    }
    if days_since >= i64::from(config.grace_days) {
        return Err(ClaimRejection::Expired {
            grace_days: config.grace_days,
        });
    }

    Ok(ValidatedClaim {
        code: code.to_string(),
        amount,
        purchase_date,
    })
}

/// Keep only digits and '.', so "$1,234.50" reads as 1234.50.
fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok().filter(|a| a.is_finite())
}

/// Strict `YYYY-MM-DD`; rejects impossible dates such as 2025-02-30.
fn parse_ymd(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let bytes = text.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}
