use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const EARLY_RISERS_NAME: &str = "Early Risers Promotion";
pub const EARLY_RISERS_DISCOUNT_PCT: u8 = 10;
pub const EARLY_RISERS_HOURS: &str = "8:00 AM - 10:00 AM Pacific Time";

const PACIFIC_OFFSET_SECS: i32 = -8 * 3600;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub name: String,
    pub discount_percentage: u8,
    pub valid_hours: String,
    pub description: String,
    pub available: bool,
    pub discount_code: Option<String>,
}

impl Promotion {
    pub fn early_risers_active(discount_code: String) -> Self {
        Self {
            name: EARLY_RISERS_NAME.to_string(),
            discount_percentage: EARLY_RISERS_DISCOUNT_PCT,
            valid_hours: EARLY_RISERS_HOURS.to_string(),
            description: format!(
                "Get {EARLY_RISERS_DISCOUNT_PCT}% off your purchase during early morning hours!"
            ),
            available: true,
            discount_code: Some(discount_code),
        }
    }

    pub fn early_risers_inactive(now: DateTime<Utc>) -> Self {
        let local = pacific_time(now);
        Self {
            name: EARLY_RISERS_NAME.to_string(),
            discount_percentage: EARLY_RISERS_DISCOUNT_PCT,
            valid_hours: EARLY_RISERS_HOURS.to_string(),
            description: format!(
                "The Early Risers promotion runs {EARLY_RISERS_HOURS}. It is currently {} PT.",
                local.format("%I:%M %p")
            ),
            available: false,
            discount_code: None,
        }
    }
}

/// Whether `now` falls inside the 08:00-10:00 Pacific window (inclusive).
pub fn is_early_risers_window(now: DateTime<Utc>) -> bool {
    let local = pacific_time(now).time();
    let start = NaiveTime::from_hms_opt(8, 0, 0);
    let end = NaiveTime::from_hms_opt(10, 0, 0);
    match (start, end) {
        (Some(start), Some(end)) => start <= local && local <= end,
        _ => false,
    }
}

fn pacific_time(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(PACIFIC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset),
        None => now.fixed_offset(),
    }
}
