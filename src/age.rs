// src/age.rs
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::error::AgeError;

/// Calendar age of a wallet. `months` is always in 0..=11 and the pair is never (0, 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAge {
    pub years: u32,
    pub months: u32,
    pub display_text: String,
}

impl WalletAge {
    /// Floor value: a wallet is at least one month old.
    pub fn new_wallet() -> Self {
        Self {
            years: 0,
            months: 1,
            display_text: "1 month".to_string(),
        }
    }
}

fn unit(value: u32, name: &str) -> String {
    format!("{} {}{}", value, name, if value > 1 { "s" } else { "" })
}

pub fn year_text(years: u32) -> String {
    unit(years, "year")
}

pub fn month_text(months: u32) -> String {
    unit(months, "month")
}

pub fn display_text(years: u32, months: u32) -> String {
    if years == 0 {
        month_text(months)
    } else if months == 0 {
        year_text(years)
    } else {
        format!("{} {}", year_text(years), month_text(months))
    }
}

/// Age from a first-transaction unix timestamp, measured against `now`.
///
/// Only the year and month fields are compared; day-of-month is ignored,
/// so Jan 31 → Feb 1 counts as one month.
pub fn calculate_at(timestamp: i64, now: DateTime<Utc>) -> Result<WalletAge, AgeError> {
    let first_tx = DateTime::<Utc>::from_timestamp(timestamp, 0)
        .ok_or_else(|| AgeError::InvalidTimestamp(timestamp.to_string()))?;

    let mut years = now.year() - first_tx.year();
    let mut months = now.month() as i32 - first_tx.month() as i32;

    if months < 0 {
        years -= 1;
        months += 12;
    }

    // first tx "after" now (clock skew) lands here too
    if years < 0 || (years == 0 && months == 0) {
        return Ok(WalletAge::new_wallet());
    }

    let (years, months) = (years as u32, months as u32);
    Ok(WalletAge {
        years,
        months,
        display_text: display_text(years, months),
    })
}
