// Period-key resolution for the deadline pre-filter.
//
// Accepted formats: "YYYY-Qn" (quarter end), "YYYY-MM" (month end),
// "YYYY-Wnn" (ISO week end, Sunday).

use chrono::{Datelike, NaiveDate, Weekday};

use crate::domain::BuildError;

/// Resolve a period key to its last calendar day.
pub fn resolve_period_end(period_key: &str) -> Result<NaiveDate, BuildError> {
    let key = period_key.trim();
    let invalid = || BuildError::Configuration(format!("invalid period key '{key}'"));

    let (year_part, rest) = key.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year_part.parse().map_err(|_| invalid())?;
    let rest = rest.trim();

    if let Some(quarter) = rest.strip_prefix(['Q', 'q']) {
        let quarter: u32 = quarter.parse().map_err(|_| invalid())?;
        if !(1..=4).contains(&quarter) {
            return Err(invalid());
        }
        return month_end(year, quarter * 3).ok_or_else(invalid);
    }

    if let Some(week) = rest.strip_prefix(['W', 'w']) {
        let week: u32 = week.parse().map_err(|_| invalid())?;
        return NaiveDate::from_isoywd_opt(year, week, Weekday::Sun).ok_or_else(invalid);
    }

    let month: u32 = rest.parse().map_err(|_| invalid())?;
    month_end(year, month).ok_or_else(invalid)
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next.pred_opt().filter(|d| d.month() == month && *d >= first)
}
