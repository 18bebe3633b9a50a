use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

/// Countdown shown next to a favorite until its pickup window closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiresIn {
    Remaining { days: i64, hours: i64, minutes: i64 },
    Expired,
    Unknown,
}

impl fmt::Display for ExpiresIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ExpiresIn::Expired => f.write_str("Expired"),
            ExpiresIn::Unknown => f.write_str("Unknown"),
            ExpiresIn::Remaining { days, hours, minutes } => {
                if days > 0 {
                    write!(f, "{}d ", days)?;
                }
                if hours > 0 || days > 0 {
                    write!(f, "{}h ", hours)?;
                }
                write!(f, "{}m", minutes)
            }
        }
    }
}

/// Parse the timestamp formats listings are stored with.
///
/// Naive values carry no offset and are read as UTC, not local time. Listings
/// written by the web client always carry an explicit `Z` offset.
pub fn parse_expire_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn expires_in(expire_date: &str, now: DateTime<Utc>) -> ExpiresIn {
    let Some(expires) = parse_expire_date(expire_date) else {
        return ExpiresIn::Unknown;
    };

    let remaining = expires - now;
    if remaining <= chrono::Duration::zero() {
        return ExpiresIn::Expired;
    }

    ExpiresIn::Remaining {
        days: remaining.num_days(),
        hours: remaining.num_hours() % 24,
        minutes: remaining.num_minutes() % 60,
    }
}
