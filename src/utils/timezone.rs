use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::{Asia::Bangkok, Tz};

/// Plant timezone used when nothing is configured
pub const DEFAULT_TZ: Tz = Bangkok;

/// Parse an IANA timezone name such as `Asia/Bangkok`
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("Invalid timezone '{name}': {e}"))
}

/// Get current time in the given timezone
pub fn local_now(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

/// Calendar date of "today" in the given timezone; posting dates are compared against this
pub fn local_today(tz: Tz) -> NaiveDate {
    local_now(tz).date_naive()
}
