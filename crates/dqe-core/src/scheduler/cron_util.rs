//! Cron expression parsing and timezone-aware next-fire computation. Adopts
//! a field-complete parser rather than hand-rolling one.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;

use crate::error::{Error, Result};

/// The `cron` crate requires a leading seconds field (6 or 7 fields total).
/// A standard 5-field unix expression is normalized by prepending `0`
/// (fire at second 0).
fn normalize(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_owned()
    }
}

/// Validates a cron expression without computing a fire time. Used at
/// schedule creation so a bad expression fails fast, not at first fire.
pub fn validate(cron_expression: &str) -> Result<()> {
    CronSchedule::from_str(&normalize(cron_expression))
        .map(|_| ())
        .map_err(|e| Error::Invalid(format!("invalid cron expression {cron_expression:?}: {e}")))
}

/// Resolves `timezone` against the IANA database, falling back to UTC for
/// unknown zones.
fn resolve_timezone(timezone: &str) -> chrono_tz::Tz {
    timezone.parse().unwrap_or(chrono_tz::UTC)
}

/// The next fire time strictly after `after`, in UTC.
pub fn next_fire(cron_expression: &str, timezone: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let schedule = CronSchedule::from_str(&normalize(cron_expression))
        .map_err(|e| Error::Invalid(format!("invalid cron expression {cron_expression:?}: {e}")))?;
    let tz = resolve_timezone(timezone);
    let after_tz = after.with_timezone(&tz);
    let next = schedule
        .after(&after_tz)
        .next()
        .ok_or_else(|| Error::Invalid("cron expression has no future occurrences".to_owned()))?;
    Ok(next.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn validate_accepts_five_field_expression() {
        assert!(validate("0 * * * *").is_ok());
    }

    #[test]
    fn validate_accepts_six_field_expression() {
        assert!(validate("0 0 * * * *").is_ok());
    }

    #[test]
    fn validate_rejects_garbage() {
        assert!(validate("not a cron expression").is_err());
    }

    #[test]
    fn next_fire_advances_past_the_given_instant() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = next_fire("0 * * * *", "UTC", after).unwrap();
        assert!(next > after);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let via_unknown = next_fire("0 * * * *", "Nonexistent/Zone", after).unwrap();
        let via_utc = next_fire("0 * * * *", "UTC", after).unwrap();
        assert_eq!(via_unknown, via_utc);
    }
}
