//! Cron expressions for scheduled triggers.
//!
//! Expressions have six fields (`sec min hour dom month dow`) with an
//! optional seventh for the year. Schedules run at minute resolution: the
//! seconds field must be the literal `0` and the minute field may not be `*`.
//! Numeric day-of-week values follow the `0-7` convention where both `0` and
//! `7` are Sunday.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ::cron::Schedule;

use crate::error::{Error, Result};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A validated, minute-resolution cron expression.
#[derive(Debug, Clone)]
pub struct CronExpr {
    raw: String,
    schedule: Schedule,
}

impl CronExpr {
    /// Parses and validates an expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the expression is empty, has a
    /// non-zero seconds field, fires every minute, or does not parse.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::bad_request("the cron string cannot be empty"));
        }

        let fields: Vec<&str> = raw.split_whitespace().collect();
        if !(6..=7).contains(&fields.len()) {
            return Err(Error::bad_request(format!(
                "invalid cron string '{raw}': expected 6 or 7 fields, got {}",
                fields.len()
            )));
        }
        if fields[0] != "0" {
            return Err(Error::bad_request(
                "the 1st field (indicating Seconds of time) of the cron setting must be 0",
            ));
        }
        if fields[1] == "*" {
            return Err(Error::bad_request(
                "the 2nd field (indicating Minutes of time) of the cron setting must not be *",
            ));
        }

        let mut normalized: Vec<String> = fields.iter().map(ToString::to_string).collect();
        normalized[5] = normalize_weekdays(fields[5])?;

        let schedule = Schedule::from_str(&normalized.join(" "))
            .map_err(|e| Error::bad_request(format!("invalid cron string '{raw}': {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            schedule,
        })
    }

    /// Returns the expression as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the first fire time strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(after).next()
    }
}

impl PartialEq for CronExpr {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for CronExpr {}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for CronExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Maps numeric weekdays to names; step values after `/` are left alone.
fn normalize_weekdays(field: &str) -> Result<String> {
    let items = field.split(',').map(|item| {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (item, None),
        };
        let base = base
            .split('-')
            .map(|part| match part.parse::<usize>() {
                Ok(n) if n <= 7 => Ok(WEEKDAYS[n % 7].to_string()),
                Ok(n) => Err(Error::bad_request(format!(
                    "invalid day of week {n} in cron string"
                ))),
                Err(_) => Ok(part.to_string()),
            })
            .collect::<Result<Vec<_>>>()?
            .join("-");
        Ok(match step {
            Some(step) => format!("{base}/{step}"),
            None => base,
        })
    });
    Ok(items.collect::<Result<Vec<_>>>()?.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    #[test]
    fn test_rejects_short_expression() {
        assert!(CronExpr::parse("* * *").is_err());
    }

    #[test]
    fn test_rejects_every_second() {
        let err = CronExpr::parse("* * * * * *").unwrap_err();
        assert!(err.to_string().contains("Seconds"));
    }

    #[test]
    fn test_rejects_every_minute() {
        let err = CronExpr::parse("0 * * * * *").unwrap_err();
        assert!(err.to_string().contains("Minutes"));
    }

    #[test]
    fn test_accepts_hourly() {
        let cron = CronExpr::parse("0 0 * * * *").unwrap();
        assert_eq!(cron.as_str(), "0 0 * * * *");
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(CronExpr::parse("   ").is_err());
        assert!(CronExpr::parse("0 0 25 * * *").is_err());
        assert!(CronExpr::parse("0 0 1 * * 9").is_err());
    }

    #[test]
    fn test_next_after_hourly() {
        let cron = CronExpr::parse("0 0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();
        let next = cron.next_after(&now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn test_numeric_weekday_zero_is_sunday() {
        // 2024-03-01 is a Friday.
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        for expr in ["0 30 2 * * 0", "0 30 2 * * 7", "0 30 2 * * Sun"] {
            let next = CronExpr::parse(expr).unwrap().next_after(&now).unwrap();
            assert_eq!(next.weekday(), Weekday::Sun, "{expr}");
            assert_eq!((next.hour(), next.minute()), (2, 30));
        }
    }

    #[test]
    fn test_weekday_ranges_and_lists() {
        assert_eq!(normalize_weekdays("1-5").unwrap(), "Mon-Fri");
        assert_eq!(normalize_weekdays("0,6").unwrap(), "Sun,Sat");
        assert_eq!(normalize_weekdays("*/2").unwrap(), "*/2");
        assert_eq!(normalize_weekdays("?").unwrap(), "?");
        assert!(CronExpr::parse("0 0 9 * * 1-5").is_ok());
    }
}
