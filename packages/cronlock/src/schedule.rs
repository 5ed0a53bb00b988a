//! Six-field cron schedule parsing.
//!
//! Expressions use the seconds-resolution format the tick engine understands:
//! `sec min hour day-of-month month day-of-week`, e.g. `"0 0 3 * * *"` for
//! 03:00:00 daily. Wildcards, ranges (`1-5`), steps (`*/5`) and lists
//! (`1,3,5`) are accepted; five- and seven-field expressions are not.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::Error;

const FIELD_COUNT: usize = 6;

/// A parsed cron schedule.
#[derive(Debug, Clone)]
pub struct Schedule {
    inner: cron::Schedule,
    expression: String,
}

impl Schedule {
    /// Parse a six-field cron expression.
    pub fn parse(expression: &str) -> Result<Self, Error> {
        let fields = expression.split_whitespace().count();
        if fields != FIELD_COUNT {
            return Err(Error::InvalidSchedule {
                expression: expression.to_string(),
                reason: format!("expected {FIELD_COUNT} fields, got {fields}"),
            });
        }

        let inner = cron::Schedule::from_str(expression).map_err(|e| Error::InvalidSchedule {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            inner,
            expression: expression.to_string(),
        })
    }

    /// The next fire time strictly after `now`. `None` only for schedules
    /// with no future occurrence (e.g. a fixed date in the past).
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&now).next()
    }

    /// The original expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Next fire time for `expression` relative to the current wall clock.
pub fn next_run_time(expression: &str) -> Result<Option<DateTime<Utc>>, Error> {
    Ok(Schedule::parse(expression)?.next_after(Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_second_fires_within_a_second() {
        let schedule = Schedule::parse("* * * * * *").unwrap();
        let now = Utc::now();
        let next = schedule.next_after(now).unwrap();
        assert!(next > now);
        assert!(next - now <= chrono::Duration::seconds(1));
    }

    #[test]
    fn every_minute_fires_on_the_minute() {
        let schedule = Schedule::parse("0 * * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap();
        let next = schedule.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 12, 31, 0).unwrap());
    }

    #[test]
    fn daily_at_three_skips_to_next_day() {
        let schedule = Schedule::parse("0 0 3 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap();
        let next = schedule.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 3, 0, 0).unwrap());
    }

    #[test]
    fn next_is_strictly_future_on_exact_boundary() {
        let schedule = Schedule::parse("0 0 3 * * *").unwrap();
        let boundary = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        let next = schedule.next_after(boundary).unwrap();
        assert!(next > boundary);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 3, 0, 0).unwrap());
    }

    #[test]
    fn deterministic_across_calls() {
        let a = Schedule::parse("*/5 * * * * *").unwrap();
        let b = Schedule::parse("*/5 * * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 2).unwrap();
        assert_eq!(a.next_after(now), b.next_after(now));
    }

    #[test]
    fn ranges_steps_and_lists_parse() {
        for expr in ["0 1-5 * * * *", "*/5 * * * * *", "0 1,3,5 * * * *"] {
            Schedule::parse(expr).unwrap();
        }
    }

    #[test]
    fn five_fields_rejected() {
        let err = Schedule::parse("* * * * *").unwrap_err();
        assert!(matches!(err, Error::InvalidSchedule { .. }));
    }

    #[test]
    fn seven_fields_rejected() {
        let err = Schedule::parse("* * * * * * *").unwrap_err();
        assert!(matches!(err, Error::InvalidSchedule { .. }));
    }

    #[test]
    fn malformed_expression_rejected() {
        assert!(Schedule::parse("not a cron string at all").is_err());
        assert!(Schedule::parse("61 * * * * *").is_err());
    }
}
