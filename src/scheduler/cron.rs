//! A minimal 5-field cron parser: minute, hour, day-of-month, month,
//! day-of-week. Supports `*` and comma-separated lists; no step/range
//! syntax. Enough to express the documented daily snapshot schedule
//! (`0 3 * * *`) without pulling in an external cron crate.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Any,
    List(Vec<u32>),
}

impl Field {
    fn parse(raw: &str, min: u32, max: u32) -> Result<Self, EngineError> {
        if raw == "*" {
            return Ok(Field::Any);
        }
        let mut values = Vec::new();
        for part in raw.split(',') {
            let v: u32 = part
                .trim()
                .parse()
                .map_err(|_| EngineError::Validation(format!("invalid cron field value '{part}'")))?;
            if v < min || v > max {
                return Err(EngineError::Validation(format!("cron field value {v} out of range [{min}, {max}]")));
            }
            values.push(v);
        }
        if values.is_empty() {
            return Err(EngineError::Validation("cron field has no values".into()));
        }
        Ok(Field::List(values))
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::List(values) => values.contains(&value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

const SEARCH_LIMIT_MINUTES: i64 = 366 * 2 * 24 * 60;

impl CronExpr {
    /// Parses a standard 5-field expression (`minute hour dom month dow`).
    pub fn parse(expr: &str) -> Result<Self, EngineError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(EngineError::Validation(format!(
                "cron expression '{expr}' must have exactly 5 fields, got {}",
                fields.len()
            )));
        }
        Ok(CronExpr {
            minute: Field::parse(fields[0], 0, 59)?,
            hour: Field::parse(fields[1], 0, 23)?,
            day_of_month: Field::parse(fields[2], 1, 31)?,
            month: Field::parse(fields[3], 1, 12)?,
            day_of_week: Field::parse(fields[4], 0, 6)?,
        })
    }

    fn matches(&self, dt: DateTime<Utc>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day_of_month.matches(dt.day())
            && self.month.matches(dt.month())
            && self.day_of_week.matches(dt.weekday().num_days_from_sunday())
    }

    /// The next minute-aligned instant strictly after `after` that
    /// satisfies this expression, found by linear minute-by-minute search.
    /// Errors out rather than looping forever if nothing matches within
    /// two years (an impossible combination, e.g. day 31 of February).
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, EngineError> {
        let start = (after + Duration::minutes(1))
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(after);
        let mut candidate = start;
        for _ in 0..SEARCH_LIMIT_MINUTES {
            if self.matches(candidate) {
                return Ok(candidate);
            }
            candidate += Duration::minutes(1);
        }
        Err(EngineError::Validation(format!(
            "cron expression never matches within {SEARCH_LIMIT_MINUTES} minutes (impossible calendar combination?)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_3am_fires_at_the_right_instant() {
        let expr = CronExpr::parse("0 3 * * *").unwrap();
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let next = expr.next_after(start).unwrap();
        assert_eq!(next, DateTime::parse_from_rfc3339("2026-01-01T03:00:00Z").unwrap().with_timezone(&Utc));
    }

    #[test]
    fn next_after_rolls_over_to_the_following_day_once_past() {
        let expr = CronExpr::parse("0 3 * * *").unwrap();
        let start = DateTime::parse_from_rfc3339("2026-01-01T03:00:00Z").unwrap().with_timezone(&Utc);
        let next = expr.next_after(start).unwrap();
        assert_eq!(next, DateTime::parse_from_rfc3339("2026-01-02T03:00:00Z").unwrap().with_timezone(&Utc));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(CronExpr::parse("0 3 * *").is_err());
        assert!(CronExpr::parse("60 3 * * *").is_err());
    }

    #[test]
    fn comma_lists_match_any_listed_value() {
        let expr = CronExpr::parse("0 3,15 * * *").unwrap();
        let morning = DateTime::parse_from_rfc3339("2026-01-01T03:00:00Z").unwrap().with_timezone(&Utc);
        let afternoon = DateTime::parse_from_rfc3339("2026-01-01T15:00:00Z").unwrap().with_timezone(&Utc);
        assert!(expr.matches(morning));
        assert!(expr.matches(afternoon));
    }
}
