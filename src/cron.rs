//! Minute-granularity cron matching.
//!
//! A [`CronSpec`] holds one [`CronField`] per calendar unit. Matching is done
//! against UTC calendar fields only; there is no DST handling and no seconds
//! field. [`next_cron`] walks forward minute by minute and gives up after
//! [`CRON_SEARCH_HORIZON_MINUTES`] steps so that a spec which can never match
//! (day 31 of February) terminates with `None`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use cron::{Schedule, TimeUnitSpec};
use log::{debug, trace};

use crate::errors::TaskclockError;
use crate::Result;

/// Number of minute steps [`next_cron`] tries before giving up: one non-leap year.
pub const CRON_SEARCH_HORIZON_MINUTES: u32 = 525_600;

/// A single cron field: either `*` or an explicit set of values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CronField {
    /// Matches every value (`*`).
    #[default]
    Any,
    /// Matches only the listed values.
    Values(BTreeSet<u32>),
}

impl CronField {
    /// Builds an explicit field from a list of values.
    pub fn values<I: IntoIterator<Item = u32>>(values: I) -> Self {
        CronField::Values(values.into_iter().collect())
    }

    /// Returns `true` if `value` satisfies this field.
    pub fn matches(&self, value: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Values(set) => set.contains(&value),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, CronField::Any)
    }

    fn check_range(&self, unit: &str, min: u32, max: u32) -> Result<()> {
        if let CronField::Values(set) = self {
            if let Some(bad) = set.iter().find(|v| **v < min || **v > max) {
                return Err(TaskclockError::Config(format!(
                    "{} value {} is outside {}..={}",
                    unit, bad, min, max
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronField::Any => write!(f, "*"),
            CronField::Values(set) => {
                let parts: Vec<String> = set.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// A cron pattern over minute, hour, day of month, month and day of week.
///
/// Days of week run `0..=6` with Sunday as 0, months `1..=12`, days of month
/// `1..=31`. All fields default to [`CronField::Any`].
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use taskclock::CronSpec;
///
/// // Every day at 09:00 UTC
/// let spec = CronSpec::every_minute().with_minutes(&[0]).with_hours(&[9]);
/// let from = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 30).unwrap();
/// assert_eq!(
///     spec.next_after(from),
///     Some(Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap())
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CronSpec {
    pub minutes: CronField,
    pub hours: CronField,
    pub days_of_month: CronField,
    pub months: CronField,
    pub days_of_week: CronField,
}

impl CronSpec {
    /// A spec that matches every minute.
    pub fn every_minute() -> Self {
        CronSpec::default()
    }

    pub fn with_minutes(mut self, values: &[u32]) -> Self {
        self.minutes = CronField::values(values.iter().copied());
        self
    }

    pub fn with_hours(mut self, values: &[u32]) -> Self {
        self.hours = CronField::values(values.iter().copied());
        self
    }

    pub fn with_days_of_month(mut self, values: &[u32]) -> Self {
        self.days_of_month = CronField::values(values.iter().copied());
        self
    }

    pub fn with_months(mut self, values: &[u32]) -> Self {
        self.months = CronField::values(values.iter().copied());
        self
    }

    pub fn with_days_of_week(mut self, values: &[u32]) -> Self {
        self.days_of_week = CronField::values(values.iter().copied());
        self
    }

    /// Parses a classic five-field expression (`minute hour dom month dow`).
    ///
    /// Lists, ranges, steps and names are accepted as the `cron` crate
    /// understands them. Numeric days of week follow that crate's numbering,
    /// where 1 is Sunday; prefer names (`MON-FRI`) to stay unambiguous.
    ///
    /// # Errors
    ///
    /// Returns [`TaskclockError::CronParse`] if the expression does not have
    /// exactly five fields or cannot be parsed.
    pub fn parse(expression: &str) -> Result<Self> {
        debug!("Parsing cron expression: {}", expression);

        let fields = expression.split_whitespace().count();
        if fields != 5 {
            return Err(TaskclockError::CronParse(format!(
                "Invalid cron expression '{}': expected 5 fields, found {}",
                expression, fields
            )));
        }

        // The cron crate wants a leading seconds field.
        let schedule = Schedule::from_str(&format!("0 {}", expression)).map_err(|e| {
            TaskclockError::CronParse(format!("Invalid cron expression '{}': {}", expression, e))
        })?;

        Ok(CronSpec {
            minutes: flatten(schedule.minutes(), 60, 0),
            hours: flatten(schedule.hours(), 24, 0),
            days_of_month: flatten(schedule.days_of_month(), 31, 0),
            months: flatten(schedule.months(), 12, 0),
            days_of_week: flatten(schedule.days_of_week(), 7, 1),
        })
    }

    /// Checks that every explicit value lies within its unit's range.
    pub fn validate(&self) -> Result<()> {
        self.minutes.check_range("minute", 0, 59)?;
        self.hours.check_range("hour", 0, 23)?;
        self.days_of_month.check_range("day of month", 1, 31)?;
        self.months.check_range("month", 1, 12)?;
        self.days_of_week.check_range("day of week", 0, 6)
    }

    /// Returns `true` if `instant` satisfies every field.
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        matches_cron(self, instant)
    }

    /// The first matching minute after `from`, within the default horizon.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        next_cron(self, from)
    }
}

/// Collapses a parsed time unit to `Any` when it covers its full range.
fn flatten(unit: &impl TimeUnitSpec, full: u32, offset: u32) -> CronField {
    if unit.count() == full {
        CronField::Any
    } else {
        CronField::values(unit.iter().map(|ordinal| ordinal - offset))
    }
}

impl FromStr for CronSpec {
    type Err = TaskclockError;

    fn from_str(s: &str) -> Result<Self> {
        CronSpec::parse(s)
    }
}

impl fmt::Display for CronSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minutes, self.hours, self.days_of_month, self.months, self.days_of_week
        )
    }
}

/// Returns `true` iff `instant`'s UTC minute, hour, day of month, month and
/// day of week each satisfy the corresponding field of `spec`.
pub fn matches_cron(spec: &CronSpec, instant: DateTime<Utc>) -> bool {
    spec.minutes.matches(instant.minute())
        && spec.hours.matches(instant.hour())
        && spec.days_of_month.matches(instant.day())
        && spec.months.matches(instant.month())
        && spec.days_of_week.matches(instant.weekday().num_days_from_sunday())
}

/// Finds the earliest matching minute strictly after `from`'s minute.
///
/// Returns `None` if nothing matches within [`CRON_SEARCH_HORIZON_MINUTES`].
pub fn next_cron(spec: &CronSpec, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    next_cron_within(spec, from, CRON_SEARCH_HORIZON_MINUTES)
}

/// Like [`next_cron`] with an explicit step bound.
pub fn next_cron_within(
    spec: &CronSpec,
    from: DateTime<Utc>,
    horizon_minutes: u32,
) -> Option<DateTime<Utc>> {
    trace!("Searching next match for '{}' after {}", spec, from);

    let mut candidate = truncate_to_minute(from) + Duration::minutes(1);
    for _ in 0..horizon_minutes {
        if matches_cron(spec, candidate) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }

    debug!(
        "No match for '{}' within {} minutes of {}",
        spec, horizon_minutes, from
    );
    None
}

fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_any_matches_everything() {
        let spec = CronSpec::every_minute();
        assert!(matches_cron(&spec, at(2023, 7, 14, 3, 17, 0)));
    }

    #[test]
    fn test_explicit_fields() {
        // 2024-01-01 is a Monday
        let spec = CronSpec::every_minute()
            .with_minutes(&[30])
            .with_hours(&[14])
            .with_days_of_week(&[1]);
        assert!(matches_cron(&spec, at(2024, 1, 1, 14, 30, 0)));
        assert!(!matches_cron(&spec, at(2024, 1, 2, 14, 30, 0)));
        assert!(!matches_cron(&spec, at(2024, 1, 1, 14, 31, 0)));
    }

    #[test]
    fn test_next_starts_after_current_minute() {
        let spec = CronSpec::every_minute();
        let from = at(2024, 3, 5, 10, 15, 0);
        assert_eq!(next_cron(&spec, from), Some(at(2024, 3, 5, 10, 16, 0)));

        let from = at(2024, 3, 5, 10, 15, 59);
        assert_eq!(next_cron(&spec, from), Some(at(2024, 3, 5, 10, 16, 0)));
    }

    #[test]
    fn test_next_rolls_to_following_day() {
        let spec = CronSpec::every_minute().with_minutes(&[0]).with_hours(&[9]);
        let from = at(2024, 1, 1, 9, 0, 30);
        assert_eq!(next_cron(&spec, from), Some(at(2024, 1, 2, 9, 0, 0)));
    }

    #[test]
    fn test_next_midnight() {
        let spec = CronSpec::parse("0 0 * * *").unwrap();
        let from = at(2023, 1, 1, 12, 0, 0);
        assert_eq!(next_cron(&spec, from), Some(at(2023, 1, 2, 0, 0, 0)));
    }

    #[test]
    fn test_unsatisfiable_returns_none() {
        let spec = CronSpec::every_minute()
            .with_days_of_month(&[31])
            .with_months(&[2]);
        assert_eq!(next_cron(&spec, at(2024, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn test_leap_day_beyond_horizon() {
        // Feb 29 2028 is more than a year away from early 2026.
        let spec = CronSpec::every_minute()
            .with_minutes(&[0])
            .with_hours(&[0])
            .with_days_of_month(&[29])
            .with_months(&[2]);
        assert_eq!(next_cron(&spec, at(2026, 3, 1, 0, 0, 0)), None);
        assert_eq!(
            next_cron(&spec, at(2027, 6, 1, 0, 0, 0)),
            Some(at(2028, 2, 29, 0, 0, 0))
        );
    }

    #[test]
    fn test_horizon_is_tunable() {
        let spec = CronSpec::every_minute().with_minutes(&[0]);
        let from = at(2024, 1, 1, 10, 5, 0);
        assert_eq!(next_cron_within(&spec, from, 30), None);
        assert_eq!(
            next_cron_within(&spec, from, 60),
            Some(at(2024, 1, 1, 11, 0, 0))
        );
    }

    #[test]
    fn test_parse_valid_expression() {
        let spec = CronSpec::parse("*/15 9-17 * * MON-FRI").unwrap();
        assert_eq!(spec.minutes, CronField::values([0, 15, 30, 45]));
        assert_eq!(spec.hours, CronField::values(9..=17));
        assert!(spec.days_of_month.is_any());
        assert!(spec.months.is_any());
        assert_eq!(spec.days_of_week, CronField::values(1..=5));
    }

    #[test]
    fn test_parse_every_minute() {
        let spec: CronSpec = "* * * * *".parse().unwrap();
        assert_eq!(spec, CronSpec::every_minute());
        assert_eq!(spec.to_string(), "* * * * *");
    }

    #[test]
    fn test_parse_invalid_expression() {
        assert!(CronSpec::parse("invalid").is_err());
        assert!(CronSpec::parse("0 0 * * * *").is_err());
        assert!(CronSpec::parse("61 * * * *").is_err());
    }

    #[test]
    fn test_display_lists_values() {
        let spec = CronSpec::every_minute().with_minutes(&[30, 0]).with_hours(&[9]);
        assert_eq!(spec.to_string(), "0,30 9 * * *");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(CronSpec::every_minute().with_hours(&[24]).validate().is_err());
        assert!(CronSpec::every_minute().with_days_of_week(&[7]).validate().is_err());
        assert!(CronSpec::every_minute()
            .with_days_of_month(&[31])
            .with_months(&[2])
            .validate()
            .is_ok());
    }
}
