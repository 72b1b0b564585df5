//! Reporting periods
//!
//! A period token from the outside world ("minggu ini", "this month", "semua")
//! is translated exactly once into a [`Period`], which then resolves against a
//! reference instant into a concrete [`DateRange`].
//!
//! ## Fallback policy
//!
//! Unrecognized tokens are not errors. They resolve as [`Period::ThisWeek`],
//! the same as an empty token. Callers rely on this: the dashboard always
//! answers, even for a typo in the query string.
//!
//! ## Boundaries
//!
//! Weeks start on Monday (Sunday is day 7, not day 0). Every range covers whole
//! calendar days in the offset of the reference instant, and every end is the
//! start of the next unit minus one nanosecond so that records stamped at the
//! very end of a day are still inside.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone,
};
use serde::{Serialize, Serializer};
use std::ops::RangeInclusive;

/// A reporting period selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    /// Monday through Sunday of the current week
    #[default]
    ThisWeek,
    /// First through last day of the current month
    ThisMonth,
    /// January 1 through December 31 of the current year
    ThisYear,
    /// No temporal filter at all
    AllTime,
    /// Explicit inclusive calendar days
    Custom { start: NaiveDate, end: NaiveDate },
}

impl Period {
    /// Translate a free-text period token. Never fails; see the module docs.
    pub fn parse(token: &str) -> Self {
        if let Some(custom) = parse_custom(token.trim()) {
            return custom;
        }

        let normalized = normalize(token);
        match normalized.as_str() {
            "" | "this week" | "week" | "weekly" | "minggu ini" | "minggu" | "mingguan" => {
                Period::ThisWeek
            }
            "this month" | "month" | "monthly" | "bulan ini" | "bulan" | "bulanan" => {
                Period::ThisMonth
            }
            "this year" | "year" | "yearly" | "tahun ini" | "tahun" | "tahunan" => {
                Period::ThisYear
            }
            "all" | "all data" | "all time" | "semua" | "semua data" => Period::AllTime,
            other => {
                tracing::debug!(token = other, "Unrecognized period token, using this week");
                Period::ThisWeek
            }
        }
    }

    /// Stable machine key for logs and responses.
    pub fn key(&self) -> &'static str {
        match self {
            Period::ThisWeek => "this_week",
            Period::ThisMonth => "this_month",
            Period::ThisYear => "this_year",
            Period::AllTime => "all_time",
            Period::Custom { .. } => "custom",
        }
    }

    /// Resolve this period into a concrete range around `now`.
    pub fn resolve(&self, now: DateTime<FixedOffset>) -> DateRange {
        let offset = *now.offset();
        let today = now.date_naive();

        match self {
            Period::ThisWeek => DateRange::between(start_of_week(now), end_of_week(now)),
            Period::ThisMonth => {
                let first = today - Duration::days(today.day0() as i64);
                let next = first
                    .checked_add_months(Months::new(1))
                    .unwrap_or(NaiveDate::MAX);
                DateRange::between(midnight(first, offset), last_instant_before(next, offset))
            }
            Period::ThisYear => {
                let first = today - Duration::days(today.ordinal0() as i64);
                let next = first
                    .checked_add_months(Months::new(12))
                    .unwrap_or(NaiveDate::MAX);
                DateRange::between(midnight(first, offset), last_instant_before(next, offset))
            }
            Period::AllTime => DateRange::unbounded(),
            Period::Custom { start, end } => {
                let next = end.succ_opt().unwrap_or(NaiveDate::MAX);
                DateRange::between(midnight(*start, offset), last_instant_before(next, offset))
            }
        }
    }
}

/// Lowercase, fold `_`/`-` to spaces and collapse whitespace.
fn normalize(token: &str) -> String {
    token
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Years a custom range may name. Both bounds stay four-digit UTC years in
/// any offset, which keeps stored timestamp text in time order.
const CUSTOM_YEARS: RangeInclusive<i32> = 1..=9998;

/// `YYYY-MM-DD..YYYY-MM-DD`, inclusive, start not after end.
fn parse_custom(token: &str) -> Option<Period> {
    let (start, end) = token.split_once("..")?;
    let date = |raw: &str| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .filter(|d| CUSTOM_YEARS.contains(&d.year()))
    };
    let (start, end) = (date(start)?, date(end)?);
    (start <= end).then_some(Period::Custom { start, end })
}

/// 00:00:00 of `date` in `offset`, saturating at the ends of the calendar.
pub fn midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    let local = date.and_time(NaiveTime::MIN);
    let shift = Duration::seconds(offset.local_minus_utc() as i64);
    let utc = local.checked_sub_signed(shift).unwrap_or(if offset.local_minus_utc() > 0 {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    });
    offset.from_utc_datetime(&utc)
}

fn last_instant_before(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    let next = midnight(date, offset);
    next.checked_sub_signed(Duration::nanoseconds(1)).unwrap_or(next)
}

/// Monday 00:00:00 of the week containing `ts`.
pub fn start_of_week(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    // number_from_monday: Monday = 1 ... Sunday = 7
    let days_since_monday = ts.weekday().number_from_monday() as i64 - 1;
    midnight(ts.date_naive() - Duration::days(days_since_monday), *ts.offset())
}

/// Sunday 23:59:59.999999999 of the week containing `ts`.
pub fn end_of_week(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    start_of_week(ts) + Duration::days(7) - Duration::nanoseconds(1)
}

/// A resolved reporting window.
///
/// When enabled, `start <= end`, both inclusive. A disabled range means "all
/// history" and filters nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    bounds: Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)>,
}

impl DateRange {
    /// The "no filter" range.
    pub fn unbounded() -> Self {
        Self { bounds: None }
    }

    /// An inclusive range. Reversed arguments are swapped.
    pub fn between(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        let bounds = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        Self {
            bounds: Some(bounds),
        }
    }

    pub fn enabled(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn bounds(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        self.bounds
    }

    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        self.bounds.map(|(start, _)| start)
    }

    pub fn end(&self) -> Option<DateTime<FixedOffset>> {
        self.bounds.map(|(_, end)| end)
    }

    /// Whether `ts` falls inside. Always true when disabled.
    pub fn contains<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> bool {
        match self.bounds {
            Some((start, end)) => *ts >= start && *ts <= end,
            None => true,
        }
    }

    /// Overlap of `[start, end]` with this range, or `None` when they are disjoint.
    pub fn intersect(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        match self.bounds {
            None => Some((start, end)),
            Some((range_start, range_end)) => {
                if end < range_start || start > range_end {
                    None
                } else {
                    Some((start.max(range_start), end.min(range_end)))
                }
            }
        }
    }
}

impl Serialize for DateRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr {
            enabled: bool,
            start: Option<DateTime<FixedOffset>>,
            end: Option<DateTime<FixedOffset>>,
        }

        Repr {
            enabled: self.enabled(),
            start: self.start(),
            end: self.end(),
        }
        .serialize(serializer)
    }
}
