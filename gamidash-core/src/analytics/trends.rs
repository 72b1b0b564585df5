//! Weekly habit trend
//!
//! Five consecutive calendar weeks ending at a reference instant: the end of
//! the reporting range, or `now` when the range is unbounded. With a range
//! enabled, weeks that miss it are dropped and the rest are clipped to it, so
//! every point describes time inside the requested period.

use crate::analytics::period::{end_of_week, start_of_week, DateRange};
use crate::db::query::{Query, Table};
use crate::error::Result;
use crate::store::StatsStore;
use crate::types::HabitStatus;
use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

/// Number of weekly buckets, oldest first.
pub const TREND_WEEKS: i64 = 5;

/// Done / not-done habit logs for one (possibly clipped) week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyTrendPoint {
    /// Human-readable bounds, e.g. "Jun 10 – Jun 16"
    pub week: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub done: i64,
    pub not_done: i64,
}

/// The week windows the trend queries, oldest first.
pub fn trend_windows(
    range: &DateRange,
    now: DateTime<FixedOffset>,
) -> Vec<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let reference = range.end().unwrap_or(now);

    (0..TREND_WEEKS)
        .rev()
        .filter_map(|weeks_back| {
            let anchor = reference - Duration::days(7 * weeks_back);
            range.intersect(start_of_week(anchor), end_of_week(anchor))
        })
        .collect()
}

/// Label for a queried window, in the window's own offset.
pub fn week_label(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> String {
    format!("{} – {}", start.format("%b %-d"), end.format("%b %-d"))
}

/// Count habit logs per week, scoped on the log's `date`.
///
/// `done` is status `completed`; `not_done` is status `joined` or `submitted`.
pub fn habit_trends(
    store: &dyn StatsStore,
    range: &DateRange,
    now: DateTime<FixedOffset>,
) -> Result<Vec<WeeklyTrendPoint>> {
    trend_windows(range, now)
        .into_iter()
        .map(|(start, end)| {
            let window = DateRange::between(start, end);
            let done = Query::table(Table::HabitLogs)
                .eq("status", HabitStatus::Completed.as_str())
                .scoped(&window, "date");
            let not_done = Query::table(Table::HabitLogs)
                .within(
                    "status",
                    [HabitStatus::Joined.as_str(), HabitStatus::Submitted.as_str()],
                )
                .scoped(&window, "date");

            Ok(WeeklyTrendPoint {
                week: week_label(start, end),
                start,
                end,
                done: store.count(&done)?,
                not_done: store.count(&not_done)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::period::Period;
    use crate::db::Database;
    use crate::types::NewHabitLog;
    use chrono::{Datelike, NaiveDate, TimeZone, Utc, Weekday};

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        wib().with_ymd_and_hms(2024, 6, 12, 10, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unbounded_gives_five_full_weeks() {
        let windows = trend_windows(&DateRange::unbounded(), now());
        assert_eq!(windows.len(), 5);

        assert_eq!(windows[0].0, wib().with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap());
        assert_eq!(windows[4].0, wib().with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap());
        for (start, end) in &windows {
            assert_eq!(start.weekday(), Weekday::Mon);
            assert_eq!(end.weekday(), Weekday::Sun);
        }
        for pair in windows.windows(2) {
            assert!(pair[0].1 < pair[1].0);
        }
    }

    #[test]
    fn test_single_week_range_gives_one_point() {
        let range = Period::ThisWeek.resolve(now());
        let windows = trend_windows(&range, now());
        assert_eq!(windows, vec![range.bounds().unwrap()]);
    }

    #[test]
    fn test_month_range_clips_first_week() {
        let range = Period::ThisMonth.resolve(now());
        let windows = trend_windows(&range, now());

        // June 2024 starts on a Saturday and ends on a Sunday
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].0, range.start().unwrap());
        assert_eq!(windows[0].1.date_naive(), date(2024, 6, 2));
        assert_eq!(windows[4].1, range.end().unwrap());
        for (start, end) in &windows {
            assert!(range.contains(start) && range.contains(end));
        }
    }

    #[test]
    fn test_custom_range_skips_disjoint_weeks() {
        let range = Period::Custom {
            start: date(2024, 6, 5),
            end: date(2024, 6, 12),
        }
        .resolve(now());
        let windows = trend_windows(&range, now());

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].0.date_naive(), date(2024, 6, 5));
        assert_eq!(windows[0].1.date_naive(), date(2024, 6, 9));
        assert_eq!(windows[1].0.date_naive(), date(2024, 6, 10));
        assert_eq!(windows[1].1, range.end().unwrap());
    }

    #[test]
    fn test_week_label() {
        let start = wib().with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        assert_eq!(week_label(start, end_of_week(start)), "Jun 10 – Jun 16");
    }

    #[test]
    fn test_habit_trends_counts() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let monday = wib().with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let last_week = monday - Duration::days(7);
        for (day, status) in [
            (monday, HabitStatus::Completed),
            (monday, HabitStatus::Joined),
            (monday, HabitStatus::Submitted),
            (last_week, HabitStatus::Completed),
        ] {
            db.insert_habit_log(&NewHabitLog {
                habit_id: 1,
                user_id: 1,
                date: day.with_timezone(&Utc),
                status,
                submitted_at: None,
            })
            .unwrap();
        }

        let points = habit_trends(&db, &DateRange::unbounded(), now()).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!((points[4].done, points[4].not_done), (1, 2));
        assert_eq!((points[3].done, points[3].not_done), (1, 0));
        assert_eq!(points[4].week, "Jun 10 – Jun 16");
        assert!(points[..3].iter().all(|p| p.done == 0 && p.not_done == 0));
    }
}
