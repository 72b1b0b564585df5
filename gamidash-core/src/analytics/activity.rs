//! Recent activity feed
//!
//! Challenge completions and habit completions are read as two separate
//! sources, each newest first and capped. Rows missing their user or their
//! challenge/habit are dropped. The survivors are merged into one feed sorted
//! by timestamp, newest first, and truncated.

use crate::analytics::period::DateRange;
use crate::config::DashboardConfig;
use crate::db::query::{Query, Table};
use crate::error::Result;
use crate::store::StatsStore;
use crate::types::{
    ActorRef, ChallengeCompletionRow, HabitCompletionRow, HabitStatus, ParticipantStatus,
};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

/// What a feed entry reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ChallengeCompletion,
    HabitCompletion,
}

/// One entry of the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub message: String,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ActorRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp: Option<i64>,
}

/// Window the feed reads from.
///
/// An enabled range is used as is. An unbounded range becomes the trailing
/// `window_days` ending at `now` when configured, and stays unbounded otherwise.
/// A window reaching past the calendar also stays unbounded.
pub fn activity_window(
    range: &DateRange,
    now: DateTime<FixedOffset>,
    window_days: Option<u32>,
) -> DateRange {
    match (range.enabled(), window_days) {
        (false, Some(days)) => now
            .checked_sub_signed(Duration::days(days as i64))
            .map_or(*range, |start| DateRange::between(start, now)),
        _ => *range,
    }
}

fn stamp(submitted_at: Option<DateTime<Utc>>, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    match submitted_at {
        Some(ts) => ts.with_timezone(now.offset()),
        None => now,
    }
}

/// Feed entries for completed challenges.
pub fn challenge_activities(
    rows: Vec<ChallengeCompletionRow>,
    now: DateTime<FixedOffset>,
) -> Vec<Activity> {
    let mut activities = Vec::with_capacity(rows.len());
    for row in rows {
        let user = row.user.filter(|u| u.id != 0);
        let challenge = row.challenge.filter(|c| c.id != 0);
        let (Some(user), Some(challenge)) = (user, challenge) else {
            tracing::debug!(participant_id = row.id, "Dropping completion with missing relation");
            continue;
        };

        activities.push(Activity {
            kind: ActivityKind::ChallengeCompletion,
            message: format!("{} menyelesaikan Challenge {}", user.name, challenge.title),
            timestamp: stamp(row.submitted_at, now),
            user: Some(user),
            xp: Some(challenge.xp),
        });
    }
    activities
}

/// Feed entries for completed habit logs.
pub fn habit_activities(rows: Vec<HabitCompletionRow>, now: DateTime<FixedOffset>) -> Vec<Activity> {
    let mut activities = Vec::with_capacity(rows.len());
    for row in rows {
        let user = row.user.filter(|u| u.id != 0);
        let habit = row.habit.filter(|h| h.id != 0);
        let (Some(user), Some(habit)) = (user, habit) else {
            tracing::debug!(habit_log_id = row.id, "Dropping completion with missing relation");
            continue;
        };

        activities.push(Activity {
            kind: ActivityKind::HabitCompletion,
            message: format!("{} menyelesaikan Habit {}", user.name, habit.title),
            timestamp: stamp(row.submitted_at, now),
            user: Some(user),
            xp: Some(habit.xp),
        });
    }
    activities
}

/// Merge both sources newest first and keep at most `limit` entries.
///
/// The sort is stable: on equal timestamps challenge entries come before habit
/// entries, and each source keeps its own order.
pub fn merge_activities(
    challenges: Vec<Activity>,
    habits: Vec<Activity>,
    limit: usize,
) -> Vec<Activity> {
    let mut merged = challenges;
    merged.extend(habits);
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged.truncate(limit);
    merged
}

/// Read both completion sources and build the feed.
pub fn recent_activities(
    store: &dyn StatsStore,
    range: &DateRange,
    now: DateTime<FixedOffset>,
    settings: &DashboardConfig,
) -> Result<Vec<Activity>> {
    let window = activity_window(range, now, settings.unbounded_activity_window_days);

    let challenge_rows = store.list_challenge_completions(
        &Query::table(Table::ChallengeParticipants)
            .eq("status", ParticipantStatus::Completed.as_str())
            .scoped(&window, "submitted_at")
            .order_by_desc("submitted_at")
            .limit(settings.activity_source_limit),
    )?;
    let habit_rows = store.list_habit_completions(
        &Query::table(Table::HabitLogs)
            .eq("status", HabitStatus::Completed.as_str())
            .scoped(&window, "submitted_at")
            .order_by_desc("submitted_at")
            .limit(settings.activity_source_limit),
    )?;

    Ok(merge_activities(
        challenge_activities(challenge_rows, now),
        habit_activities(habit_rows, now),
        settings.recent_activity_limit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChallengeRef, HabitRef};
    use chrono::TimeZone;

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        wib().with_ymd_and_hms(2024, 6, 12, 10, 0, 0).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 11, hour, 0, 0).unwrap()
    }

    fn actor(id: i64, name: &str) -> Option<ActorRef> {
        Some(ActorRef {
            id,
            name: name.to_string(),
        })
    }

    fn challenge_row(id: i64, hour: Option<u32>, user: Option<ActorRef>) -> ChallengeCompletionRow {
        ChallengeCompletionRow {
            id,
            submitted_at: hour.map(at),
            user,
            challenge: Some(ChallengeRef {
                id: 7,
                title: "Baca 5 Buku".to_string(),
                xp: 100,
            }),
        }
    }

    fn habit_row(id: i64, hour: u32) -> HabitCompletionRow {
        HabitCompletionRow {
            id,
            submitted_at: Some(at(hour)),
            user: actor(2, "Budi"),
            habit: Some(HabitRef {
                id: 3,
                title: "Minum Air".to_string(),
                xp: 10,
            }),
        }
    }

    #[test]
    fn test_challenge_message_and_reward() {
        let activities = challenge_activities(vec![challenge_row(1, Some(4), actor(1, "Ani"))], now());
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].message, "Ani menyelesaikan Challenge Baca 5 Buku");
        assert_eq!(activities[0].kind, ActivityKind::ChallengeCompletion);
        assert_eq!(activities[0].xp, Some(100));
        assert_eq!(activities[0].timestamp, at(4));
    }

    #[test]
    fn test_missing_relations_dropped() {
        let mut no_challenge = challenge_row(3, Some(5), actor(1, "Ani"));
        no_challenge.challenge = None;
        let rows = vec![
            challenge_row(1, Some(4), None),
            challenge_row(2, Some(4), actor(0, "")),
            no_challenge,
        ];
        assert!(challenge_activities(rows, now()).is_empty());

        let mut zero_habit = habit_row(1, 3);
        zero_habit.habit = Some(HabitRef {
            id: 0,
            title: String::new(),
            xp: 0,
        });
        assert!(habit_activities(vec![zero_habit], now()).is_empty());
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        let activities = challenge_activities(vec![challenge_row(1, None, actor(1, "Ani"))], now());
        assert_eq!(activities[0].timestamp, now());
    }

    #[test]
    fn test_merge_sorts_across_sources() {
        let challenges = challenge_activities(
            vec![
                challenge_row(1, Some(9), actor(1, "Ani")),
                challenge_row(2, Some(2), actor(1, "Ani")),
            ],
            now(),
        );
        let habits = habit_activities(vec![habit_row(1, 7), habit_row(2, 5)], now());

        let merged = merge_activities(challenges, habits, 10);
        let hours: Vec<_> = merged
            .iter()
            .map(|a| a.timestamp.with_timezone(&Utc))
            .collect();
        assert_eq!(hours, vec![at(9), at(7), at(5), at(2)]);

        for pair in merged.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn test_merge_truncates() {
        let habits = habit_activities((0..8).map(|i| habit_row(i, i as u32)).collect(), now());
        let challenges = challenge_activities(
            (0..8)
                .map(|i| challenge_row(i, Some(i as u32 + 10), actor(1, "Ani")))
                .collect(),
            now(),
        );

        let merged = merge_activities(challenges, habits, 10);
        assert_eq!(merged.len(), 10);
        assert_eq!(merged[0].timestamp, at(17));
        assert_eq!(merged[9].timestamp, at(6));
    }

    #[test]
    fn test_activity_window() {
        let week = DateRange::between(now() - Duration::days(2), now());
        assert_eq!(activity_window(&week, now(), Some(7)), week);

        let unbounded = DateRange::unbounded();
        assert_eq!(activity_window(&unbounded, now(), None), unbounded);

        let trailing = activity_window(&unbounded, now(), Some(7));
        assert_eq!(trailing.start(), Some(now() - Duration::days(7)));
        assert_eq!(trailing.end(), Some(now()));

        assert_eq!(activity_window(&unbounded, now(), Some(u32::MAX)), unbounded);
    }

    #[test]
    fn test_activity_serialization() {
        let activity = &challenge_activities(vec![challenge_row(1, Some(4), actor(1, "Ani"))], now())[0];
        let json = serde_json::to_value(activity).unwrap();
        assert_eq!(json["type"], "challenge_completion");
        assert_eq!(json["user"]["name"], "Ani");
        assert_eq!(json["xp"], 100);
        assert_eq!(json["timestamp"], "2024-06-11T11:00:00+07:00");
    }
}
