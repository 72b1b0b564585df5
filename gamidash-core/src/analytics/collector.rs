//! Aggregate collector
//!
//! The fixed battery of count and list queries behind the dashboard. Each
//! aggregate is a plain function over a [`StatsStore`] so the engine can run
//! them independently and degrade one without touching the others.
//!
//! Headcounts and "currently active" challenge counts ignore the reporting
//! range. Habit, reflection and mood statistics are scoped to it.
//!
//! ## Habit done / not done
//!
//! Both counts are scoped on `submitted_at`. With a range enabled, logs that
//! were never submitted match neither count, so `done + not_done` can be less
//! than the number of logs. Only logs with a submission event take part in
//! period statistics; this is intended.

use crate::analytics::period::DateRange;
use crate::db::query::{Query, Table};
use crate::error::Result;
use crate::store::StatsStore;
use crate::types::{ChallengeType, HabitStatus, Mood, Role, StudentSummary};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Names of the independently computed dashboard statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    UserCounts,
    ChallengeCounts,
    HabitCounts,
    Reflections,
    TopStudents,
    MoodDistribution,
    HabitTrends,
    RecentActivities,
    ChallengeProgress,
}

impl Aggregate {
    pub const ALL: [Aggregate; 9] = [
        Aggregate::UserCounts,
        Aggregate::ChallengeCounts,
        Aggregate::HabitCounts,
        Aggregate::Reflections,
        Aggregate::TopStudents,
        Aggregate::MoodDistribution,
        Aggregate::HabitTrends,
        Aggregate::RecentActivities,
        Aggregate::ChallengeProgress,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::UserCounts => "user_counts",
            Aggregate::ChallengeCounts => "challenge_counts",
            Aggregate::HabitCounts => "habit_counts",
            Aggregate::Reflections => "reflections",
            Aggregate::TopStudents => "top_students",
            Aggregate::MoodDistribution => "mood_distribution",
            Aggregate::HabitTrends => "habit_trends",
            Aggregate::RecentActivities => "recent_activities",
            Aggregate::ChallengeProgress => "challenge_progress",
        }
    }
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Current headcounts by role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCounts {
    pub students: i64,
    pub teachers: i64,
    pub parents: i64,
    /// Every user except admins
    pub active: i64,
}

/// Challenges whose end date has not passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChallengeCounts {
    pub individual: i64,
    pub group: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HabitCounts {
    pub done: i64,
    pub not_done: i64,
}

/// Reflection moods tallied into the five known buckets.
///
/// Always serializes with all five keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MoodDistribution {
    pub happy: i64,
    pub neutral: i64,
    pub sad: i64,
    pub angry: i64,
    pub tired: i64,
}

impl MoodDistribution {
    pub fn get(&self, mood: Mood) -> i64 {
        match mood {
            Mood::Happy => self.happy,
            Mood::Neutral => self.neutral,
            Mood::Sad => self.sad,
            Mood::Angry => self.angry,
            Mood::Tired => self.tired,
        }
    }

    fn bump(&mut self, mood: Mood) {
        let slot = match mood {
            Mood::Happy => &mut self.happy,
            Mood::Neutral => &mut self.neutral,
            Mood::Sad => &mut self.sad,
            Mood::Angry => &mut self.angry,
            Mood::Tired => &mut self.tired,
        };
        *slot += 1;
    }

    pub fn total(&self) -> i64 {
        Mood::ALL.iter().map(|m| self.get(*m)).sum()
    }
}

/// Completion progress of one active challenge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeProgress {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub challenge_type: ChallengeType,
    pub end_date: DateTime<Utc>,
    pub total_participants: i64,
    pub completed_participants: i64,
    /// Percentage, one decimal
    pub completion_rate: f64,
}

/// Headcounts by role. Not range-scoped.
pub fn user_counts(store: &dyn StatsStore) -> Result<UserCounts> {
    let by_role = |role: Role| store.count(&Query::table(Table::Users).eq("role", role.as_str()));

    Ok(UserCounts {
        students: by_role(Role::Student)?,
        teachers: by_role(Role::Teacher)?,
        parents: by_role(Role::Parent)?,
        active: store.count(&Query::table(Table::Users).ne("role", Role::Admin.as_str()))?,
    })
}

/// Individual and group challenges ending at or after `now`. Not range-scoped.
pub fn challenge_counts<Tz: TimeZone>(
    store: &dyn StatsStore,
    now: &DateTime<Tz>,
) -> Result<ChallengeCounts> {
    let active = |kind: ChallengeType| {
        store.count(
            &Query::table(Table::Challenges)
                .eq("type", kind.as_str())
                .at_least("end_date", now.clone()),
        )
    };

    Ok(ChallengeCounts {
        individual: active(ChallengeType::Individual)?,
        group: active(ChallengeType::Group)?,
    })
}

/// Completed and not-completed habit logs submitted within `range`.
pub fn habit_counts(store: &dyn StatsStore, range: &DateRange) -> Result<HabitCounts> {
    let completed = HabitStatus::Completed.as_str();
    let done = Query::table(Table::HabitLogs)
        .eq("status", completed)
        .scoped(range, "submitted_at");
    let not_done = Query::table(Table::HabitLogs)
        .ne("status", completed)
        .scoped(range, "submitted_at");

    Ok(HabitCounts {
        done: store.count(&done)?,
        not_done: store.count(&not_done)?,
    })
}

/// Reflections whose own date falls within `range`.
pub fn reflection_count(store: &dyn StatsStore, range: &DateRange) -> Result<i64> {
    store.count(&Query::table(Table::Reflections).scoped(range, "date"))
}

/// Students by XP, highest first. Ties keep insertion order.
pub fn top_students(store: &dyn StatsStore, limit: usize) -> Result<Vec<StudentSummary>> {
    store.list_students(
        &Query::table(Table::Users)
            .eq("role", Role::Student.as_str())
            .order_by_desc("xp")
            .limit(limit),
    )
}

/// Mood tally of reflections dated within `range`.
pub fn mood_distribution(store: &dyn StatsStore, range: &DateRange) -> Result<MoodDistribution> {
    let moods = store.list_moods(&Query::table(Table::Reflections).scoped(range, "date"))?;
    Ok(tally_moods(&moods))
}

/// Count moods into buckets. Empty and unknown values count nowhere.
pub fn tally_moods<S: AsRef<str>>(moods: &[S]) -> MoodDistribution {
    let mut distribution = MoodDistribution::default();
    for mood in moods.iter().filter_map(|m| Mood::from_storage(m.as_ref())) {
        distribution.bump(mood);
    }
    distribution
}

/// Active challenges, soonest ending first, with their completion rate.
pub fn challenge_progress<Tz: TimeZone>(
    store: &dyn StatsStore,
    now: &DateTime<Tz>,
    limit: usize,
) -> Result<Vec<ChallengeProgress>> {
    let rows = store.list_active_challenges(now.with_timezone(&Utc), limit)?;
    Ok(rows
        .into_iter()
        .map(|row| ChallengeProgress {
            completion_rate: completion_rate(row.completed_participants, row.total_participants),
            id: row.id,
            title: row.title,
            challenge_type: row.challenge_type,
            end_date: row.end_date,
            total_participants: row.total_participants,
            completed_participants: row.completed_participants,
        })
        .collect())
}

fn completion_rate(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let rate = completed as f64 * 100.0 / total as f64;
    (rate * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::period::Period;
    use crate::db::Database;
    use crate::types::*;
    use chrono::{Duration, FixedOffset};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 12, 10, 0, 0)
            .unwrap()
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn add_log(db: &Database, status: HabitStatus, submitted_at: Option<DateTime<Utc>>) {
        db.insert_habit_log(&NewHabitLog {
            habit_id: 1,
            user_id: 1,
            date: now().with_timezone(&Utc),
            status,
            submitted_at,
        })
        .unwrap();
    }

    #[test]
    fn test_aggregate_names_unique() {
        let mut names: Vec<_> = Aggregate::ALL.iter().map(|a| a.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Aggregate::ALL.len());
    }

    #[test]
    fn test_user_counts() {
        let db = test_db();
        for (name, role) in [
            ("Ani", Role::Student),
            ("Budi", Role::Student),
            ("Citra", Role::Teacher),
            ("Dewi", Role::Parent),
            ("Eko", Role::Admin),
        ] {
            db.insert_user(&NewUser::new(name, role)).unwrap();
        }

        let counts = user_counts(&db).unwrap();
        assert_eq!(
            counts,
            UserCounts {
                students: 2,
                teachers: 1,
                parents: 1,
                active: 4,
            }
        );
    }

    #[test]
    fn test_challenge_counts_only_active() {
        let db = test_db();
        let today = now().with_timezone(&Utc);
        for (kind, end) in [
            (ChallengeType::Individual, today + Duration::days(3)),
            (ChallengeType::Individual, today - Duration::days(1)),
            (ChallengeType::Group, today + Duration::hours(1)),
        ] {
            db.insert_challenge(&NewChallenge {
                title: "Baca buku".to_string(),
                description: String::new(),
                challenge_type: kind,
                end_date: end,
                xp: 50,
            })
            .unwrap();
        }

        let counts = challenge_counts(&db, &now()).unwrap();
        assert_eq!(counts.individual, 1);
        assert_eq!(counts.group, 1);
    }

    #[test]
    fn test_habit_counts_ignore_unsubmitted_when_scoped() {
        let db = test_db();
        let today = now().with_timezone(&Utc);
        add_log(&db, HabitStatus::Completed, Some(today));
        add_log(&db, HabitStatus::Joined, Some(today));
        add_log(&db, HabitStatus::Joined, None);

        let week = Period::ThisWeek.resolve(now());
        let counts = habit_counts(&db, &week).unwrap();
        assert_eq!(counts, HabitCounts { done: 1, not_done: 1 });

        let all = habit_counts(&db, &DateRange::unbounded()).unwrap();
        assert_eq!(all, HabitCounts { done: 1, not_done: 2 });
    }

    #[test]
    fn test_scoped_count_never_exceeds_unscoped() {
        let db = test_db();
        let today = now().with_timezone(&Utc);
        for days_ago in [0, 3, 10, 40, 400] {
            db.insert_reflection(&NewReflection {
                user_id: 1,
                date: today - Duration::days(days_ago),
                mood: Some(Mood::Happy),
                content: String::new(),
            })
            .unwrap();
        }

        let all = reflection_count(&db, &DateRange::unbounded()).unwrap();
        assert_eq!(all, 5);
        for period in [Period::ThisWeek, Period::ThisMonth, Period::ThisYear] {
            let scoped = reflection_count(&db, &period.resolve(now())).unwrap();
            assert!(scoped <= all, "{:?} counted {}", period, scoped);
        }
    }

    #[test]
    fn test_top_students_excludes_other_roles() {
        let db = test_db();
        db.insert_user(&NewUser::new("Guru", Role::Teacher).with_xp(9000, 30))
            .unwrap();
        db.insert_user(&NewUser::new("Ani", Role::Student).with_xp(100, 2))
            .unwrap();
        db.insert_user(&NewUser::new("Budi", Role::Student).with_xp(300, 4))
            .unwrap();

        let top = top_students(&db, 10).unwrap();
        let names: Vec<_> = top.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Budi", "Ani"]);

        assert_eq!(top_students(&db, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_tally_moods_skips_empty() {
        let distribution = tally_moods(&["happy", "", "sad"]);
        assert_eq!(
            distribution,
            MoodDistribution {
                happy: 1,
                sad: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_tally_moods_empty_input() {
        let distribution = tally_moods::<&str>(&[]);
        assert_eq!(distribution.total(), 0);

        let json = serde_json::to_value(distribution).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 5);
        for mood in Mood::ALL {
            assert_eq!(json[mood.as_str()], 0);
        }
    }

    #[test]
    fn test_tally_moods_unknown_and_case() {
        let distribution = tally_moods(&["Happy", " tired ", "ecstatic", "TIRED"]);
        assert_eq!(distribution.happy, 1);
        assert_eq!(distribution.tired, 2);
        assert_eq!(distribution.total(), 3);
    }

    #[test]
    fn test_completion_rate() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 3), 33.3);
        assert_eq!(completion_rate(2, 3), 66.7);
        assert_eq!(completion_rate(4, 4), 100.0);
    }

    #[test]
    fn test_challenge_progress() {
        let db = test_db();
        let today = now().with_timezone(&Utc);
        let id = db
            .insert_challenge(&NewChallenge {
                title: "Hemat air".to_string(),
                description: String::new(),
                challenge_type: ChallengeType::Group,
                end_date: today + Duration::days(2),
                xp: 80,
            })
            .unwrap();
        for (user_id, status) in [
            (1, ParticipantStatus::Completed),
            (2, ParticipantStatus::InProgress),
            (3, ParticipantStatus::InProgress),
        ] {
            db.insert_participant(&NewParticipant {
                challenge_id: id,
                user_id,
                status,
                submitted_at: None,
            })
            .unwrap();
        }

        let progress = challenge_progress(&db, &now(), 5).unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].title, "Hemat air");
        assert_eq!(progress[0].total_participants, 3);
        assert_eq!(progress[0].completed_participants, 1);
        assert_eq!(progress[0].completion_rate, 33.3);

        let json = serde_json::to_value(&progress[0]).unwrap();
        assert_eq!(json["type"], "group");
    }
}
