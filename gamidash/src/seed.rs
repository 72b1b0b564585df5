//! Demo data for local trials
//!
//! Loads a small, fixed school: a handful of students with a parent, a
//! teacher, an admin, running and finished challenges, habits with logs across
//! two weeks, and reflections. Timestamps are relative to `now` so that every
//! period shows something.

use chrono::{DateTime, Duration, Utc};
use gamidash_core::db::query::{Query, Table};
use gamidash_core::types::*;
use gamidash_core::{Database, Result, StatsStore};

/// Counts of inserted records.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub challenges: usize,
    pub participants: usize,
    pub habits: usize,
    pub habit_logs: usize,
    pub reflections: usize,
}

/// Insert the demo data set. Returns `None` when the database already has users.
pub fn seed(db: &Database, now: DateTime<Utc>) -> Result<Option<SeedSummary>> {
    if db.count(&Query::table(Table::Users))? > 0 {
        return Ok(None);
    }

    let mut summary = SeedSummary::default();

    let mut user = |new: NewUser| -> Result<i64> {
        summary.users += 1;
        db.insert_user(&new)
    };
    let parent = user(NewUser::new("Pak Joko", Role::Parent))?;
    let ani = user(NewUser {
        parent_id: Some(parent),
        ..NewUser::new("Ani Lestari", Role::Student).with_xp(450, 5)
    })?;
    let budi = user(NewUser::new("Budi Santoso", Role::Student).with_xp(320, 4))?;
    let citra = user(NewUser::new("Citra Dewi", Role::Student).with_xp(610, 7))?;
    let dimas = user(NewUser::new("Dimas Pratama", Role::Student).with_xp(120, 2))?;
    user(NewUser::new("Bu Sari", Role::Teacher))?;
    user(NewUser::new("Admin Sekolah", Role::Admin))?;

    let mut challenge = |title: &str, kind: ChallengeType, ends_in: Duration, xp: i64| {
        summary.challenges += 1;
        db.insert_challenge(&NewChallenge {
            title: title.to_string(),
            description: String::new(),
            challenge_type: kind,
            end_date: now + ends_in,
            xp,
        })
    };
    let reading = challenge("Membaca 5 Buku", ChallengeType::Individual, Duration::days(7), 100)?;
    let cleanup = challenge("Kerja Bakti Kelas", ChallengeType::Group, Duration::days(3), 150)?;
    let energy = challenge("Hemat Energi", ChallengeType::Individual, Duration::days(-10), 80)?;

    for (challenge_id, user_id, submitted_at) in [
        (reading, ani, Some(now - Duration::hours(2))),
        (reading, budi, None),
        (cleanup, citra, Some(now - Duration::days(1))),
        (cleanup, dimas, None),
        (energy, budi, Some(now - Duration::days(12))),
    ] {
        let status = match submitted_at {
            Some(_) => ParticipantStatus::Completed,
            None => ParticipantStatus::InProgress,
        };
        db.insert_participant(&NewParticipant {
            challenge_id,
            user_id,
            status,
            submitted_at,
        })?;
        summary.participants += 1;
    }

    let exercise = db.insert_habit(&NewHabit {
        title: "Olahraga Pagi".to_string(),
        description: "Olahraga 15 menit sebelum sekolah".to_string(),
        owner_id: ani,
        xp: 10,
    })?;
    let water = db.insert_habit(&NewHabit {
        title: "Minum Air Putih".to_string(),
        description: String::new(),
        owner_id: budi,
        xp: 5,
    })?;
    summary.habits += 2;

    for (habit_id, user_id, days_ago, status) in [
        (exercise, ani, 0, HabitStatus::Completed),
        (water, budi, 0, HabitStatus::Joined),
        (water, citra, 1, HabitStatus::Submitted),
        (exercise, dimas, 2, HabitStatus::Completed),
        (exercise, ani, 8, HabitStatus::Completed),
        (water, budi, 9, HabitStatus::Joined),
    ] {
        let date = now - Duration::days(days_ago);
        let submitted_at = match status {
            HabitStatus::Joined => None,
            HabitStatus::Completed | HabitStatus::Submitted => Some(date - Duration::minutes(30)),
        };
        db.insert_habit_log(&NewHabitLog {
            habit_id,
            user_id,
            date,
            status,
            submitted_at,
        })?;
        summary.habit_logs += 1;
    }

    for (user_id, days_ago, mood) in [
        (ani, 0, Some(Mood::Happy)),
        (budi, 0, Some(Mood::Tired)),
        (citra, 1, None),
        (dimas, 3, Some(Mood::Sad)),
        (ani, 20, Some(Mood::Neutral)),
    ] {
        db.insert_reflection(&NewReflection {
            user_id,
            date: now - Duration::days(days_ago),
            mood,
            content: String::new(),
        })?;
        summary.reflections += 1;
    }

    tracing::info!(?summary, "Seeded demo data");
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_once() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let summary = seed(&db, Utc::now()).unwrap().unwrap();
        assert_eq!(summary.users, 7);
        assert_eq!(summary.challenges, 3);
        assert_eq!(summary.reflections, 5);

        assert!(seed(&db, Utc::now()).unwrap().is_none());
        assert_eq!(db.count(&Query::table(Table::Users)).unwrap(), 7);
    }
}
