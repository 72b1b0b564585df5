//! Database repository layer
//!
//! Insert operations for platform records and the [`StatsStore`] queries the
//! dashboard runs against them.

use super::query::{decode_ts, encode_ts, Query, Table};
use crate::error::{Error, Result};
use crate::store::StatsStore;
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// How long a statement waits on a locked database before failing.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn()?.busy_timeout(timeout)?;
        Ok(())
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        super::schema::run_migrations(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::StoreUnavailable("database connection lock poisoned".to_string()))
    }

    // ============================================
    // Insert operations
    // ============================================

    /// Insert a user, returning its id
    pub fn insert_user(&self, user: &NewUser) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO users (name, email, role, xp, level, avatar_url, parent_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user.name,
                user.email,
                user.role.as_str(),
                user.xp,
                user.level,
                user.avatar_url,
                user.parent_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a challenge, returning its id
    pub fn insert_challenge(&self, challenge: &NewChallenge) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO challenges (title, description, type, end_date, xp_reward, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                challenge.title,
                challenge.description,
                challenge.challenge_type.as_str(),
                encode_ts(&challenge.end_date),
                challenge.xp,
                encode_ts(&Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a challenge participation, returning its id
    pub fn insert_participant(&self, participant: &NewParticipant) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO challenge_participants (challenge_id, user_id, status, submitted_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                participant.challenge_id,
                participant.user_id,
                participant.status.as_str(),
                participant.submitted_at.as_ref().map(encode_ts),
                encode_ts(&Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a habit, returning its id
    pub fn insert_habit(&self, habit: &NewHabit) -> Result<i64> {
        let conn = self.conn()?;
        let now = encode_ts(&Utc::now());
        conn.execute(
            r#"
            INSERT INTO habits (title, description, user_id, xp_reward, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
            params![habit.title, habit.description, habit.owner_id, habit.xp, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a habit log, returning its id
    pub fn insert_habit_log(&self, log: &NewHabitLog) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO habit_logs (habit_id, user_id, date, status, submitted_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                log.habit_id,
                log.user_id,
                encode_ts(&log.date),
                log.status.as_str(),
                log.submitted_at.as_ref().map(encode_ts),
                encode_ts(&Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a reflection, returning its id
    pub fn insert_reflection(&self, reflection: &NewReflection) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO reflections (user_id, date, mood, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                reflection.user_id,
                encode_ts(&reflection.date),
                reflection.mood.map(|m| m.as_str()).unwrap_or(""),
                reflection.content,
                encode_ts(&Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ============================================
    // Row mapping
    // ============================================

    fn row_to_student(row: &Row) -> rusqlite::Result<StudentSummary> {
        Ok(StudentSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            xp: row.get(2)?,
            level: row.get(3)?,
            avatar_url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        })
    }

    /// An actor is present only with a non-zero id.
    fn actor_at(row: &Row, idx: usize) -> rusqlite::Result<Option<ActorRef>> {
        let id: Option<i64> = row.get(idx)?;
        let name: Option<String> = row.get(idx + 1)?;
        Ok(match id {
            Some(id) if id != 0 => Some(ActorRef {
                id,
                name: name.unwrap_or_default(),
            }),
            _ => None,
        })
    }

    /// (id, title, xp) of a joined challenge or habit, absent on a zero id.
    fn reward_at(row: &Row, idx: usize) -> rusqlite::Result<Option<(i64, String, i64)>> {
        let id: Option<i64> = row.get(idx)?;
        let title: Option<String> = row.get(idx + 1)?;
        let xp: Option<i64> = row.get(idx + 2)?;
        Ok(match id {
            Some(id) if id != 0 => Some((id, title.unwrap_or_default(), xp.unwrap_or(0))),
            _ => None,
        })
    }

    fn ts_at(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = row.get(idx)?;
        Ok(raw.as_deref().and_then(decode_ts))
    }

    fn expect_table(query: &Query, table: Table, operation: &str) -> Result<()> {
        if query.table == table {
            Ok(())
        } else {
            Err(Error::InvalidQuery(format!(
                "{} reads {}, got a query on {}",
                operation,
                table.name(),
                query.table.name()
            )))
        }
    }
}

impl StatsStore for Database {
    fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    fn count(&self, query: &Query) -> Result<i64> {
        let (where_sql, params) = query.where_clause();
        let sql = format!(
            "SELECT COUNT(*) FROM {} {} {}",
            query.table.name(),
            query.table.alias(),
            where_sql
        );
        let conn = self.conn()?;
        let count = conn.query_row(&sql, params_from_iter(params), |r| r.get(0))?;
        Ok(count)
    }

    fn list_students(&self, query: &Query) -> Result<Vec<StudentSummary>> {
        Self::expect_table(query, Table::Users, "list_students")?;
        let (where_sql, params) = query.where_clause();
        let sql = format!(
            "SELECT u.id, u.name, u.xp, u.level, u.avatar_url FROM users u {} {}",
            where_sql,
            query.tail_clause()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), Self::row_to_student)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_moods(&self, query: &Query) -> Result<Vec<String>> {
        Self::expect_table(query, Table::Reflections, "list_moods")?;
        let (where_sql, params) = query.where_clause();
        let sql = format!(
            "SELECT r.mood FROM reflections r {} {}",
            where_sql,
            query.tail_clause()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(row.get::<_, Option<String>>(0)?.unwrap_or_default())
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_challenge_completions(&self, query: &Query) -> Result<Vec<ChallengeCompletionRow>> {
        Self::expect_table(
            query,
            Table::ChallengeParticipants,
            "list_challenge_completions",
        )?;
        let (where_sql, params) = query.where_clause();
        let sql = format!(
            r#"
            SELECT cp.id, cp.submitted_at, u.id, u.name, c.id, c.title, c.xp_reward
            FROM challenge_participants cp
            LEFT JOIN users u ON u.id = cp.user_id
            LEFT JOIN challenges c ON c.id = cp.challenge_id
            {} {}
            "#,
            where_sql,
            query.tail_clause()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(ChallengeCompletionRow {
                    id: row.get(0)?,
                    submitted_at: Self::ts_at(row, 1)?,
                    user: Self::actor_at(row, 2)?,
                    challenge: Self::reward_at(row, 4)?
                        .map(|(id, title, xp)| ChallengeRef { id, title, xp }),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_habit_completions(&self, query: &Query) -> Result<Vec<HabitCompletionRow>> {
        Self::expect_table(query, Table::HabitLogs, "list_habit_completions")?;
        let (where_sql, params) = query.where_clause();
        let sql = format!(
            r#"
            SELECT hl.id, hl.submitted_at, u.id, u.name, h.id, h.title, h.xp_reward
            FROM habit_logs hl
            LEFT JOIN users u ON u.id = hl.user_id
            LEFT JOIN habits h ON h.id = hl.habit_id
            {} {}
            "#,
            where_sql,
            query.tail_clause()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(HabitCompletionRow {
                    id: row.get(0)?,
                    submitted_at: Self::ts_at(row, 1)?,
                    user: Self::actor_at(row, 2)?,
                    habit: Self::reward_at(row, 4)?
                        .map(|(id, title, xp)| HabitRef { id, title, xp }),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_active_challenges(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChallengeProgressRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                c.id,
                c.title,
                c.type,
                c.end_date,
                COUNT(cp.id),
                COALESCE(SUM(CASE WHEN cp.status = 'completed' THEN 1 ELSE 0 END), 0)
            FROM challenges c
            LEFT JOIN challenge_participants cp ON cp.challenge_id = c.id
            WHERE c.end_date >= ?1
            GROUP BY c.id
            ORDER BY c.end_date ASC, c.id ASC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt
            .query_map(params![encode_ts(&now), limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    Self::ts_at(row, 3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut progress = Vec::with_capacity(rows.len());
        for (id, title, raw_type, end_date, total, completed) in rows {
            let (Ok(challenge_type), Some(end_date)) = (raw_type.parse::<ChallengeType>(), end_date)
            else {
                tracing::warn!(
                    challenge_id = id,
                    raw_type = %raw_type,
                    "Skipping malformed challenge row"
                );
                continue;
            };
            progress.push(ChallengeProgressRow {
                id,
                title,
                challenge_type,
                end_date,
                total_participants: total,
                completed_participants: completed,
            });
        }
        Ok(progress)
    }
}
