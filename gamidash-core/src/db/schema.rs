//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//!
//! Participation, habit log and reflection rows carry plain id columns rather
//! than foreign keys: the platform deletes users and challenges without
//! cascading, so readers must tolerate dangling references.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Platform records read by the dashboard
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        name             TEXT NOT NULL,
        email            TEXT NOT NULL DEFAULT '',
        role             TEXT NOT NULL,      -- 'siswa', 'guru', 'ortu', 'admin'
        xp               INTEGER NOT NULL DEFAULT 0,
        level            INTEGER NOT NULL DEFAULT 1,
        avatar_url       TEXT NOT NULL DEFAULT '',
        parent_id        INTEGER REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS challenges (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        title            TEXT NOT NULL,
        description      TEXT NOT NULL DEFAULT '',
        type             TEXT NOT NULL,      -- 'individual', 'group'
        end_date         DATETIME NOT NULL,
        xp_reward        INTEGER NOT NULL DEFAULT 0,
        created_at       DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS challenge_participants (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        challenge_id     INTEGER NOT NULL,
        user_id          INTEGER NOT NULL,
        status           TEXT NOT NULL,      -- 'completed', 'in_progress'
        submitted_at     DATETIME,
        created_at       DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS habits (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        title            TEXT NOT NULL,
        description      TEXT NOT NULL DEFAULT '',
        user_id          INTEGER NOT NULL,
        xp_reward        INTEGER NOT NULL DEFAULT 0,
        created_at       DATETIME NOT NULL,
        updated_at       DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS habit_logs (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        habit_id         INTEGER NOT NULL,
        user_id          INTEGER NOT NULL,
        date             DATETIME NOT NULL,
        status           TEXT NOT NULL,      -- 'completed', 'joined', 'submitted'
        submitted_at     DATETIME,
        created_at       DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS reflections (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id          INTEGER NOT NULL,
        date             DATETIME NOT NULL,
        mood             TEXT NOT NULL DEFAULT '',
        content          TEXT NOT NULL DEFAULT '',
        created_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_users_role ON users(role, xp DESC);
    CREATE INDEX IF NOT EXISTS idx_challenges_type_end ON challenges(type, end_date);
    CREATE INDEX IF NOT EXISTS idx_participants_status ON challenge_participants(status, submitted_at);
    CREATE INDEX IF NOT EXISTS idx_participants_challenge ON challenge_participants(challenge_id);
    CREATE INDEX IF NOT EXISTS idx_habit_logs_status ON habit_logs(status, submitted_at);
    CREATE INDEX IF NOT EXISTS idx_habit_logs_date ON habit_logs(date);
    CREATE INDEX IF NOT EXISTS idx_reflections_date ON reflections(date);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
