//! Store collaborator used by the dashboard engine
//!
//! The engine never reaches for a global handle; it is given something that
//! implements [`StatsStore`]. [`crate::Database`] is the SQLite implementation.
//! Tests wrap it to inject failures.

use crate::db::query::Query;
use crate::error::Result;
use crate::types::{
    ChallengeCompletionRow, ChallengeProgressRow, HabitCompletionRow, StudentSummary,
};
use chrono::{DateTime, Utc};

/// Read-only aggregate queries over platform records.
///
/// Every method is a bounded query: a count, or a list whose size is capped by
/// the query's limit.
pub trait StatsStore: Send + Sync {
    /// Cheap liveness probe. An error here means the store is unreachable.
    fn ping(&self) -> Result<()>;

    /// Number of rows of `query.table` matching every filter.
    fn count(&self, query: &Query) -> Result<i64>;

    /// Users matching a [`Table::Users`](crate::db::query::Table::Users) query.
    fn list_students(&self, query: &Query) -> Result<Vec<StudentSummary>>;

    /// Raw mood values of reflections matching the query.
    fn list_moods(&self, query: &Query) -> Result<Vec<String>>;

    /// Participations with user and challenge joined.
    fn list_challenge_completions(&self, query: &Query) -> Result<Vec<ChallengeCompletionRow>>;

    /// Habit logs with user and habit joined.
    fn list_habit_completions(&self, query: &Query) -> Result<Vec<HabitCompletionRow>>;

    /// Challenges ending at or after `now`, soonest first, with participation counts.
    fn list_active_challenges(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChallengeProgressRow>>;
}
