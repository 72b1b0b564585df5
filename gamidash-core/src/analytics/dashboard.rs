//! Dashboard statistics for the admin overview.
//!
//! [`DashboardEngine`] resolves a [`Period`] once, then runs every aggregate
//! of [`collector`](super::collector), [`trends`](super::trends) and
//! [`activity`](super::activity) as its own blocking task under a time budget.
//!
//! ## Failure policy
//!
//! - The store is pinged first. If it cannot be reached the whole request
//!   fails with [`Error::StoreUnavailable`].
//! - Any other failure, including a timeout, is logged and leaves that one
//!   field at its empty value. The aggregate's name is listed in
//!   [`DashboardStats::degraded`].
//! - Every aggregate's budget starts when the request fans out, not when its
//!   query reaches the store. A store that serializes queries, such as
//!   [`Database`](crate::db::Database) behind its single connection, makes
//!   the later aggregates wait on the earlier ones, so one slow query can time
//!   out several fields. `query_timeout_ms` bounds the whole request that way.

use super::activity::{self, Activity};
use super::collector::{
    self, Aggregate, ChallengeCounts, ChallengeProgress, HabitCounts, MoodDistribution,
    UserCounts,
};
use super::period::{DateRange, Period};
use super::trends::{self, WeeklyTrendPoint};
use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::store::StatsStore;
use crate::types::StudentSummary;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Everything the admin dashboard shows for one period.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Machine key of the resolved period
    pub period: &'static str,
    pub range: DateRange,

    // Headcounts
    pub total_students: i64,
    pub total_teachers: i64,
    pub total_parents: i64,
    pub total_active_users: i64,

    // Currently running challenges
    pub active_individual_challenges: i64,
    pub active_group_challenges: i64,

    // Period-scoped
    pub done_habits: i64,
    pub not_done_habits: i64,
    /// Reflections dated within the period
    pub reflections_today: i64,

    pub top_students: Vec<StudentSummary>,
    pub recent_activities: Vec<Activity>,
    pub mood_distribution: MoodDistribution,
    pub habit_trends: Vec<WeeklyTrendPoint>,
    pub challenge_progress: Vec<ChallengeProgress>,

    /// Aggregates that failed and were left empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<&'static str>,
}

/// Computes [`DashboardStats`] against a store.
pub struct DashboardEngine {
    store: Arc<dyn StatsStore>,
    settings: DashboardConfig,
}

impl DashboardEngine {
    pub fn new(store: Arc<dyn StatsStore>, settings: DashboardConfig) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &DashboardConfig {
        &self.settings
    }

    /// Current time in the configured offset.
    pub fn now(&self) -> Result<DateTime<FixedOffset>> {
        Ok(Utc::now().with_timezone(&self.settings.offset()?))
    }

    /// Compute the dashboard for `period` as seen at `now`.
    pub async fn compute(&self, period: &Period, now: DateTime<FixedOffset>) -> Result<DashboardStats> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("dashboard", %request_id, period = period.key());
        self.compute_in_span(period, now).instrument(span).await
    }

    async fn compute_in_span(
        &self,
        period: &Period,
        now: DateTime<FixedOffset>,
    ) -> Result<DashboardStats> {
        let started = Instant::now();
        self.ping().await?;

        let range = period.resolve(now);
        tracing::debug!(
            start = ?range.start(),
            end = ?range.end(),
            "Resolved reporting range"
        );

        let top_limit = self.settings.top_students_limit;
        let progress_limit = self.settings.challenge_progress_limit;
        let activity_settings = self.settings.clone();

        let (users, challenges, habits, reflections, top, moods, trends, activities, progress) = tokio::join!(
            self.run(Aggregate::UserCounts, collector::user_counts),
            self.run(Aggregate::ChallengeCounts, move |store| {
                collector::challenge_counts(store, &now)
            }),
            self.run(Aggregate::HabitCounts, move |store| {
                collector::habit_counts(store, &range)
            }),
            self.run(Aggregate::Reflections, move |store| {
                collector::reflection_count(store, &range)
            }),
            self.run(Aggregate::TopStudents, move |store| {
                collector::top_students(store, top_limit)
            }),
            self.run(Aggregate::MoodDistribution, move |store| {
                collector::mood_distribution(store, &range)
            }),
            self.run(Aggregate::HabitTrends, move |store| {
                trends::habit_trends(store, &range, now)
            }),
            self.run(Aggregate::RecentActivities, move |store| {
                activity::recent_activities(store, &range, now, &activity_settings)
            }),
            self.run(Aggregate::ChallengeProgress, move |store| {
                collector::challenge_progress(store, &now, progress_limit)
            }),
        );

        let mut degraded = Vec::new();
        let users: UserCounts = settle(Aggregate::UserCounts, period, users, &mut degraded)?;
        let challenges: ChallengeCounts =
            settle(Aggregate::ChallengeCounts, period, challenges, &mut degraded)?;
        let habits: HabitCounts = settle(Aggregate::HabitCounts, period, habits, &mut degraded)?;
        let reflections = settle(Aggregate::Reflections, period, reflections, &mut degraded)?;
        let top_students = settle(Aggregate::TopStudents, period, top, &mut degraded)?;
        let mood_distribution = settle(Aggregate::MoodDistribution, period, moods, &mut degraded)?;
        let habit_trends = settle(Aggregate::HabitTrends, period, trends, &mut degraded)?;
        let recent_activities =
            settle(Aggregate::RecentActivities, period, activities, &mut degraded)?;
        let challenge_progress =
            settle(Aggregate::ChallengeProgress, period, progress, &mut degraded)?;

        tracing::info!(
            degraded = degraded.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Dashboard computed"
        );

        Ok(DashboardStats {
            period: period.key(),
            range,
            total_students: users.students,
            total_teachers: users.teachers,
            total_parents: users.parents,
            total_active_users: users.active,
            active_individual_challenges: challenges.individual,
            active_group_challenges: challenges.group,
            done_habits: habits.done,
            not_done_habits: habits.not_done,
            reflections_today: reflections,
            top_students,
            recent_activities,
            mood_distribution,
            habit_trends,
            challenge_progress,
            degraded,
        })
    }

    async fn ping(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let result = tokio::time::timeout(
            self.settings.query_timeout(),
            tokio::task::spawn_blocking(move || store.ping()),
        )
        .await;

        let error = match result {
            Ok(Ok(Ok(()))) => return Ok(()),
            Ok(Ok(Err(Error::StoreUnavailable(msg)))) => msg,
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(join)) => join.to_string(),
            Err(_) => format!("ping timed out after {}ms", self.settings.query_timeout_ms),
        };
        tracing::error!(error = %error, "Store unreachable");
        Err(Error::StoreUnavailable(error))
    }

    /// Run one aggregate on the blocking pool under the query time budget.
    async fn run<T, F>(&self, aggregate: Aggregate, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn StatsStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));

        match tokio::time::timeout(self.settings.query_timeout(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(Error::Task(join.to_string())),
            // The blocking query keeps running; its result is discarded.
            Err(_) => Err(Error::Timeout {
                aggregate: aggregate.name(),
                timeout_ms: self.settings.query_timeout_ms,
            }),
        }
    }
}

/// Keep a successful value, or log and fall back to the empty value.
///
/// Fatal errors still fail the request.
fn settle<T: Default>(
    aggregate: Aggregate,
    period: &Period,
    result: Result<T>,
    degraded: &mut Vec<&'static str>,
) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!(
                period = period.key(),
                aggregate = aggregate.name(),
                error = %e,
                "Aggregate failed, using empty value"
            );
            degraded.push(aggregate.name());
            Ok(T::default())
        }
    }
}
