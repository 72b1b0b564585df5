//! Analytics module for gamidash
//!
//! Computes the admin dashboard from platform records:
//! - Period resolution (this week, this month, ..., custom ranges)
//! - Headcounts, challenge and habit counts, reflections and moods
//! - Weekly habit trend
//! - Recent activity feed
//! - Challenge progress
//!
//! See [`dashboard`] for how the pieces are combined and how failures degrade.

pub mod activity;
pub mod collector;
pub mod dashboard;
pub mod period;
pub mod trends;

pub use activity::{Activity, ActivityKind};
pub use collector::{tally_moods, Aggregate, ChallengeProgress, MoodDistribution};
pub use dashboard::{DashboardEngine, DashboardStats};
pub use period::{DateRange, Period};
pub use trends::WeeklyTrendPoint;
