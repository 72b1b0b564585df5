//! # gamidash-core
//!
//! Core library for gamidash - admin dashboard statistics for a gamified
//! learning platform.
//!
//! This library provides:
//! - Domain types for users, challenges, habits and reflections
//! - Database storage layer with SQLite
//! - The dashboard aggregation engine
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gamidash_core::{Config, DashboardEngine, Database, Period};
//!
//! # async fn run() -> gamidash_core::Result<()> {
//! let config = Config::load()?;
//!
//! let db = Database::open(&config.database.resolved_path())?;
//! db.migrate()?;
//!
//! let engine = DashboardEngine::new(Arc::new(db), config.dashboard.clone());
//! let stats = engine.compute(&Period::parse("minggu ini"), engine.now()?).await?;
//! println!("{} students", stats.total_students);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{DashboardEngine, DashboardStats, DateRange, Period};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use store::StatsStore;
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod store;
pub mod types;
