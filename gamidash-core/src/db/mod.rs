//! Database layer for gamidash
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - A predicate builder for range-scoped aggregate queries
//! - The [`StatsStore`](crate::store::StatsStore) implementation

pub mod query;
pub mod repo;
pub mod schema;

pub use query::{apply_range, Query, Table};
pub use repo::Database;
