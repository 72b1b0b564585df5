//! Predicate builder for aggregate queries
//!
//! A [`Query`] names a table and a conjunction of simple predicates. The store
//! turns it into SQL with bound parameters; columns are always compile-time
//! constants, values are never interpolated.
//!
//! [`apply_range`] is the only place where a reporting range becomes a
//! predicate, so every statistic of one request is scoped the same way.

use crate::analytics::period::DateRange;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::types::Value as SqlValue;

/// Tables the dashboard reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    Challenges,
    ChallengeParticipants,
    HabitLogs,
    Reflections,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Challenges => "challenges",
            Table::ChallengeParticipants => "challenge_participants",
            Table::HabitLogs => "habit_logs",
            Table::Reflections => "reflections",
        }
    }

    /// Alias used for this table in generated SQL.
    pub fn alias(&self) -> &'static str {
        match self {
            Table::Users => "u",
            Table::Challenges => "c",
            Table::ChallengeParticipants => "cp",
            Table::HabitLogs => "hl",
            Table::Reflections => "r",
        }
    }
}

/// A predicate operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Time(DateTime<Utc>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(ts: DateTime<Tz>) -> Self {
        Value::Time(ts.with_timezone(&Utc))
    }
}

impl Value {
    fn to_sql(&self) -> SqlValue {
        match self {
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Time(ts) => SqlValue::Text(encode_ts(ts)),
        }
    }
}

/// A single predicate on a column of the query's table.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    Ne(&'static str, Value),
    In(&'static str, Vec<Value>),
    AtLeast(&'static str, Value),
    /// Inclusive on both ends
    Between(&'static str, Value, Value),
}

/// A conjunction of filters with optional ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub filters: Vec<Filter>,
    /// Column sorted descending; ties fall back to insertion order
    pub order_desc: Option<&'static str>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order_desc: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    pub fn ne(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ne(column, value.into()));
        self
    }

    pub fn within<V: Into<Value>>(
        mut self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(column, values));
        self
    }

    pub fn at_least(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::AtLeast(column, value.into()));
        self
    }

    pub fn between(
        mut self,
        column: &'static str,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        self.filters
            .push(Filter::Between(column, start.into(), end.into()));
        self
    }

    pub fn order_by_desc(mut self, column: &'static str) -> Self {
        self.order_desc = Some(column);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restrict to `range` on `column`. See [`apply_range`].
    pub fn scoped(self, range: &DateRange, column: &'static str) -> Self {
        apply_range(self, range, column)
    }

    /// `WHERE ...` clause (empty when there are no filters) and its parameters.
    pub fn where_clause(&self) -> (String, Vec<SqlValue>) {
        let alias = self.table.alias();
        let mut clauses = Vec::with_capacity(self.filters.len());
        let mut params = Vec::new();

        for filter in &self.filters {
            match filter {
                Filter::Eq(col, v) => {
                    clauses.push(format!("{alias}.{col} = ?"));
                    params.push(v.to_sql());
                }
                Filter::Ne(col, v) => {
                    clauses.push(format!("{alias}.{col} != ?"));
                    params.push(v.to_sql());
                }
                Filter::In(col, values) => {
                    if values.is_empty() {
                        clauses.push("0".to_string());
                        continue;
                    }
                    let marks = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{alias}.{col} IN ({marks})"));
                    params.extend(values.iter().map(Value::to_sql));
                }
                Filter::AtLeast(col, v) => {
                    clauses.push(format!("{alias}.{col} >= ?"));
                    params.push(v.to_sql());
                }
                Filter::Between(col, start, end) => {
                    clauses.push(format!("{alias}.{col} BETWEEN ? AND ?"));
                    params.push(start.to_sql());
                    params.push(end.to_sql());
                }
            }
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), params)
        }
    }

    /// `ORDER BY ... LIMIT ...` tail. The primary key breaks ties.
    pub fn tail_clause(&self) -> String {
        let alias = self.table.alias();
        let mut tail = match self.order_desc {
            Some(col) => format!("ORDER BY {alias}.{col} DESC, {alias}.id ASC"),
            None => format!("ORDER BY {alias}.id ASC"),
        };
        if let Some(limit) = self.limit {
            tail.push_str(&format!(" LIMIT {limit}"));
        }
        tail
    }
}

/// Scope `query` to `range` on `column`.
///
/// A disabled range returns the query unchanged. Otherwise an inclusive
/// `BETWEEN` on `column` is added; rows where `column` is NULL drop out.
pub fn apply_range(query: Query, range: &DateRange, column: &'static str) -> Query {
    match range.bounds() {
        Some((start, end)) => query.between(column, start, end),
        None => query,
    }
}

/// Fixed-width UTC encoding: text order equals time order.
pub fn encode_ts<Tz: TimeZone>(ts: &DateTime<Tz>) -> String {
    ts.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp. Accepts any RFC 3339 text.
pub fn decode_ts(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
