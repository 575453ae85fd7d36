//! Typed filter clauses for result listings.
//!
//! A [`ResultFilter`] is a conjunction of [`Clause`]s. It renders to one
//! `WHERE` fragment with positional placeholders plus the matching parameter
//! values, so the count pass and the fetch pass of a paged query share the
//! exact same predicate.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

/// One predicate on the `opresults` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `created >= bound` (inclusive).
    CreatedFrom(DateTime<Utc>),
    /// `created <= bound` (inclusive).
    CreatedUntil(DateTime<Utc>),
    /// Exact match on the application name.
    ApplicationEquals(String),
}

impl Clause {
    fn sql(&self) -> &'static str {
        match self {
            Clause::CreatedFrom(_) => "created >= ?",
            Clause::CreatedUntil(_) => "created <= ?",
            Clause::ApplicationEquals(_) => "application = ?",
        }
    }

    fn value(&self) -> Value {
        match self {
            // stored timestamps are whole microseconds: a lower bound inside a
            // microsecond rounds up, an upper bound truncates
            Clause::CreatedFrom(t) => {
                let micros = t.timestamp_micros();
                if t.timestamp_subsec_nanos() % 1_000 != 0 {
                    Value::Integer(micros.saturating_add(1))
                } else {
                    Value::Integer(micros)
                }
            }
            Clause::CreatedUntil(t) => Value::Integer(t.timestamp_micros()),
            Clause::ApplicationEquals(app) => Value::Text(app.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    clauses: Vec<Clause>,
}

impl ResultFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter for the paged listing: absent bounds and an empty application
    /// name add no clause.
    pub fn from_query(
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        application: &str,
    ) -> Self {
        let mut filter = Self::new();
        if let Some(from) = from {
            filter = filter.and(Clause::CreatedFrom(from));
        }
        if let Some(until) = until {
            filter = filter.and(Clause::CreatedUntil(until));
        }
        if !application.is_empty() {
            filter = filter.and(Clause::ApplicationEquals(application.to_string()));
        }
        filter
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `""` for an empty filter, otherwise `" WHERE a AND b ..."`.
    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            return String::new();
        }
        let parts: Vec<&str> = self.clauses.iter().map(Clause::sql).collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    /// Parameter values in placeholder order.
    pub(crate) fn params(&self) -> Vec<Value> {
        self.clauses.iter().map(Clause::value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_empty_filter_has_no_where() {
        let filter = ResultFilter::from_query(None, None, "");
        assert!(filter.is_empty());
        assert_eq!(filter.where_sql(), "");
        assert!(filter.params().is_empty());
    }

    #[test]
    fn test_clauses_combine_with_and_in_order() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap();
        let until = Utc.with_ymd_and_hms(2025, 1, 31, 23, 23, 59).unwrap();
        let filter = ResultFilter::from_query(Some(from), Some(until), "backup");

        assert_eq!(
            filter.where_sql(),
            " WHERE created >= ? AND created <= ? AND application = ?"
        );
        assert_eq!(
            filter.params(),
            vec![
                Value::Integer(from.timestamp_micros()),
                Value::Integer(until.timestamp_micros()),
                Value::Text("backup".into()),
            ]
        );
    }

    #[test]
    fn test_subset_of_clauses() {
        let until = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let filter = ResultFilter::from_query(None, Some(until), "");
        assert_eq!(filter.clauses(), &[Clause::CreatedUntil(until)]);
        assert_eq!(filter.where_sql(), " WHERE created <= ?");
    }

    #[test]
    fn test_sub_microsecond_bounds_stay_inclusive() {
        let whole = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap() + Duration::microseconds(42);
        let inside = whole + Duration::nanoseconds(500);
        let micros = whole.timestamp_micros();

        let from = ResultFilter::new().and(Clause::CreatedFrom(inside));
        assert_eq!(from.params(), vec![Value::Integer(micros + 1)]);

        let until = ResultFilter::new().and(Clause::CreatedUntil(inside));
        assert_eq!(until.params(), vec![Value::Integer(micros)]);

        let exact = ResultFilter::new().and(Clause::CreatedFrom(whole));
        assert_eq!(exact.params(), vec![Value::Integer(micros)]);
    }
}
