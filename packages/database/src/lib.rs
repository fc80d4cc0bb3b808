#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `SQLite` store for fire detections, user reports and predictions.
//!
//! Uses `switchy_database` with raw parameterised SQL. Every function takes
//! a `&dyn Database` so the server and the ingest CLI can share them.
//!
//! Timestamps are stored as fixed-width UTC text
//! (`2024-10-15T08:12:00.000Z`) so that string comparison orders them
//! chronologically.

pub mod db;
pub mod detections;
pub mod predictions;
pub mod user_reports;

use chrono::{DateTime, NaiveDateTime, Utc};
use fire_map_geography_models::BoundingBox;
use switchy_database::DatabaseValue;

/// Storage format of every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The database file could not be opened.
    #[error("Failed to open database: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of a column failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Formats a timestamp for storage.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp, falling back to the Unix epoch.
#[must_use]
pub fn parse_timestamp(value: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|e| {
            log::warn!("Unparsable stored timestamp '{value}': {e}");
            DateTime::<Utc>::default()
        })
}

/// Incrementally built `WHERE` clause.
///
/// Placeholders are numbered in the order values are bound, which is also
/// the order they appear in the SQL text.
#[derive(Debug, Default)]
pub(crate) struct Filter {
    clauses: Vec<String>,
    params: Vec<DatabaseValue>,
}

impl Filter {
    /// Binds a value and returns its placeholder.
    pub fn bind(&mut self, value: DatabaseValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Adds a condition.
    pub fn and(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    /// Adds an inclusive rectangle test on `latitude`/`longitude`.
    pub fn within(&mut self, bounds: &BoundingBox) {
        let south = self.bind(DatabaseValue::Real64(bounds.south));
        let north = self.bind(DatabaseValue::Real64(bounds.north));
        let west = self.bind(DatabaseValue::Real64(bounds.west));
        let east = self.bind(DatabaseValue::Real64(bounds.east));
        self.and(format!(
            "latitude BETWEEN {south} AND {north} AND longitude BETWEEN {west} AND {east}"
        ));
    }

    /// The `WHERE ...` text, or empty if there are no conditions.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[DatabaseValue] {
        &self.params
    }
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn timestamps_round_trip_and_sort() {
        let early = Utc.with_ymd_and_hms(2024, 10, 15, 8, 5, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 10, 15, 18, 0, 0).unwrap();

        assert_eq!(format_timestamp(early), "2024-10-15T08:05:00.000Z");
        assert!(format_timestamp(early) < format_timestamp(late));
        assert_eq!(parse_timestamp(&format_timestamp(late)), late);
    }

    #[test]
    fn filter_numbers_placeholders_in_bind_order() {
        let mut filter = Filter::default();
        filter.within(&BoundingBox::new(32.5, 29.5, 76.5, 73.5));
        let p = filter.bind(DatabaseValue::Real64(80.0));
        filter.and(format!("confidence >= {p}"));

        assert_eq!(
            filter.where_sql(),
            " WHERE latitude BETWEEN $1 AND $2 AND longitude BETWEEN $3 AND $4 AND confidence >= $5"
        );
        assert_eq!(filter.params().len(), 5);
    }
}
