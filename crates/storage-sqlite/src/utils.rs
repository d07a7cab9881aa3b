//! Text encodings shared by the table models.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::errors::StorageError;

/// Upper bound on bound parameters per statement, well under SQLite's limit.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Rows per multi-row INSERT for a table with `columns` columns.
pub(crate) fn rows_per_insert(columns: usize) -> usize {
    (SQLITE_MAX_PARAMS_CHUNK / columns.max(1)).max(1)
}

/// Fixed-width RFC 3339 in UTC, so text order matches time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("timestamp '{}': {}", value, e)))
}
