//! Core error types for Stockproxy.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use stockproxy_market_data::{FetchError, FetchErrorKind};
use thiserror::Error;

use crate::jobs::JobId;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the proxy core.
///
/// `Client` and `Provider` are the two retrieval failure classes; both are
/// recorded in the job ledger before they reach the router. The remaining
/// variants are infrastructure or programming errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-attributable failure (unsupported exchange or interval, bad symbol).
    #[error("Client error: {message}")]
    Client {
        status_code: u16,
        message: String,
    },

    /// The external source failed, timed out or returned unexpected data.
    #[error("Provider error: {message}")]
    Provider {
        status_code: u16,
        message: String,
    },

    /// A ledger row referenced by a job could not be found or was already final.
    #[error("Ledger inconsistency for job {job_id}: {message}")]
    LedgerInconsistency { job_id: JobId, message: String },

    #[error("Provider '{0}' is not registered")]
    ProviderNotRegistered(String),

    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to load configuration: {0}")]
    ConfigIO(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Missing configuration key: {0}")]
    MissingConfigKey(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Retrieval failure class, `None` for infrastructure errors.
    pub fn kind(&self) -> Option<FetchErrorKind> {
        match self {
            Error::Client { .. } => Some(FetchErrorKind::Client),
            Error::Provider { .. } => Some(FetchErrorKind::Provider),
            _ => None,
        }
    }

    /// Status code recorded in the ledger for retrieval failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Client { status_code, .. } | Error::Provider { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    pub(crate) fn ledger(job_id: &JobId, message: impl Into<String>) -> Self {
        Error::LedgerInconsistency {
            job_id: job_id.clone(),
            message: message.into(),
        }
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        let status_code = err.status_code();
        let message = err.to_string();
        match err.kind() {
            FetchErrorKind::Client => Error::Client {
                status_code,
                message,
            },
            FetchErrorKind::Provider => Error::Provider {
                status_code,
                message,
            },
        }
    }
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate key).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ConfigIO(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfigValue(err.to_string())
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
