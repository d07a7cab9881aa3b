//! SQLite storage implementation for Stockproxy.
//!
//! This crate provides the durable job ledger and bar store using Diesel with
//! SQLite. It implements the `JobLedger` and `BarStore` traits defined in
//! `stockproxy-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - A single-writer actor that serializes all writes
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! ```text
//!        core (router, adapters)
//!                  │
//!        JobLedger │ BarStore
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod bars;
pub mod db;
pub mod errors;
pub mod jobs;
pub mod schema;
mod utils;

pub use bars::SqliteBarStore;
pub use db::{
    create_pool, get_connection, get_db_path, init, run_migrations, spawn_writer, DbConnection,
    DbPool, WriteHandle,
};
pub use errors::{IntoCore, StorageError};
pub use jobs::SqliteJobLedger;

pub use stockproxy_core::errors::{DatabaseError, Error, Result};
