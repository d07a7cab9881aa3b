//! SQLite-backed job ledger.

mod model;
mod repository;

pub use model::JobLogDB;
pub use repository::SqliteJobLedger;
