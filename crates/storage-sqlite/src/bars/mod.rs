//! SQLite-backed bar store.

mod model;
mod repository;

pub use model::StockBarDB;
pub use repository::SqliteBarStore;
