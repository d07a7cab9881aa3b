//! Bar persistence interface.
//!
//! Bars are written once after a successful fetch and never updated. A failed
//! save is reported as a [`PersistenceWarning`] and never fails the job.

mod bars_model;
mod bars_store;
mod bars_traits;

pub use bars_model::PersistenceWarning;
pub use bars_store::InMemoryBarStore;
pub use bars_traits::BarStore;
