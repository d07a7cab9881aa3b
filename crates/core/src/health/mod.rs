//! Provider health classification.
//!
//! A provider's health is a pure function of its recent hit-rate:
//!
//! ```text
//! JobLedger::recent_for → [JobLogEntry] → hit_rate → classify → ProviderStatus
//! ```
//!
//! - **Models** (`health_model.rs`) - `ProviderStatus` and the `ProviderStats` snapshot
//! - **Classifier** (`classifier.rs`) - Hit-rate computation and band classification

mod classifier;
mod health_model;

pub use classifier::{classify, hit_rate, terminal_count};
pub use health_model::{ProviderStats, ProviderStatus};
