//! Stockproxy Core - routing, health classification and the job ledger.
//!
//! This crate contains the decision logic of the proxy. It is
//! database-agnostic and defines the `JobLedger` and `BarStore` traits that
//! are implemented by the `storage-sqlite` crate (in-memory versions live
//! here for tests and embedded use).
//!
//! The outer layer needs two calls: [`ProxyRouter::dispatch`] and
//! [`ProxyRouter::get_stats`].

pub mod bars;
pub mod config;
pub mod errors;
pub mod health;
pub mod jobs;
pub mod proxy;

pub use bars::{BarStore, InMemoryBarStore, PersistenceWarning};
pub use config::{build_router, build_router_with_warnings, ProviderConfig, ProviderKind, ProxyConfig};
pub use health::{classify, hit_rate, ProviderStats, ProviderStatus};
pub use jobs::{
    InMemoryJobLedger, JobId, JobLedger, JobLogEntry, JobState, RetrievalJobRequest,
    RetrievalJobResult,
};
pub use proxy::{ProviderAdapter, ProxyRouter, RetrievalOutcome};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
