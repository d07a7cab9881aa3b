//! Job ledger module - retrieval attempt records, the ledger trait and an
//! in-memory ledger.
//!
//! Every retrieval attempt owns exactly one ledger row:
//!
//! ```text
//! Created → InFlight → { Succeeded | ClientFailed | ProviderFailed }
//! ```
//!
//! Terminal states are final. The row is the source of truth for the result
//! returned to callers and for health computation.

mod jobs_model;
mod jobs_store;
mod jobs_traits;

pub use jobs_model::{JobId, JobLogEntry, JobState, RetrievalJobRequest, RetrievalJobResult};
pub use jobs_store::InMemoryJobLedger;
pub use jobs_traits::JobLedger;
