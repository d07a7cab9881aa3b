//! Provider adapters and the router that dispatches to them.
//!
//! ```text
//! ProxyRouter::dispatch(name, request)
//!      ↓ create / reuse ledger row
//! ProviderAdapter::retrieve ── resolve_path ── BarFetcher::fetch_*
//!      ↓ finalize row             ↓ spawn
//! ledger row → RetrievalJobResult   BarStore::save (best effort)
//! ```
//!
//! Retrieval orchestration (ledger bookkeeping, error classification,
//! background persistence) lives once in [`ProviderAdapter`] and is shared by
//! every vendor fetcher.

mod adapter;
mod router;

pub use adapter::{ProviderAdapter, RetrievalOutcome, DEFAULT_STATS_WINDOW};
pub use router::ProxyRouter;
