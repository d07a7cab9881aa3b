//! Bar fetcher trait definition.
//!
//! This module defines the `BarFetcher` trait that every external data
//! source implements. Fetchers do I/O only; ledger bookkeeping and routing
//! live in the core crate.

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::{BarRequest, StockBar};

use super::capabilities::CapabilityDescriptor;

/// Trait for external stock-bar sources.
///
/// Implement this trait to add support for a new vendor. Every failure
/// carries a structural [`FetchErrorKind`](crate::errors::FetchErrorKind)
/// so callers never need to inspect error text.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use stockproxy_market_data::provider::{BarFetcher, CapabilityDescriptor};
///
/// struct MyFetcher {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl BarFetcher for MyFetcher {
///     fn id(&self) -> &'static str {
///         "MY_SOURCE"
///     }
///
///     fn default_capabilities(&self) -> CapabilityDescriptor {
///         CapabilityDescriptor::new(["NASDAQ"], [], true)
///     }
///
///     // ... implement request_url, ping and the fetch methods
/// }
/// ```
#[async_trait]
pub trait BarFetcher: Send + Sync {
    /// Unique identifier for this source.
    ///
    /// Should be a constant string like "ALPHA_VANTAGE", "MARKETSTACK", etc.
    fn id(&self) -> &'static str;

    /// What this source can serve when no configuration override is given.
    fn default_capabilities(&self) -> CapabilityDescriptor;

    /// The URL a fetch for `request` would hit.
    ///
    /// Deterministic in the request and the fetcher's static configuration.
    /// Secrets are redacted so the value is safe to record and log.
    fn request_url(&self, request: &BarRequest) -> String;

    /// Lightweight reachability check.
    async fn ping(&self) -> Result<(), FetchError>;

    /// Fetch daily bars, ordered by timestamp ascending.
    async fn fetch_daily(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError>;

    /// Fetch intraday bars at `request.interval`, ordered by timestamp ascending.
    async fn fetch_intraday(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError>;
}
