//! Stockproxy Market Data Crate
//!
//! This crate provides the vendor-facing half of the stock data proxy:
//! fetching OHLCV bars from external sources and describing what each
//! source can serve.
//!
//! # Overview
//!
//! - Normalized requests and bars ([`BarRequest`], [`StockBar`], [`Interval`])
//! - Static capability descriptors with a pure routing decision
//! - Concrete fetchers for Alpha Vantage and MarketStack
//! - Errors tagged as client- or provider-attributable at the source
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +----------------------+
//! |   BarRequest     | --> | CapabilityDescriptor |  resolve_path (pure)
//! +------------------+     +----------------------+
//!                                  |
//!                        Daily / IntraDay / Reject
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   BarFetcher     |  (AlphaVantage, MarketStack)
//!                          +------------------+
//!                                  |
//!                                  v
//!                     Vec<StockBar> or FetchError{kind}
//! ```
//!
//! Job bookkeeping, persistence and routing by provider name live in
//! `stockproxy-core`.

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::{FetchError, FetchErrorKind};
pub use models::{
    normalize_exchange, normalize_symbol, BarKind, BarRequest, Exchange, HealthSnapshot, Interval,
    StockBar, ONE_DAY,
};
pub use provider::alpha_vantage::AlphaVantageFetcher;
pub use provider::marketstack::MarketStackFetcher;
pub use provider::{
    BarFetcher, CapabilityDescriptor, FetchPreferences, FetcherConfig, OutputSize, RejectReason,
    RoutingDecision, DEFAULT_TIMEOUT,
};
