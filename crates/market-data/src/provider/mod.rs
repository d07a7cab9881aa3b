//! Bar fetcher abstractions and implementations.
//!
//! This module contains:
//! - The `BarFetcher` trait that all external sources implement
//! - Capability descriptors and the pure routing decision
//! - Concrete fetchers (AlphaVantage, MarketStack)
//!
//! Fetchers receive a normalized `BarRequest` and return bars or a classified
//! `FetchError`. They never touch the job ledger or the bar store.

mod capabilities;
mod config;
mod traits;

pub mod alpha_vantage;
pub mod marketstack;

pub use capabilities::{
    CapabilityDescriptor, FetchPreferences, OutputSize, RejectReason, RoutingDecision,
};
pub use config::{FetcherConfig, DEFAULT_TIMEOUT};
pub use traits::BarFetcher;
