//! Market data models
//!
//! - `types` - Type aliases and identifier normalization
//! - `interval` - Bar sampling intervals (daily vs intraday)
//! - `bar` - OHLCV bars and the vendor-facing request
//! - `health` - Reachability snapshots returned by pings

mod bar;
mod health;
mod interval;
mod types;

pub use bar::{BarKind, BarRequest, StockBar};
pub use health::HealthSnapshot;
pub use interval::{Interval, ONE_DAY};
pub use types::{normalize_exchange, normalize_symbol, Exchange};
