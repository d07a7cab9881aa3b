use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::interval::Interval;
use super::types::{normalize_exchange, normalize_symbol, Exchange};

/// Whether a bar belongs to a daily or an intraday series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarKind {
    Daily,
    IntraDay,
}

/// A single OHLCV data point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockBar {
    pub symbol: String,
    pub exchange: Exchange,
    pub interval: Interval,

    /// Bar open time (UTC)
    pub timestamp: DateTime<Utc>,

    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl StockBar {
    pub fn kind(&self) -> BarKind {
        if self.interval.is_intraday() {
            BarKind::IntraDay
        } else {
            BarKind::Daily
        }
    }
}

/// Vendor-facing retrieval request.
///
/// Symbol and exchange are normalized to upper case on construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarRequest {
    pub symbol: String,
    pub exchange: Exchange,
    pub interval: Interval,
}

impl BarRequest {
    pub fn new(symbol: &str, exchange: &str, interval: Interval) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            exchange: normalize_exchange(exchange),
            interval,
        }
    }

    /// Build a bar for this request's series.
    pub fn bar(
        &self,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> StockBar {
        StockBar {
            symbol: self.symbol.clone(),
            exchange: self.exchange.clone(),
            interval: self.interval,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
