//! Database model for stored bars.

use std::str::FromStr;

use chrono::Utc;
use diesel::prelude::*;
use rust_decimal::Decimal;

use stockproxy_market_data::{Interval, StockBar};

use crate::errors::StorageError;
use crate::utils::{format_timestamp, parse_timestamp};

/// Database model for one OHLCV bar. Prices and volume are kept as decimal text.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::stock_bars)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StockBarDB {
    pub symbol: String,
    pub exchange: String,
    pub interval: String,
    pub timestamp: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub created_at: String,
}

impl StockBarDB {
    /// Row for `bar` under an explicit series key.
    pub fn from_bar(symbol: &str, exchange: &str, interval: Interval, bar: &StockBar) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            interval: interval.as_str().to_string(),
            timestamp: format_timestamp(bar.timestamp),
            open: bar.open.to_string(),
            high: bar.high.to_string(),
            low: bar.low.to_string(),
            close: bar.close.to_string(),
            volume: bar.volume.to_string(),
            created_at: format_timestamp(Utc::now()),
        }
    }
}

fn decimal(field: &str, value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value)
        .map_err(|e| StorageError::SerializationError(format!("{} '{}': {}", field, value, e)))
}

impl TryFrom<StockBarDB> for StockBar {
    type Error = StorageError;

    fn try_from(db: StockBarDB) -> Result<Self, Self::Error> {
        let interval = Interval::from_str(&db.interval)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        Ok(StockBar {
            timestamp: parse_timestamp(&db.timestamp)?,
            open: decimal("open", &db.open)?,
            high: decimal("high", &db.high)?,
            low: decimal("low", &db.low)?,
            close: decimal("close", &db.close)?,
            volume: decimal("volume", &db.volume)?,
            symbol: db.symbol,
            exchange: db.exchange,
            interval,
        })
    }
}
