use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::debug;

use stockproxy_core::bars::BarStore;
use stockproxy_core::errors::{Error, Result};
use stockproxy_market_data::{normalize_exchange, normalize_symbol, Interval, StockBar};

use super::model::StockBarDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::stock_bars;
use crate::utils::rows_per_insert;

const STOCK_BAR_COLUMNS: usize = 10;

/// Bar store persisted in the `stock_bars` table.
///
/// Rows are keyed by `(symbol, exchange, interval, timestamp)` and inserted
/// with `INSERT OR IGNORE`, so a stored bar is never updated.
pub struct SqliteBarStore {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SqliteBarStore {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        SqliteBarStore { pool, writer }
    }
}

#[async_trait]
impl BarStore for SqliteBarStore {
    async fn save(
        &self,
        symbol: &str,
        exchange: &str,
        interval: Interval,
        bars: Vec<StockBar>,
    ) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let symbol = normalize_symbol(symbol);
        let exchange = normalize_exchange(exchange);
        let rows: Vec<StockBarDB> = bars
            .iter()
            .map(|bar| StockBarDB::from_bar(&symbol, &exchange, interval, bar))
            .collect();
        let offered = rows.len();

        let written = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut written = 0;
                for chunk in rows.chunks(rows_per_insert(STOCK_BAR_COLUMNS)) {
                    written += diesel::insert_or_ignore_into(stock_bars::table)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(written)
            })
            .await?;

        debug!(
            "Bar store: wrote {} of {} bars for {}:{} {}",
            written, offered, symbol, exchange, interval
        );
        Ok(written)
    }

    fn load(&self, symbol: &str, exchange: &str, interval: Interval) -> Result<Vec<StockBar>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = stock_bars::table
            .filter(stock_bars::symbol.eq(normalize_symbol(symbol)))
            .filter(stock_bars::exchange.eq(normalize_exchange(exchange)))
            .filter(stock_bars::interval.eq(interval.as_str()))
            .order(stock_bars::timestamp.asc())
            .select(StockBarDB::as_select())
            .load::<StockBarDB>(&mut conn)
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|row| StockBar::try_from(row).map_err(Error::from))
            .collect()
    }
}
