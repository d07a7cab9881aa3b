use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use stockproxy_market_data::{normalize_exchange, normalize_symbol, Interval, StockBar};

use crate::bars::bars_traits::BarStore;
use crate::errors::Result;

type SeriesKey = (String, String, Interval);
type SeriesMap = BTreeMap<SeriesKey, BTreeMap<DateTime<Utc>, StockBar>>;

/// Process-local bar store.
///
/// Keyed by `(symbol, exchange, interval, timestamp)`; a bar already present
/// under a key is never replaced.
#[derive(Debug, Default)]
pub struct InMemoryBarStore {
    series: RwLock<SeriesMap>,
}

impl InMemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored bars across all series.
    pub fn len(&self) -> usize {
        self.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(symbol: &str, exchange: &str, interval: Interval) -> SeriesKey {
        (normalize_symbol(symbol), normalize_exchange(exchange), interval)
    }

    fn read(&self) -> RwLockReadGuard<'_, SeriesMap> {
        self.series.read().unwrap_or_else(|poisoned| {
            warn!("Bar store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, SeriesMap> {
        self.series.write().unwrap_or_else(|poisoned| {
            warn!("Bar store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl BarStore for InMemoryBarStore {
    async fn save(
        &self,
        symbol: &str,
        exchange: &str,
        interval: Interval,
        bars: Vec<StockBar>,
    ) -> Result<usize> {
        let mut series = self.write();
        let rows = series
            .entry(Self::key(symbol, exchange, interval))
            .or_default();

        let mut written = 0;
        for bar in bars {
            if let Entry::Vacant(slot) = rows.entry(bar.timestamp) {
                slot.insert(bar);
                written += 1;
            }
        }
        Ok(written)
    }

    fn load(&self, symbol: &str, exchange: &str, interval: Interval) -> Result<Vec<StockBar>> {
        Ok(self
            .read()
            .get(&Self::key(symbol, exchange, interval))
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}
