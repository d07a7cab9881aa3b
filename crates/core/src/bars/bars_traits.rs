use async_trait::async_trait;
use stockproxy_market_data::{Interval, StockBar};

use crate::errors::Result;

/// Trait for bar storage operations.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Persist bars for one series. Existing bars are kept as they are.
    ///
    /// Returns the number of bars newly written.
    async fn save(
        &self,
        symbol: &str,
        exchange: &str,
        interval: Interval,
        bars: Vec<StockBar>,
    ) -> Result<usize>;

    /// All stored bars for one series, ascending by timestamp.
    fn load(&self, symbol: &str, exchange: &str, interval: Interval) -> Result<Vec<StockBar>>;
}
