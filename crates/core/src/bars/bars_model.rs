use std::fmt;

use serde::{Deserialize, Serialize};
use stockproxy_market_data::Interval;

use crate::jobs::JobId;

/// A bar save that failed after a successful fetch.
///
/// Logged and optionally forwarded to a warning channel. Never returned to
/// the caller and never changes the job's ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceWarning {
    pub job_id: JobId,
    pub provider: String,
    pub symbol: String,
    pub exchange: String,
    pub interval: Interval,
    pub bar_count: usize,
    pub message: String,
}

impl fmt::Display for PersistenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to persist {} {} bars for {}:{} (job {}, provider {}): {}",
            self.bar_count,
            self.interval,
            self.exchange,
            self.symbol,
            self.job_id,
            self.provider,
            self.message
        )
    }
}
