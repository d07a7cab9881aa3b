use async_trait::async_trait;

use crate::errors::Result;
use crate::jobs::jobs_model::{JobId, JobLogEntry};

/// Append/finalize log of retrieval attempts.
///
/// Implementations must serialize updates to a single row so that no two
/// finalizations of one job can race; distinct rows are independent. Reads
/// may observe a partially updated ledger.
#[async_trait]
pub trait JobLedger: Send + Sync {
    /// Append a `Created` row and return its id.
    async fn create(&self, provider_name: &str, url: &str) -> Result<JobId>;

    /// Record the URL about to be called and move the row to `InFlight`.
    ///
    /// Fails with `LedgerInconsistency` when the row is missing or no longer
    /// `Created`.
    async fn start(&self, job_id: &JobId, url: &str) -> Result<JobLogEntry>;

    /// Apply the single terminal update to a row.
    ///
    /// The terminal state is derived from `status_code`. Fails with
    /// `LedgerInconsistency` when the row is missing, belongs to another
    /// provider, or is already terminal.
    async fn finalize(
        &self,
        job_id: &JobId,
        provider_name: &str,
        url: &str,
        status_code: u16,
        message: &str,
    ) -> Result<JobLogEntry>;

    fn find(&self, job_id: &JobId) -> Result<Option<JobLogEntry>>;

    /// The `window` most recent rows for a provider, newest first.
    fn recent_for(&self, provider_name: &str, window: usize) -> Result<Vec<JobLogEntry>>;
}
