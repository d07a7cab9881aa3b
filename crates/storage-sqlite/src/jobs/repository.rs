use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::{debug, error};

use stockproxy_core::errors::{Error, Result};
use stockproxy_core::jobs::{JobId, JobLedger, JobLogEntry, JobState};

use super::model::JobLogDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::job_logs;
use crate::utils::format_timestamp;
use crate::schema::job_logs::dsl::*;

fn inconsistency(job_id: &JobId, msg: impl Into<String>) -> Error {
    Error::LedgerInconsistency {
        job_id: job_id.clone(),
        message: msg.into(),
    }
}

/// Job ledger persisted in the `job_logs` table.
///
/// Reads use the pool; every write runs on the writer actor, so the
/// check-then-update in `start` and `finalize` is atomic per row.
pub struct SqliteJobLedger {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SqliteJobLedger {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        SqliteJobLedger { pool, writer }
    }

    fn find_row(conn: &mut SqliteConnection, job_id: &JobId) -> Result<Option<JobLogDB>> {
        Ok(job_logs
            .find(job_id.as_str())
            .select(JobLogDB::as_select())
            .first::<JobLogDB>(conn)
            .optional()
            .map_err(StorageError::from)?)
    }
}

#[async_trait]
impl JobLedger for SqliteJobLedger {
    async fn create(&self, provider: &str, request_url: &str) -> Result<JobId> {
        let job_id = JobId::new();
        let row = JobLogDB::created(&job_id, provider, request_url, Utc::now());

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(job_logs::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await?;

        debug!("Ledger: created job {} for {}", job_id, provider);
        Ok(job_id)
    }

    async fn start(&self, job_id: &JobId, request_url: &str) -> Result<JobLogEntry> {
        let job_id = job_id.clone();
        let request_url = request_url.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<JobLogEntry> {
                let mut row = Self::find_row(conn, &job_id)?
                    .ok_or_else(|| inconsistency(&job_id, "row not found on start"))?;

                let current = row.state()?;
                if current != JobState::Created {
                    error!("Ledger: job {} cannot start from state {}", job_id, current);
                    return Err(inconsistency(
                        &job_id,
                        format!("cannot start a job in state {}", current),
                    ));
                }

                row.url = request_url;
                row.state = JobState::InFlight.as_str().to_string();
                row.updated_at = format_timestamp(Utc::now());

                diesel::update(job_logs.find(job_id.as_str()))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(JobLogEntry::try_from(row)?)
            })
            .await
    }

    async fn finalize(
        &self,
        job_id: &JobId,
        provider: &str,
        request_url: &str,
        code: u16,
        msg: &str,
    ) -> Result<JobLogEntry> {
        let job_id = job_id.clone();
        let provider = provider.to_string();
        let request_url = request_url.to_string();
        let msg = msg.to_string();

        let entry = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<JobLogEntry> {
                let mut row = Self::find_row(conn, &job_id)?
                    .ok_or_else(|| inconsistency(&job_id, "row not found on finalize"))?;

                let current = row.state()?;
                if current.is_terminal() {
                    error!("Ledger: job {} finalized twice", job_id);
                    return Err(inconsistency(
                        &job_id,
                        format!("already finalized as {}", current),
                    ));
                }
                if row.provider_name != provider {
                    return Err(inconsistency(
                        &job_id,
                        format!("row belongs to '{}', not '{}'", row.provider_name, provider),
                    ));
                }

                row.url = request_url;
                row.status_code = Some(i32::from(code));
                row.message = Some(msg);
                row.state = JobState::from_status_code(code).as_str().to_string();
                row.updated_at = format_timestamp(Utc::now());

                diesel::update(job_logs.find(job_id.as_str()))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(JobLogEntry::try_from(row)?)
            })
            .await?;

        debug!(
            "Ledger: finalized job {} as {} ({})",
            entry.id, entry.state, code
        );
        Ok(entry)
    }

    fn find(&self, job_id: &JobId) -> Result<Option<JobLogEntry>> {
        let mut conn = get_connection(&self.pool)?;
        Self::find_row(&mut conn, job_id)?
            .map(|row| JobLogEntry::try_from(row).map_err(Error::from))
            .transpose()
    }

    fn recent_for(&self, provider: &str, window: usize) -> Result<Vec<JobLogEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let limit = i64::try_from(window).unwrap_or(i64::MAX);

        let rows = job_logs
            .filter(provider_name.eq(provider))
            .order((created_at.desc(), id.desc()))
            .limit(limit)
            .select(JobLogDB::as_select())
            .load::<JobLogDB>(&mut conn)
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|row| JobLogEntry::try_from(row).map_err(Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, SqliteJobLedger) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let pool = create_pool(db_path.to_str().unwrap()).unwrap();
        run_migrations(&pool).unwrap();
        let writer = spawn_writer((*pool).clone()).unwrap();
        (dir, SqliteJobLedger::new(pool, writer))
    }

    #[tokio::test]
    async fn test_row_lifecycle_is_persisted() {
        let (_dir, ledger) = setup();
        let job = ledger.create("alpha", "https://a/q?apikey=***").await.unwrap();

        let row = ledger.find(&job).unwrap().unwrap();
        assert_eq!(row.state, JobState::Created);
        assert_eq!(row.status_code, None);

        let row = ledger.start(&job, "https://a/q?symbol=AAPL&apikey=***").await.unwrap();
        assert_eq!(row.state, JobState::InFlight);

        let row = ledger
            .finalize(&job, "alpha", "https://a/q?symbol=AAPL&apikey=***", 200, "fetched 2 bars")
            .await
            .unwrap();
        assert_eq!(row.state, JobState::Succeeded);
        assert_eq!(row.status_code, Some(200));

        let stored = ledger.find(&job).unwrap().unwrap();
        assert_eq!(stored.url, "https://a/q?symbol=AAPL&apikey=***");
        assert_eq!(stored.message.as_deref(), Some("fetched 2 bars"));
        assert_eq!(stored.state, JobState::Succeeded);
    }

    #[tokio::test]
    async fn test_finalized_row_is_never_rewritten() {
        let (_dir, ledger) = setup();
        let job = ledger.create("alpha", "u").await.unwrap();
        ledger.finalize(&job, "alpha", "u", 502, "upstream down").await.unwrap();

        let err = ledger.finalize(&job, "alpha", "u", 200, "late").await.unwrap_err();
        assert!(matches!(err, Error::LedgerInconsistency { .. }));

        let err = ledger.start(&job, "u").await.unwrap_err();
        assert!(matches!(err, Error::LedgerInconsistency { .. }));

        let row = ledger.find(&job).unwrap().unwrap();
        assert_eq!(row.state, JobState::ProviderFailed);
        assert_eq!(row.status_code, Some(502));
    }

    #[tokio::test]
    async fn test_missing_and_foreign_rows_are_inconsistent() {
        let (_dir, ledger) = setup();
        let missing = JobId::from("no-such-job");
        assert!(ledger.find(&missing).unwrap().is_none());
        assert!(matches!(
            ledger.finalize(&missing, "alpha", "u", 200, "ok").await,
            Err(Error::LedgerInconsistency { .. })
        ));

        let job = ledger.create("alpha", "u").await.unwrap();
        assert!(matches!(
            ledger.finalize(&job, "beta", "u", 200, "ok").await,
            Err(Error::LedgerInconsistency { .. })
        ));
        assert_eq!(ledger.find(&job).unwrap().unwrap().state, JobState::Created);
    }

    #[tokio::test]
    async fn test_recent_for_is_newest_first_and_windowed() {
        let (_dir, ledger) = setup();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(ledger.create("alpha", "u").await.unwrap());
        }
        ledger.create("beta", "u").await.unwrap();

        let recent = ledger.recent_for("alpha", 3).unwrap();
        let recent_ids: Vec<JobId> = recent.into_iter().map(|row| row.id).collect();
        assert_eq!(recent_ids, vec![ids[4].clone(), ids[3].clone(), ids[2].clone()]);

        assert_eq!(ledger.recent_for("alpha", 100).unwrap().len(), 5);
        assert!(ledger.recent_for("alpha", 0).unwrap().is_empty());
        assert!(ledger.recent_for("gamma", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_finalize_applies_once() {
        let (_dir, ledger) = setup();
        let ledger = Arc::new(ledger);
        let job = ledger.create("alpha", "u").await.unwrap();

        let mut handles = Vec::new();
        for code in [200u16, 404, 502, 200] {
            let ledger = ledger.clone();
            let job = job.clone();
            handles.push(tokio::spawn(async move {
                ledger.finalize(&job, "alpha", "u", code, "race").await.is_ok()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }
}
