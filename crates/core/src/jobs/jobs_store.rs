use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, error};

use crate::errors::{Error, Result};
use crate::jobs::jobs_model::{JobId, JobLogEntry, JobState};
use crate::jobs::jobs_traits::JobLedger;

#[derive(Debug, Clone)]
struct Slot {
    /// Insertion order, used to break `created_at` ties
    seq: u64,
    entry: JobLogEntry,
}

/// Process-local ledger backed by a concurrent map.
///
/// Each row is mutated under its map entry lock, which serializes updates to
/// one job while leaving other rows independent.
#[derive(Debug, Default)]
pub struct InMemoryJobLedger {
    rows: DashMap<JobId, Slot>,
    next_seq: AtomicU64,
}

impl InMemoryJobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl JobLedger for InMemoryJobLedger {
    async fn create(&self, provider_name: &str, url: &str) -> Result<JobId> {
        let id = JobId::new();
        let now = Utc::now();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        self.rows.insert(
            id.clone(),
            Slot {
                seq,
                entry: JobLogEntry {
                    id: id.clone(),
                    provider_name: provider_name.to_string(),
                    url: url.to_string(),
                    status_code: None,
                    message: None,
                    state: JobState::Created,
                    created_at: now,
                    updated_at: now,
                },
            },
        );

        debug!("Ledger: created job {} for {}", id, provider_name);
        Ok(id)
    }

    async fn start(&self, job_id: &JobId, url: &str) -> Result<JobLogEntry> {
        let mut slot = self
            .rows
            .get_mut(job_id)
            .ok_or_else(|| Error::ledger(job_id, "row not found on start"))?;

        if slot.entry.state != JobState::Created {
            error!(
                "Ledger: job {} cannot start from state {}",
                job_id, slot.entry.state
            );
            return Err(Error::ledger(
                job_id,
                format!("cannot start a job in state {}", slot.entry.state),
            ));
        }

        slot.entry.url = url.to_string();
        slot.entry.state = JobState::InFlight;
        slot.entry.updated_at = Utc::now();
        Ok(slot.entry.clone())
    }

    async fn finalize(
        &self,
        job_id: &JobId,
        provider_name: &str,
        url: &str,
        status_code: u16,
        message: &str,
    ) -> Result<JobLogEntry> {
        let mut slot = self
            .rows
            .get_mut(job_id)
            .ok_or_else(|| Error::ledger(job_id, "row not found on finalize"))?;

        if slot.entry.state.is_terminal() {
            error!("Ledger: job {} finalized twice", job_id);
            return Err(Error::ledger(
                job_id,
                format!("already finalized as {}", slot.entry.state),
            ));
        }

        if slot.entry.provider_name != provider_name {
            return Err(Error::ledger(
                job_id,
                format!(
                    "row belongs to '{}', not '{}'",
                    slot.entry.provider_name, provider_name
                ),
            ));
        }

        slot.entry.url = url.to_string();
        slot.entry.status_code = Some(status_code);
        slot.entry.message = Some(message.to_string());
        slot.entry.state = JobState::from_status_code(status_code);
        slot.entry.updated_at = Utc::now();

        debug!(
            "Ledger: finalized job {} as {} ({})",
            job_id, slot.entry.state, status_code
        );
        Ok(slot.entry.clone())
    }

    fn find(&self, job_id: &JobId) -> Result<Option<JobLogEntry>> {
        Ok(self.rows.get(job_id).map(|slot| slot.entry.clone()))
    }

    fn recent_for(&self, provider_name: &str, window: usize) -> Result<Vec<JobLogEntry>> {
        let mut slots: Vec<Slot> = self
            .rows
            .iter()
            .filter(|slot| slot.entry.provider_name == provider_name)
            .map(|slot| slot.value().clone())
            .collect();

        slots.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(slots
            .into_iter()
            .take(window)
            .map(|slot| slot.entry)
            .collect())
    }
}
