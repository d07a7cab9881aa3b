//! Database model for job ledger rows.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use stockproxy_core::jobs::{JobId, JobLogEntry, JobState};

use crate::errors::StorageError;
use crate::utils::{format_timestamp, parse_timestamp};

/// Database model for a job ledger row
#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::job_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobLogDB {
    pub id: String,
    pub provider_name: String,
    pub url: String,
    pub status_code: Option<i32>,
    pub message: Option<String>,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

impl JobLogDB {
    pub fn created(id: &JobId, provider_name: &str, url: &str, now: DateTime<Utc>) -> Self {
        let now = format_timestamp(now);
        Self {
            id: id.to_string(),
            provider_name: provider_name.to_string(),
            url: url.to_string(),
            status_code: None,
            message: None,
            state: JobState::Created.as_str().to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn state(&self) -> Result<JobState, StorageError> {
        self.state.parse().map_err(StorageError::Core)
    }
}

impl TryFrom<JobLogDB> for JobLogEntry {
    type Error = StorageError;

    fn try_from(db: JobLogDB) -> Result<Self, Self::Error> {
        let state = db.state()?;
        let status_code = db
            .status_code
            .map(|code| {
                u16::try_from(code).map_err(|_| {
                    StorageError::SerializationError(format!("status code {} out of range", code))
                })
            })
            .transpose()?;

        Ok(JobLogEntry {
            id: JobId::from(db.id),
            provider_name: db.provider_name,
            url: db.url,
            status_code,
            message: db.message,
            state,
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
        })
    }
}
