use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockproxy_market_data::{BarRequest, FetchErrorKind, Interval};
use uuid::Uuid;

use crate::errors::Error;

/// Identifier of a ledger row.
///
/// Generated ids are UUID v7, so they sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        JobId(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId(id.to_string())
    }
}

/// Lifecycle state of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    InFlight,
    Succeeded,
    ClientFailed,
    ProviderFailed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "CREATED",
            JobState::InFlight => "IN_FLIGHT",
            JobState::Succeeded => "SUCCEEDED",
            JobState::ClientFailed => "CLIENT_FAILED",
            JobState::ProviderFailed => "PROVIDER_FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::ClientFailed | JobState::ProviderFailed
        )
    }

    /// Terminal state for a finalize status code.
    ///
    /// 2xx is success, 4xx is a client failure, anything else is a provider
    /// failure.
    pub fn from_status_code(status_code: u16) -> Self {
        match status_code {
            200..=299 => JobState::Succeeded,
            400..=499 => JobState::ClientFailed,
            _ => JobState::ProviderFailed,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(JobState::Created),
            "IN_FLIGHT" => Ok(JobState::InFlight),
            "SUCCEEDED" => Ok(JobState::Succeeded),
            "CLIENT_FAILED" => Ok(JobState::ClientFailed),
            "PROVIDER_FAILED" => Ok(JobState::ProviderFailed),
            other => Err(Error::Unexpected(format!("unknown job state '{}'", other))),
        }
    }
}

/// One retrieval attempt as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogEntry {
    pub id: JobId,
    pub provider_name: String,
    /// Vendor URL with secrets redacted
    pub url: String,
    /// HTTP-like outcome code, set on finalize
    pub status_code: Option<u16>,
    pub message: Option<String>,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inbound retrieval request as the router receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalJobRequest {
    pub symbol: String,
    pub exchange: String,
    pub interval: Interval,
    /// Pre-created ledger row, absent for ad-hoc calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

impl RetrievalJobRequest {
    pub fn new(symbol: &str, exchange: &str, interval: Interval) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            interval,
            job_id: None,
        }
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Normalized vendor-facing request.
    pub fn bar_request(&self) -> BarRequest {
        BarRequest::new(&self.symbol, &self.exchange, self.interval)
    }
}

/// Result view returned by the router.
///
/// Only ever built from a ledger row, so the answer and the audit trail
/// cannot disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalJobResult {
    pub job_id: JobId,
    pub provider_name: String,
    pub url: String,
    pub state: JobState,
    pub status_code: Option<u16>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RetrievalJobResult {
    pub fn is_success(&self) -> bool {
        self.state == JobState::Succeeded
    }

    pub fn error_kind(&self) -> Option<FetchErrorKind> {
        match self.state {
            JobState::ClientFailed => Some(FetchErrorKind::Client),
            JobState::ProviderFailed => Some(FetchErrorKind::Provider),
            _ => None,
        }
    }
}

impl From<JobLogEntry> for RetrievalJobResult {
    fn from(entry: JobLogEntry) -> Self {
        Self {
            job_id: entry.id,
            provider_name: entry.provider_name,
            url: entry.url,
            state: entry.state,
            status_code: entry.status_code,
            message: entry.message,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_status_code() {
        assert_eq!(JobState::from_status_code(200), JobState::Succeeded);
        assert_eq!(JobState::from_status_code(204), JobState::Succeeded);
        assert_eq!(JobState::from_status_code(400), JobState::ClientFailed);
        assert_eq!(JobState::from_status_code(404), JobState::ClientFailed);
        assert_eq!(JobState::from_status_code(429), JobState::ClientFailed);
        assert_eq!(JobState::from_status_code(502), JobState::ProviderFailed);
        assert_eq!(JobState::from_status_code(0), JobState::ProviderFailed);
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in [
            JobState::Created,
            JobState::InFlight,
            JobState::Succeeded,
            JobState::ClientFailed,
            JobState::ProviderFailed,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("DONE".parse::<JobState>().is_err());
    }

    #[test]
    fn test_job_ids_are_v7_uuids() {
        let first = JobId::new();
        let second = JobId::new();
        assert_ne!(first, second);
        assert_eq!(Uuid::parse_str(first.as_str()).unwrap().get_version_num(), 7);
    }

    #[test]
    fn test_result_error_kind() {
        let now = Utc::now();
        let mut result = RetrievalJobResult {
            job_id: JobId::new(),
            provider_name: "alpha".to_string(),
            url: "u".to_string(),
            state: JobState::ClientFailed,
            status_code: Some(400),
            message: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(result.error_kind(), Some(FetchErrorKind::Client));
        assert!(!result.is_success());

        result.state = JobState::Succeeded;
        assert_eq!(result.error_kind(), None);
        assert!(result.is_success());
    }

    #[test]
    fn test_request_normalizes_into_bar_request() {
        let request = RetrievalJobRequest::new("aapl", "nasdaq", Interval::OneDay);
        let bar_request = request.bar_request();
        assert_eq!(bar_request.symbol, "AAPL");
        assert_eq!(bar_request.exchange, "NASDAQ");
    }
}
