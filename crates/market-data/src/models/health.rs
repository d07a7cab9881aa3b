use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a lightweight reachability check against a data source.
///
/// Advisory only: a failed ping degrades the snapshot instead of raising.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub provider: String,
    pub reachable: bool,
    pub latency_ms: u64,
    /// Failure description when unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn reachable(provider: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            reachable: true,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unreachable(
        provider: impl Into<String>,
        latency_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            reachable: false,
            latency_ms,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }
}
