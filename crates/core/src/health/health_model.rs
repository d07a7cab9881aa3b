use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::jobs::JobLogEntry;

use super::classifier::{classify, hit_rate, terminal_count};

/// Discrete health level derived from a provider's hit-rate.
///
/// Categorical rather than a linear scale. `Unknown` means no terminal
/// attempts have been seen yet and is distinct from `Eclipse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderStatus {
    /// Below 1% success
    Eclipse,
    /// 1% to 25%
    ThunderStorm,
    /// 25% to 75%
    Raining,
    /// 75% up to but excluding 100%
    Cloudy,
    /// Every attempt succeeded
    Sunny,
    /// No data yet
    Unknown,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Eclipse => "Eclipse",
            ProviderStatus::ThunderStorm => "ThunderStorm",
            ProviderStatus::Raining => "Raining",
            ProviderStatus::Cloudy => "Cloudy",
            ProviderStatus::Sunny => "Sunny",
            ProviderStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time health snapshot for one provider.
///
/// Recomputed on demand from the ledger. Carries no timestamp so that two
/// reads over an unchanged ledger compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub name: String,
    pub api_key_identifier: String,
    /// Non-secret provider settings
    pub config: BTreeMap<String, String>,
    pub status: ProviderStatus,
    /// Fraction of terminal attempts that succeeded; `None` with no attempts
    pub hit_rate: Option<f64>,
    /// Number of terminal attempts the hit-rate was computed over
    pub sample_size: usize,
}

impl ProviderStats {
    /// Build a snapshot from the provider's recent ledger rows.
    pub fn from_entries(
        name: impl Into<String>,
        api_key_identifier: impl Into<String>,
        config: BTreeMap<String, String>,
        entries: &[JobLogEntry],
    ) -> Self {
        let hit_rate = hit_rate(entries);
        Self {
            name: name.into(),
            api_key_identifier: api_key_identifier.into(),
            config,
            status: classify(hit_rate),
            hit_rate,
            sample_size: terminal_count(entries),
        }
    }
}
