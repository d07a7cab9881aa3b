use crate::jobs::{JobLogEntry, JobState};

use super::health_model::ProviderStatus;

const CLOUDY_FLOOR: f64 = 0.75;
const RAINING_FLOOR: f64 = 0.25;
const THUNDERSTORM_FLOOR: f64 = 0.01;

/// Map a hit-rate onto a [`ProviderStatus`].
///
/// Each band is closed at its lower bound, so a value sitting exactly on a
/// boundary belongs to the higher band. Values below 0.01 (and NaN) are
/// `Eclipse`; `None` is `Unknown`.
pub fn classify(hit_rate: Option<f64>) -> ProviderStatus {
    match hit_rate {
        None => ProviderStatus::Unknown,
        Some(h) if h >= 1.0 => ProviderStatus::Sunny,
        Some(h) if h >= CLOUDY_FLOOR => ProviderStatus::Cloudy,
        Some(h) if h >= RAINING_FLOOR => ProviderStatus::Raining,
        Some(h) if h >= THUNDERSTORM_FLOOR => ProviderStatus::ThunderStorm,
        Some(_) => ProviderStatus::Eclipse,
    }
}

/// Number of entries that reached a terminal state.
pub fn terminal_count(entries: &[JobLogEntry]) -> usize {
    entries.iter().filter(|e| e.state.is_terminal()).count()
}

/// Fraction of terminal entries that succeeded.
///
/// Rows still `Created` or `InFlight` are ignored. Returns `None` when no
/// entry is terminal.
pub fn hit_rate(entries: &[JobLogEntry]) -> Option<f64> {
    let terminal = terminal_count(entries);
    if terminal == 0 {
        return None;
    }

    let succeeded = entries
        .iter()
        .filter(|e| e.state == JobState::Succeeded)
        .count();

    Some(succeeded as f64 / terminal as f64)
}
