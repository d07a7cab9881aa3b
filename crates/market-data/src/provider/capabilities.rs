//! Provider capability descriptors and routing decisions.
//!
//! A [`CapabilityDescriptor`] is the static description of what one provider
//! can serve: which exchanges, which intraday intervals, and whether daily
//! bars are available. Routing a request against it is a pure function.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{normalize_exchange, BarRequest, Exchange, Interval};

/// How much history a provider should return per request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSize {
    /// Most recent window only (AlphaVantage `compact`: 100 points)
    #[default]
    Compact,
    /// Full available history
    Full,
}

impl OutputSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

/// Provider-specific output preferences used when building request URLs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPreferences {
    pub output_size: OutputSize,

    /// Maximum rows per page for paginated APIs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
}

/// Which retrieval path a request takes on a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingDecision {
    Daily,
    IntraDay,
    Reject(RejectReason),
}

/// Why a provider cannot serve a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The request's exchange is not in the supported set.
    UnsupportedExchange { exchange: Exchange },

    /// Daily bars were requested but the provider has no daily support.
    DailyNotSupported,

    /// The intraday interval is not in the supported set.
    UnsupportedInterval { interval: Interval },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnsupportedExchange { exchange } => {
                write!(f, "exchange '{}' is not supported", exchange)
            }
            RejectReason::DailyNotSupported => write!(f, "daily bars are not supported"),
            RejectReason::UnsupportedInterval { interval } => {
                write!(f, "interval '{}' is not supported", interval)
            }
        }
    }
}

/// Static description of what a provider can serve.
///
/// Immutable after construction. Sets are always given explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    exchanges: BTreeSet<Exchange>,
    intraday_intervals: BTreeSet<Interval>,
    daily_supported: bool,
    preferences: FetchPreferences,
}

impl CapabilityDescriptor {
    /// Create a descriptor from explicit sets.
    ///
    /// Exchange identifiers are normalized to upper case. `OneDay` is ignored
    /// if passed among the intraday intervals; daily support is governed by
    /// `daily_supported` alone.
    pub fn new<E, S>(
        exchanges: E,
        intraday_intervals: impl IntoIterator<Item = Interval>,
        daily_supported: bool,
    ) -> Self
    where
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exchanges: exchanges
                .into_iter()
                .map(|e| normalize_exchange(e.as_ref()))
                .collect(),
            intraday_intervals: intraday_intervals
                .into_iter()
                .filter(Interval::is_intraday)
                .collect(),
            daily_supported,
            preferences: FetchPreferences::default(),
        }
    }

    pub fn with_preferences(mut self, preferences: FetchPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn exchanges(&self) -> &BTreeSet<Exchange> {
        &self.exchanges
    }

    pub fn intraday_intervals(&self) -> &BTreeSet<Interval> {
        &self.intraday_intervals
    }

    pub fn daily_supported(&self) -> bool {
        self.daily_supported
    }

    pub fn preferences(&self) -> &FetchPreferences {
        &self.preferences
    }

    pub fn supports_exchange(&self, exchange: &str) -> bool {
        self.exchanges.contains(&normalize_exchange(exchange))
    }

    /// Decide the retrieval path for a request. No I/O.
    ///
    /// The exchange is checked before the interval.
    pub fn resolve_path(&self, request: &BarRequest) -> RoutingDecision {
        if !self.supports_exchange(&request.exchange) {
            return RoutingDecision::Reject(RejectReason::UnsupportedExchange {
                exchange: request.exchange.clone(),
            });
        }

        match request.interval {
            Interval::OneDay if self.daily_supported => RoutingDecision::Daily,
            Interval::OneDay => RoutingDecision::Reject(RejectReason::DailyNotSupported),
            interval if self.intraday_intervals.contains(&interval) => RoutingDecision::IntraDay,
            interval => RoutingDecision::Reject(RejectReason::UnsupportedInterval { interval }),
        }
    }

    pub fn is_admissible(&self, request: &BarRequest) -> bool {
        !matches!(self.resolve_path(request), RoutingDecision::Reject(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nasdaq_daily_only() -> CapabilityDescriptor {
        CapabilityDescriptor::new(["NASDAQ"], [], true)
    }

    #[test]
    fn test_daily_request_routes_to_daily() {
        let descriptor = nasdaq_daily_only();
        let request = BarRequest::new("AAPL", "NASDAQ", Interval::OneDay);

        assert!(descriptor.is_admissible(&request));
        assert_eq!(descriptor.resolve_path(&request), RoutingDecision::Daily);
    }

    #[test]
    fn test_unsupported_exchange_rejected() {
        let descriptor = nasdaq_daily_only();
        let request = BarRequest::new("AAPL", "NYSE", Interval::OneDay);

        assert!(!descriptor.is_admissible(&request));
        assert_eq!(
            descriptor.resolve_path(&request),
            RoutingDecision::Reject(RejectReason::UnsupportedExchange {
                exchange: "NYSE".to_string()
            })
        );
    }

    #[test]
    fn test_exchange_checked_before_interval() {
        let descriptor = nasdaq_daily_only();
        let request = BarRequest::new("AAPL", "NYSE", Interval::FiveMinutes);

        assert!(matches!(
            descriptor.resolve_path(&request),
            RoutingDecision::Reject(RejectReason::UnsupportedExchange { .. })
        ));
    }

    #[test]
    fn test_intraday_interval_outside_set_rejected() {
        let descriptor = CapabilityDescriptor::new(["NASDAQ"], [Interval::FiveMinutes], false);

        let ok = BarRequest::new("AAPL", "NASDAQ", Interval::FiveMinutes);
        assert_eq!(descriptor.resolve_path(&ok), RoutingDecision::IntraDay);

        let bad = BarRequest::new("AAPL", "NASDAQ", Interval::OneMinute);
        assert_eq!(
            descriptor.resolve_path(&bad),
            RoutingDecision::Reject(RejectReason::UnsupportedInterval {
                interval: Interval::OneMinute
            })
        );

        let daily = BarRequest::new("AAPL", "NASDAQ", Interval::OneDay);
        assert_eq!(
            descriptor.resolve_path(&daily),
            RoutingDecision::Reject(RejectReason::DailyNotSupported)
        );
    }

    #[test]
    fn test_one_day_in_intraday_set_is_ignored() {
        let descriptor = CapabilityDescriptor::new(["NASDAQ"], [Interval::OneDay], false);
        assert!(descriptor.intraday_intervals().is_empty());

        let daily = BarRequest::new("AAPL", "NASDAQ", Interval::OneDay);
        assert!(!descriptor.is_admissible(&daily));
    }

    #[test]
    fn test_exchange_matching_is_case_insensitive() {
        let descriptor = CapabilityDescriptor::new(["nasdaq"], [], true);
        assert!(descriptor.supports_exchange("NASDAQ"));
        assert!(descriptor.supports_exchange("Nasdaq"));
    }
}
