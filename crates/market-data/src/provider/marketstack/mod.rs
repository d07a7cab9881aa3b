//! MarketStack bar fetcher.
//!
//! This module provides bars from the MarketStack API:
//! - End-of-day bars via /v1/eod
//! - Intraday bars via /v1/intraday
//!
//! Listings are addressed by symbol plus the exchange MIC.
//! API documentation: https://marketstack.com/documentation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use num_traits::FromPrimitive;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::config::redact;
use crate::errors::FetchError;
use crate::models::{BarRequest, Interval, StockBar};
use crate::provider::{BarFetcher, CapabilityDescriptor, FetcherConfig, OutputSize};

const BASE_URL: &str = "https://api.marketstack.com";
const PROVIDER_ID: &str = "MARKETSTACK";
const API_KEY_PARAM: &str = "access_key";

const PING_SYMBOL: &str = "AAPL";

/// Exchange identifiers and their ISO 10383 MIC.
const EXCHANGE_MICS: &[(&str, &str)] = &[
    ("NASDAQ", "XNAS"),
    ("NYSE", "XNYS"),
    ("AMEX", "XASE"),
    ("LSE", "XLON"),
    ("TSX", "XTSE"),
];

const COMPACT_LIMIT: u32 = 100;
const FULL_LIMIT: u32 = 1000;

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /v1/eod and /v1/intraday
#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    data: Vec<RawBar>,
    // Note: pagination exists but a single page is requested
}

#[derive(Debug, Deserialize)]
struct RawBar {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    /// Intraday rows may carry only the last trade price
    last: Option<f64>,
    volume: Option<f64>,
    date: String,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl ErrorBody {
    /// Map a MarketStack error code onto a classified fetch error.
    fn into_fetch_error(self, symbol: &str) -> FetchError {
        match self.code.as_str() {
            "no_valid_symbols_provided" => {
                FetchError::SymbolNotFound(format!("{}: {}", symbol, self.message))
            }
            "invalid_api_function" | "validation_error" => FetchError::InvalidRequest(self.message),
            "invalid_access_key"
            | "missing_access_key"
            | "inactive_user"
            | "https_access_restricted"
            | "function_access_restricted" => {
                FetchError::Unauthorized {
                    provider: PROVIDER_ID.to_string(),
                    message: self.message,
                }
            }
            "usage_limit_reached" | "rate_limit_reached" | "too_many_requests" => {
                FetchError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                }
            }
            _ => FetchError::provider(PROVIDER_ID, format!("{} - {}", self.code, self.message)),
        }
    }
}

// ============================================================================
// MarketStackFetcher
// ============================================================================

/// MarketStack bar fetcher.
///
/// Serves end-of-day bars for the mapped exchanges and intraday bars at
/// 1min to 1hour resolution.
pub struct MarketStackFetcher {
    client: Client,
    config: FetcherConfig,
}

impl MarketStackFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        let client = config.http_client();
        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url_or(BASE_URL)
    }

    fn mic_for(exchange: &str) -> Option<&'static str> {
        EXCHANGE_MICS
            .iter()
            .find(|(name, _)| *name == exchange)
            .map(|(_, mic)| *mic)
    }

    /// MarketStack interval spelling.
    fn vendor_interval(interval: Interval) -> &'static str {
        match interval {
            Interval::OneHour => "1hour",
            other => other.as_str(),
        }
    }

    fn limit(&self) -> u32 {
        let preferences = &self.config.preferences;
        preferences.page_limit.unwrap_or(match preferences.output_size {
            OutputSize::Compact => COMPACT_LIMIT,
            OutputSize::Full => FULL_LIMIT,
        })
    }

    fn endpoint(request: &BarRequest) -> &'static str {
        if request.interval.is_intraday() {
            "/v1/intraday"
        } else {
            "/v1/eod"
        }
    }

    fn query_params(&self, request: &BarRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![("symbols", request.symbol.clone())];
        if let Some(mic) = Self::mic_for(&request.exchange) {
            params.push(("exchange", mic.to_string()));
        }
        if request.interval.is_intraday() {
            params.push((
                "interval",
                Self::vendor_interval(request.interval).to_string(),
            ));
        }
        params.push(("limit", self.limit().to_string()));
        params
    }

    fn build_url(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<Url, FetchError> {
        let mut all_params: Vec<(&str, &str)> = vec![(API_KEY_PARAM, self.config.api_key.as_str())];
        all_params.extend(params.iter().map(|(k, v)| (*k, v.as_str())));

        Url::parse_with_params(&format!("{}{}", self.base_url(), endpoint), &all_params)
            .map_err(|e| FetchError::provider(PROVIDER_ID, format!("Failed to build URL: {}", e)))
    }

    /// Make a GET request to the MarketStack API.
    async fn fetch(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
        symbol: &str,
    ) -> Result<String, FetchError> {
        let url = self.build_url(endpoint, params)?;

        debug!(
            "MarketStack request: {}",
            redact(&url, API_KEY_PARAM)
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                FetchError::Network(e)
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(FetchError::Network)?;

        if status.is_success() {
            return Ok(body);
        }

        // Prefer the error envelope's code over the bare status
        if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&body) {
            return Err(error_resp.error.into_fetch_error(symbol));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        Err(FetchError::provider(
            PROVIDER_ID,
            format!("HTTP {} - {}", status, body),
        ))
    }

    /// Parse a MarketStack timestamp such as `2024-01-02T00:00:00+0000`.
    fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%z")
            .or_else(|_| DateTime::parse_from_rfc3339(date_str))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn to_decimal(value: Option<f64>) -> Option<Decimal> {
        value.and_then(Decimal::from_f64)
    }

    fn bar_from_raw(
        request: &BarRequest,
        timestamp: DateTime<Utc>,
        raw: &RawBar,
    ) -> Option<StockBar> {
        Some(request.bar(
            timestamp,
            Self::to_decimal(raw.open)?,
            Self::to_decimal(raw.high)?,
            Self::to_decimal(raw.low)?,
            Self::to_decimal(raw.close.or(raw.last))?,
            Self::to_decimal(raw.volume).unwrap_or(Decimal::ZERO),
        ))
    }

    fn parse_bars(request: &BarRequest, text: &str) -> Result<Vec<StockBar>, FetchError> {
        let response: BarsResponse = serde_json::from_str(text).map_err(|e| {
            FetchError::invalid_response(PROVIDER_ID, format!("Failed to parse response: {}", e))
        })?;

        let total = response.data.len();
        let mut bars = Vec::with_capacity(total);
        for raw in response.data {
            let timestamp = match Self::parse_date(&raw.date) {
                Some(ts) => ts,
                None => {
                    warn!("MarketStack: invalid date '{}' for {}", raw.date, request.symbol);
                    continue;
                }
            };

            match Self::bar_from_raw(request, timestamp, &raw) {
                Some(bar) => bars.push(bar),
                None => debug!(
                    "MarketStack: skipping incomplete bar at {} for {}",
                    timestamp, request.symbol
                ),
            }
        }

        if bars.len() < total {
            warn!(
                "MarketStack: dropped {} of {} rows for {}",
                total - bars.len(),
                total,
                request.symbol
            );
        }

        // MarketStack returns newest first
        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(bars)
    }

    async fn fetch_bars(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError> {
        if Self::mic_for(&request.exchange).is_none() {
            return Err(FetchError::InvalidRequest(format!(
                "exchange '{}' has no MarketStack MIC",
                request.exchange
            )));
        }

        let text = self
            .fetch(
                Self::endpoint(request),
                &self.query_params(request),
                &request.symbol,
            )
            .await?;
        let bars = Self::parse_bars(request, &text)?;

        debug!(
            "MarketStack: fetched {} {} bars for {}",
            bars.len(),
            request.interval,
            request.symbol
        );

        Ok(bars)
    }
}

#[async_trait]
impl BarFetcher for MarketStackFetcher {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn default_capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new(
            EXCHANGE_MICS.iter().map(|(exchange, _)| *exchange),
            Interval::INTRADAY,
            true,
        )
        .with_preferences(self.config.preferences.clone())
    }

    fn request_url(&self, request: &BarRequest) -> String {
        let endpoint = Self::endpoint(request);
        let params = self.query_params(request);
        match self.build_url(endpoint, &params) {
            Ok(url) => redact(&url, API_KEY_PARAM),
            Err(_) => {
                let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!(
                    "{}{}?access_key=***&{}",
                    self.base_url(),
                    endpoint,
                    query.join("&")
                )
            }
        }
    }

    async fn ping(&self) -> Result<(), FetchError> {
        let params = [
            ("symbols", PING_SYMBOL.to_string()),
            ("limit", "1".to_string()),
        ];
        let text = self.fetch("/v1/eod", &params, PING_SYMBOL).await?;
        serde_json::from_str::<BarsResponse>(&text).map_err(|e| {
            FetchError::invalid_response(PROVIDER_ID, format!("Failed to parse response: {}", e))
        })?;
        Ok(())
    }

    async fn fetch_daily(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError> {
        if request.interval.is_intraday() {
            return Err(FetchError::UnsupportedInterval(format!(
                "{} is not a daily interval",
                request.interval
            )));
        }
        self.fetch_bars(request).await
    }

    async fn fetch_intraday(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError> {
        if !request.interval.is_intraday() {
            return Err(FetchError::UnsupportedInterval(format!(
                "{} is not an intraday interval",
                request.interval
            )));
        }
        self.fetch_bars(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchErrorKind;
    use crate::provider::FetchPreferences;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn fetcher() -> MarketStackFetcher {
        MarketStackFetcher::new(FetcherConfig::new("ms_secret"))
    }

    #[test]
    fn test_request_url_eod() {
        let request = BarRequest::new("AAPL", "NASDAQ", Interval::OneDay);
        let url = fetcher().request_url(&request);

        assert_eq!(
            url,
            "https://api.marketstack.com/v1/eod?access_key=***&symbols=AAPL&exchange=XNAS&limit=100"
        );
        assert!(!url.contains("ms_secret"));
    }

    #[test]
    fn test_request_url_intraday_uses_vendor_interval() {
        let fetcher = MarketStackFetcher::new(FetcherConfig::new("k").with_preferences(
            FetchPreferences {
                output_size: OutputSize::Full,
                page_limit: Some(250),
            },
        ));
        let request = BarRequest::new("MSFT", "NASDAQ", Interval::OneHour);

        assert_eq!(
            fetcher.request_url(&request),
            "https://api.marketstack.com/v1/intraday?access_key=***&symbols=MSFT&exchange=XNAS&interval=1hour&limit=250"
        );
    }

    #[test]
    fn test_base_url_override() {
        let fetcher = MarketStackFetcher::new(
            FetcherConfig::new("k").with_base_url("http://localhost:8080/"),
        );
        let request = BarRequest::new("VOD", "LSE", Interval::OneDay);

        assert!(fetcher
            .request_url(&request)
            .starts_with("http://localhost:8080/v1/eod?"));
    }

    #[test]
    fn test_default_capabilities() {
        let caps = fetcher().default_capabilities();
        assert!(caps.supports_exchange("TSX"));
        assert!(!caps.supports_exchange("XETRA"));
        assert!(caps.daily_supported());
    }

    #[test]
    fn test_parse_eod_bars_sorted_ascending() {
        let json = r#"{
            "pagination": {"limit": 100, "offset": 0, "count": 2, "total": 2},
            "data": [
                {
                    "open": 187.15, "high": 188.44, "low": 183.885, "close": 185.64,
                    "volume": 82488700.0, "symbol": "AAPL", "exchange": "XNAS",
                    "date": "2024-01-02T00:00:00+0000"
                },
                {
                    "open": 193.9, "high": 194.4, "low": 191.725, "close": 192.53,
                    "volume": 42628800.0, "symbol": "AAPL", "exchange": "XNAS",
                    "date": "2023-12-29T00:00:00+0000"
                }
            ]
        }"#;

        let request = BarRequest::new("AAPL", "NASDAQ", Interval::OneDay);
        let bars = MarketStackFetcher::parse_bars(&request, json).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2023, 12, 29, 0, 0, 0).unwrap()
        );
        assert_eq!(bars[1].close, dec!(185.64));
        assert_eq!(bars[1].exchange, "NASDAQ");
    }

    #[test]
    fn test_parse_intraday_falls_back_to_last() {
        let json = r#"{
            "data": [
                {
                    "open": 185.0, "high": 185.5, "low": 184.8, "close": null,
                    "last": 185.2, "volume": null,
                    "date": "2024-01-02T15:30:00+0000"
                }
            ]
        }"#;

        let request = BarRequest::new("AAPL", "NASDAQ", Interval::FiveMinutes);
        let bars = MarketStackFetcher::parse_bars(&request, json).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, dec!(185.2));
        assert_eq!(bars[0].volume, Decimal::ZERO);
        assert_eq!(bars[0].interval, Interval::FiveMinutes);
    }

    #[test]
    fn test_parse_skips_incomplete_rows() {
        let json = r#"{
            "data": [
                {"open": null, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1.0,
                 "date": "2024-01-02T00:00:00+0000"},
                {"open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1.0,
                 "date": "not a date"},
                {"open": 2.0, "high": 2.5, "low": 1.5, "close": 2.25, "volume": 300.0,
                 "date": "2024-01-03T00:00:00+0000"}
            ]
        }"#;

        let request = BarRequest::new("AAPL", "NASDAQ", Interval::OneDay);
        let bars = MarketStackFetcher::parse_bars(&request, json).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, dec!(2.25));
    }

    #[test]
    fn test_error_codes_are_classified() {
        let body = |code: &str| ErrorBody {
            code: code.to_string(),
            message: "msg".to_string(),
        };

        let err = body("no_valid_symbols_provided").into_fetch_error("ZZZZ");
        assert!(matches!(err, FetchError::SymbolNotFound(_)));
        assert_eq!(err.kind(), FetchErrorKind::Client);

        let err = body("validation_error").into_fetch_error("AAPL");
        assert_eq!(err.kind(), FetchErrorKind::Client);
        assert_eq!(err.status_code(), 400);

        let err = body("invalid_access_key").into_fetch_error("AAPL");
        assert!(matches!(err, FetchError::Unauthorized { .. }));
        assert_eq!(err.kind(), FetchErrorKind::Provider);

        let err = body("function_access_restricted").into_fetch_error("AAPL");
        assert!(matches!(err, FetchError::Unauthorized { .. }));
        assert_eq!(err.kind(), FetchErrorKind::Provider);
        assert_eq!(err.status_code(), 502);

        let err = body("rate_limit_reached").into_fetch_error("AAPL");
        assert_eq!(err.status_code(), 503);

        let err = body("internal_error").into_fetch_error("AAPL");
        assert_eq!(err.kind(), FetchErrorKind::Provider);
    }

    #[test]
    fn test_error_envelope_parses() {
        let json = r#"{"error": {"code": "invalid_access_key", "message": "You have not supplied a valid API Access Key."}}"#;
        let parsed: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.error.code, "invalid_access_key");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            MarketStackFetcher::parse_date("2024-01-02T00:00:00+0000"),
            Some(expected)
        );
        assert_eq!(
            MarketStackFetcher::parse_date("2024-01-02T00:00:00Z"),
            Some(expected)
        );
        assert!(MarketStackFetcher::parse_date("2024-01-02").is_none());
    }

    #[tokio::test]
    async fn test_unmapped_exchange_is_client_error() {
        let request = BarRequest::new("SAP", "XETRA", Interval::OneDay);
        let err = fetcher().fetch_daily(&request).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Client);
    }

    #[tokio::test]
    async fn test_daily_rejects_intraday_interval() {
        let request = BarRequest::new("AAPL", "NASDAQ", Interval::FiveMinutes);
        let err = fetcher().fetch_daily(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedInterval(_)));
    }
}
