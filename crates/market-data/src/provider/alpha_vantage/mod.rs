//! Alpha Vantage bar fetcher.
//!
//! - Daily bars via TIME_SERIES_DAILY
//! - Intraday bars via TIME_SERIES_INTRADAY (1min..60min)
//!
//! Non-US listings are addressed by symbol suffix (e.g. `SHOP.TRT`).
//! Note: Alpha Vantage free tier is limited to 25 API calls per day.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::config::redact;
use crate::errors::FetchError;
use crate::models::{BarRequest, Interval, StockBar};
use crate::provider::{BarFetcher, CapabilityDescriptor, FetcherConfig};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const API_KEY_PARAM: &str = "apikey";

/// Symbol used for reachability pings.
const PING_SYMBOL: &str = "IBM";

/// Exchanges addressed by a symbol suffix, and the suffix to use.
const EXCHANGE_SUFFIXES: &[(&str, &str)] = &[
    ("NASDAQ", ""),
    ("NYSE", ""),
    ("AMEX", ""),
    ("LSE", ".LON"),
    ("TSX", ".TRT"),
    ("XETRA", ".DEX"),
    ("BSE", ".BSE"),
];

/// Alpha Vantage bar fetcher.
pub struct AlphaVantageFetcher {
    client: Client,
    config: FetcherConfig,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// Shape shared by all TIME_SERIES_* responses.
///
/// The series key depends on the function ("Time Series (Daily)",
/// "Time Series (5min)"), so everything besides the error fields is
/// captured through `flatten`.
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(flatten)]
    rest: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

impl TimeSeriesResponse {
    fn check_api_error(&self) -> Result<(), FetchError> {
        if let Some(ref msg) = self.error_message {
            // Alpha Vantage answers unknown symbols with "Invalid API call"
            return Err(FetchError::SymbolNotFound(msg.clone()));
        }

        // "Note" is only sent for call-frequency throttling
        if self.note.is_some() {
            return Err(FetchError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if let Some(ref msg) = self.information {
            let lower = msg.to_lowercase();
            if lower.contains("rate limit")
                || lower.contains("api call frequency")
                || lower.contains("requests per day")
            {
                return Err(FetchError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            return Err(FetchError::Unauthorized {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }

        Ok(())
    }

    /// Time zone declared in "Meta Data", UTC when absent or unknown.
    fn time_zone(&self) -> Tz {
        self.rest
            .get("Meta Data")
            .and_then(|meta| meta.as_object())
            .and_then(|meta| {
                meta.iter()
                    .find(|(key, _)| key.ends_with("Time Zone"))
                    .and_then(|(_, value)| value.as_str())
            })
            .and_then(|tz| Tz::from_str(tz).ok())
            .unwrap_or(Tz::UTC)
    }

    fn take_series(&mut self) -> Option<HashMap<String, RawBar>> {
        let key = self
            .rest
            .keys()
            .find(|k| k.starts_with("Time Series"))?
            .clone();
        let value = self.rest.remove(&key)?;
        match serde_json::from_value(value) {
            Ok(series) => Some(series),
            Err(e) => {
                warn!("Alpha Vantage: malformed series '{}': {}", key, e);
                None
            }
        }
    }
}

// ============================================================================
// AlphaVantageFetcher implementation
// ============================================================================

impl AlphaVantageFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        let client = config.http_client();
        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url_or(BASE_URL)
    }

    /// Vendor symbol for a request: the ticker plus the exchange suffix.
    fn vendor_symbol(request: &BarRequest) -> String {
        let suffix = EXCHANGE_SUFFIXES
            .iter()
            .find(|(exchange, _)| *exchange == request.exchange)
            .map(|(_, suffix)| *suffix)
            .unwrap_or("");
        format!("{}{}", request.symbol, suffix)
    }

    fn query_params(&self, request: &BarRequest) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(5);
        if request.interval.is_intraday() {
            params.push(("function", "TIME_SERIES_INTRADAY".to_string()));
            params.push(("symbol", Self::vendor_symbol(request)));
            params.push(("interval", request.interval.as_str().to_string()));
        } else {
            params.push(("function", "TIME_SERIES_DAILY".to_string()));
            params.push(("symbol", Self::vendor_symbol(request)));
        }
        params.push((
            "outputsize",
            self.config.preferences.output_size.as_str().to_string(),
        ));
        params
    }

    fn build_url(&self, params: &[(&'static str, String)]) -> Result<Url, FetchError> {
        let mut all_params: Vec<(&str, &str)> =
            params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_params.push((API_KEY_PARAM, self.config.api_key.as_str()));

        Url::parse_with_params(self.base_url(), &all_params)
            .map_err(|e| FetchError::provider(PROVIDER_ID, format!("Failed to build URL: {}", e)))
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&'static str, String)]) -> Result<String, FetchError> {
        let url = self.build_url(params)?;

        debug!(
            "Alpha Vantage request: {}",
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
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::provider(PROVIDER_ID, format!("HTTP {}", status)));
        }

        response.text().await.map_err(FetchError::Network)
    }

    /// Parse a date string in YYYY-MM-DD format to midnight UTC.
    fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| Utc.from_local_datetime(&dt).single())
    }

    /// Parse an intraday timestamp given in the series' local time zone.
    fn parse_datetime(datetime_str: &str, tz: Tz) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S")
            .ok()
            .and_then(|dt| tz.from_local_datetime(&dt).earliest())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s).ok()
    }

    /// Turn a response body into bars for `request`, ascending by time.
    fn parse_series(request: &BarRequest, text: &str) -> Result<Vec<StockBar>, FetchError> {
        let mut response: TimeSeriesResponse = serde_json::from_str(text).map_err(|e| {
            FetchError::invalid_response(PROVIDER_ID, format!("Failed to parse response: {}", e))
        })?;

        response.check_api_error()?;

        let tz = response.time_zone();
        let series = response.take_series().ok_or_else(|| {
            FetchError::SymbolNotFound(format!("No data for symbol: {}", request.symbol))
        })?;

        let intraday = request.interval.is_intraday();
        let total = series.len();
        let mut bars: Vec<StockBar> = series
            .into_iter()
            .filter_map(|(time_str, raw)| {
                let timestamp = if intraday {
                    Self::parse_datetime(&time_str, tz)?
                } else {
                    Self::parse_date(&time_str)?
                };
                Some(request.bar(
                    timestamp,
                    Self::parse_decimal(&raw.open)?,
                    Self::parse_decimal(&raw.high)?,
                    Self::parse_decimal(&raw.low)?,
                    Self::parse_decimal(&raw.close)?,
                    Self::parse_decimal(&raw.volume)?,
                ))
            })
            .collect();

        if bars.len() < total {
            warn!(
                "Alpha Vantage: dropped {} of {} rows for {}",
                total - bars.len(),
                total,
                request.symbol
            );
        }

        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(bars)
    }

    async fn fetch_series(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError> {
        let text = self.fetch(&self.query_params(request)).await?;
        let bars = Self::parse_series(request, &text)?;

        debug!(
            "Alpha Vantage: fetched {} {} bars for {}",
            bars.len(),
            request.interval,
            request.symbol
        );

        Ok(bars)
    }
}

#[async_trait]
impl BarFetcher for AlphaVantageFetcher {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn default_capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new(
            EXCHANGE_SUFFIXES.iter().map(|(exchange, _)| *exchange),
            Interval::INTRADAY,
            true,
        )
        .with_preferences(self.config.preferences.clone())
    }

    fn request_url(&self, request: &BarRequest) -> String {
        let params = self.query_params(request);
        match self.build_url(&params) {
            Ok(url) => redact(&url, API_KEY_PARAM),
            Err(_) => {
                let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!("{}?{}&apikey=***", self.base_url(), query.join("&"))
            }
        }
    }

    async fn ping(&self) -> Result<(), FetchError> {
        let params = [
            ("function", "GLOBAL_QUOTE".to_string()),
            ("symbol", PING_SYMBOL.to_string()),
        ];
        let text = self.fetch(&params).await?;
        let response: TimeSeriesResponse = serde_json::from_str(&text).map_err(|e| {
            FetchError::invalid_response(PROVIDER_ID, format!("Failed to parse response: {}", e))
        })?;
        response.check_api_error()
    }

    async fn fetch_daily(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError> {
        if request.interval.is_intraday() {
            return Err(FetchError::UnsupportedInterval(format!(
                "{} is not a daily interval",
                request.interval
            )));
        }
        self.fetch_series(request).await
    }

    async fn fetch_intraday(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError> {
        if !request.interval.is_intraday() {
            return Err(FetchError::UnsupportedInterval(format!(
                "{} is not an intraday interval",
                request.interval
            )));
        }
        self.fetch_series(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchErrorKind;
    use crate::provider::{FetchPreferences, OutputSize};
    use rust_decimal_macros::dec;

    fn fetcher() -> AlphaVantageFetcher {
        AlphaVantageFetcher::new(FetcherConfig::new("secret_key"))
    }

    #[test]
    fn test_provider_id() {
        assert_eq!(fetcher().id(), "ALPHA_VANTAGE");
    }

    #[test]
    fn test_request_url_daily_redacts_key() {
        let request = BarRequest::new("AAPL", "NASDAQ", Interval::OneDay);
        let url = fetcher().request_url(&request);

        assert_eq!(
            url,
            "https://www.alphavantage.co/query?function=TIME_SERIES_DAILY&symbol=AAPL&outputsize=compact&apikey=***"
        );
        assert!(!url.contains("secret_key"));
    }

    #[test]
    fn test_request_url_intraday_with_suffix() {
        let fetcher = AlphaVantageFetcher::new(FetcherConfig::new("k3y").with_preferences(
            FetchPreferences {
                output_size: OutputSize::Full,
                page_limit: None,
            },
        ));
        let request = BarRequest::new("shop", "tsx", Interval::FifteenMinutes);

        assert_eq!(
            fetcher.request_url(&request),
            "https://www.alphavantage.co/query?function=TIME_SERIES_INTRADAY&symbol=SHOP.TRT&interval=15min&outputsize=full&apikey=***"
        );
    }

    #[test]
    fn test_request_url_is_deterministic() {
        let request = BarRequest::new("IBM", "NYSE", Interval::FiveMinutes);
        assert_eq!(fetcher().request_url(&request), fetcher().request_url(&request));
    }

    #[test]
    fn test_default_capabilities() {
        let caps = fetcher().default_capabilities();
        assert!(caps.daily_supported());
        assert!(caps.supports_exchange("LSE"));
        assert!(!caps.supports_exchange("HKEX"));
        assert_eq!(caps.intraday_intervals().len(), 5);
    }

    #[test]
    fn test_parse_daily_series() {
        let json = r#"{
            "Meta Data": {
                "1. Information": "Daily Prices (open, high, low, close) and Volumes",
                "2. Symbol": "IBM",
                "3. Last Refreshed": "2024-01-03",
                "4. Output Size": "Compact",
                "5. Time Zone": "US/Eastern"
            },
            "Time Series (Daily)": {
                "2024-01-03": {
                    "1. open": "161.0000",
                    "2. high": "161.7300",
                    "3. low": "160.0800",
                    "4. close": "160.1000",
                    "5. volume": "4086133"
                },
                "2024-01-02": {
                    "1. open": "162.8300",
                    "2. high": "163.2900",
                    "3. low": "160.6800",
                    "4. close": "161.5000",
                    "5. volume": "4722443"
                }
            }
        }"#;

        let request = BarRequest::new("IBM", "NYSE", Interval::OneDay);
        let bars = AlphaVantageFetcher::parse_series(&request, json).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(bars[0].close, dec!(161.5000));
        assert_eq!(bars[1].volume, dec!(4086133));
        assert_eq!(bars[1].exchange, "NYSE");
        assert_eq!(bars[1].interval, Interval::OneDay);
    }

    #[test]
    fn test_parse_series_drops_malformed_rows() {
        let json = r#"{
            "Meta Data": {"5. Time Zone": "US/Eastern"},
            "Time Series (Daily)": {
                "2024-01-03": {
                    "1. open": "161.0000",
                    "2. high": "161.7300",
                    "3. low": "160.0800",
                    "4. close": "160.1000",
                    "5. volume": "4086133"
                },
                "2024-01-02": {
                    "1. open": "n/a",
                    "2. high": "163.2900",
                    "3. low": "160.6800",
                    "4. close": "161.5000",
                    "5. volume": "4722443"
                },
                "01/01/2024": {
                    "1. open": "160.0000",
                    "2. high": "163.0000",
                    "3. low": "159.0000",
                    "4. close": "162.0000",
                    "5. volume": "1000"
                }
            }
        }"#;

        let request = BarRequest::new("IBM", "NYSE", Interval::OneDay);
        let bars = AlphaVantageFetcher::parse_series(&request, json).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_intraday_series_converts_time_zone() {
        let json = r#"{
            "Meta Data": {
                "1. Information": "Intraday (5min) open, high, low, close prices and volume",
                "2. Symbol": "IBM",
                "4. Interval": "5min",
                "6. Time Zone": "US/Eastern"
            },
            "Time Series (5min)": {
                "2024-01-02 09:35:00": {
                    "1. open": "162.1",
                    "2. high": "162.5",
                    "3. low": "161.9",
                    "4. close": "162.2",
                    "5. volume": "1200"
                }
            }
        }"#;

        let request = BarRequest::new("IBM", "NYSE", Interval::FiveMinutes);
        let bars = AlphaVantageFetcher::parse_series(&request, json).unwrap();

        assert_eq!(bars.len(), 1);
        // 09:35 EST is 14:35 UTC
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 14, 35, 0).unwrap()
        );
    }

    #[test]
    fn test_error_message_is_symbol_not_found() {
        let json = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let request = BarRequest::new("ZZZZ", "NASDAQ", Interval::OneDay);

        let err = AlphaVantageFetcher::parse_series(&request, json).unwrap_err();
        assert!(matches!(err, FetchError::SymbolNotFound(_)));
        assert_eq!(err.kind(), FetchErrorKind::Client);
    }

    #[test]
    fn test_note_is_rate_limited() {
        let json = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        let request = BarRequest::new("IBM", "NYSE", Interval::OneDay);

        let err = AlphaVantageFetcher::parse_series(&request, json).unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { .. }));
        assert_eq!(err.kind(), FetchErrorKind::Provider);
    }

    #[test]
    fn test_information_about_key_is_unauthorized() {
        let json = r#"{"Information": "The parameter apikey is invalid or missing."}"#;
        let request = BarRequest::new("IBM", "NYSE", Interval::OneDay);

        let err = AlphaVantageFetcher::parse_series(&request, json).unwrap_err();
        assert!(matches!(err, FetchError::Unauthorized { .. }));
    }

    #[test]
    fn test_missing_series_is_symbol_not_found() {
        let json = r#"{"Meta Data": {}}"#;
        let request = BarRequest::new("IBM", "NYSE", Interval::OneDay);

        let err = AlphaVantageFetcher::parse_series(&request, json).unwrap_err();
        assert!(matches!(err, FetchError::SymbolNotFound(_)));
    }

    #[test]
    fn test_garbage_body_is_invalid_response() {
        let request = BarRequest::new("IBM", "NYSE", Interval::OneDay);
        let err = AlphaVantageFetcher::parse_series(&request, "<html>").unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponse { .. }));
        assert_eq!(err.kind(), FetchErrorKind::Provider);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(AlphaVantageFetcher::parse_date("invalid").is_none());
        assert!(AlphaVantageFetcher::parse_date("01-15-2024").is_none());
    }
}
