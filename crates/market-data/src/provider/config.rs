use std::time::Duration;

use reqwest::{Client, Url};

use super::capabilities::FetchPreferences;

/// Default HTTP request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction-time configuration for a fetcher.
///
/// Passed explicitly; fetchers never read keys from the environment.
#[derive(Clone, Debug)]
pub struct FetcherConfig {
    pub api_key: String,

    /// Override of the vendor's base URL (tests, proxies)
    pub base_url: Option<String>,

    pub timeout: Duration,

    pub preferences: FetchPreferences,
}

impl FetcherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            preferences: FetchPreferences::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_preferences(mut self, preferences: FetchPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub(crate) fn http_client(&self) -> Client {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    pub(crate) fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or(default)
    }
}

/// Render `url` with the value of the `secret_param` query pair masked.
pub(crate) fn redact(url: &Url, secret_param: &str) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == secret_param {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
