//! Proxy configuration.
//!
//! Providers are declared in a JSON document. API keys may be left out of the
//! document and supplied through `STOCKPROXY_<NAME>_API_KEY` instead.
//!
//! ```json
//! {
//!   "statsWindow": 100,
//!   "providers": [
//!     { "name": "alpha", "kind": "alpha_vantage", "apiKey": "demo",
//!       "exchanges": ["NASDAQ", "NYSE"], "settings": { "plan": "free" } }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use stockproxy_market_data::{
    AlphaVantageFetcher, BarFetcher, CapabilityDescriptor, FetchPreferences, FetcherConfig,
    Interval, MarketStackFetcher, OutputSize,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::bars::{BarStore, PersistenceWarning};
use crate::errors::{Error, Result};
use crate::jobs::JobLedger;
use crate::proxy::{ProviderAdapter, ProxyRouter, DEFAULT_STATS_WINDOW};

/// Environment variable holding the path of the configuration document.
pub const CONFIG_PATH_ENV: &str = "STOCKPROXY_CONFIG";

const ENV_PREFIX: &str = "STOCKPROXY";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Keys shorter than this are masked completely in stats.
const MIN_KEY_LEN_FOR_TAIL: usize = 8;
const KEY_TAIL_LEN: usize = 4;

/// Supported vendor implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    AlphaVantage,
    Marketstack,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::AlphaVantage => "alpha_vantage",
            ProviderKind::Marketstack => "marketstack",
        }
    }
}

/// One provider entry.
///
/// Capability fields left out fall back to the fetcher's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    /// Shown in stats in place of the key; defaults to a masked key
    #[serde(default)]
    pub api_key_identifier: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub exchanges: Option<Vec<String>>,
    #[serde(default)]
    pub intraday_intervals: Option<Vec<Interval>>,
    #[serde(default)]
    pub daily_supported: Option<bool>,
    #[serde(default)]
    pub output_size: Option<OutputSize>,
    #[serde(default)]
    pub page_limit: Option<u32>,
    /// Non-secret settings reported in provider stats
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_stats_window() -> usize {
    DEFAULT_STATS_WINDOW
}

impl ProviderConfig {
    /// Name of the environment variable that overrides this provider's key.
    pub fn api_key_env_var(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}_API_KEY", ENV_PREFIX, name)
    }

    /// Identifier shown instead of the key: explicit value, or `****` plus
    /// the last four characters. Keys under eight characters show no tail.
    pub fn api_key_identifier(&self) -> String {
        if let Some(ref identifier) = self.api_key_identifier {
            return identifier.clone();
        }
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() < MIN_KEY_LEN_FOR_TAIL {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - KEY_TAIL_LEN..].iter().collect();
        format!("****{}", tail)
    }

    pub fn preferences(&self) -> FetchPreferences {
        FetchPreferences {
            output_size: self.output_size.unwrap_or_default(),
            page_limit: self.page_limit,
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        let config = FetcherConfig::new(self.api_key.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_preferences(self.preferences());
        match self.base_url {
            Some(ref url) => config.with_base_url(url.clone()),
            None => config,
        }
    }

    /// Overlay configured capability fields on the fetcher's defaults.
    pub fn capabilities(&self, defaults: &CapabilityDescriptor) -> CapabilityDescriptor {
        let exchanges: Vec<String> = match self.exchanges {
            Some(ref exchanges) => exchanges.clone(),
            None => defaults.exchanges().iter().cloned().collect(),
        };
        let intervals: Vec<Interval> = match self.intraday_intervals {
            Some(ref intervals) => intervals.clone(),
            None => defaults.intraday_intervals().iter().copied().collect(),
        };
        let daily = self.daily_supported.unwrap_or(defaults.daily_supported());

        CapabilityDescriptor::new(exchanges, intervals, daily).with_preferences(self.preferences())
    }

    /// Map reported as `ProviderStats::config`. Never contains the key.
    pub fn public_settings(&self) -> BTreeMap<String, String> {
        let mut settings = self.settings.clone();
        settings.insert("kind".to_string(), self.kind.as_str().to_string());
        settings.insert("timeoutSecs".to_string(), self.timeout_secs.to_string());
        if let Some(ref url) = self.base_url {
            settings.insert("baseUrl".to_string(), url.clone());
        }
        settings
    }

    fn build_fetcher(&self) -> Arc<dyn BarFetcher> {
        match self.kind {
            ProviderKind::AlphaVantage => Arc::new(AlphaVantageFetcher::new(self.fetcher_config())),
            ProviderKind::Marketstack => Arc::new(MarketStackFetcher::new(self.fetcher_config())),
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Number of most recent ledger rows used for health stats
    #[serde(default = "default_stats_window")]
    pub stats_window: usize,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            stats_window: DEFAULT_STATS_WINDOW,
            providers: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Parse a document. No environment lookup is done here.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfigValue(format!("invalid configuration: {}", e)))
    }

    /// Read a document from disk and apply API key overrides from the
    /// environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIO(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_json_str(&text)?;
        config.apply_key_overrides(|var| std::env::var(var).ok());
        info!(
            "Loaded {} provider(s) from {}",
            config.providers.len(),
            path.display()
        );
        Ok(config)
    }

    /// Load the document named by `STOCKPROXY_CONFIG`.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_err(|_| Error::MissingConfigKey(CONFIG_PATH_ENV.to_string()))?;
        Self::load(path)
    }

    /// Replace API keys with non-empty values returned by `lookup` for each
    /// provider's override variable.
    pub fn apply_key_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for provider in &mut self.providers {
            let var = provider.api_key_env_var();
            if let Some(key) = lookup(&var).filter(|k| !k.trim().is_empty()) {
                debug!("Using {} for provider '{}'", var, provider.name);
                provider.api_key = key;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stats_window == 0 {
            return Err(Error::InvalidConfigValue(
                "statsWindow must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(Error::InvalidConfigValue(
                    "provider name must not be empty".to_string(),
                ));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(Error::InvalidConfigValue(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
            if provider.api_key.trim().is_empty() {
                return Err(Error::MissingConfigKey(format!(
                    "apiKey for provider '{}' (or {})",
                    provider.name,
                    provider.api_key_env_var()
                )));
            }
        }
        Ok(())
    }
}

/// Build a router with one adapter per configured provider.
pub fn build_router(
    config: &ProxyConfig,
    ledger: Arc<dyn JobLedger>,
    bar_store: Arc<dyn BarStore>,
) -> Result<ProxyRouter> {
    build_router_with_warnings(config, ledger, bar_store, None)
}

/// Like [`build_router`], forwarding persistence warnings to `warnings`.
pub fn build_router_with_warnings(
    config: &ProxyConfig,
    ledger: Arc<dyn JobLedger>,
    bar_store: Arc<dyn BarStore>,
    warnings: Option<UnboundedSender<PersistenceWarning>>,
) -> Result<ProxyRouter> {
    config.validate()?;

    let mut router = ProxyRouter::new(ledger.clone());
    for provider in &config.providers {
        let fetcher = provider.build_fetcher();
        let capabilities = provider.capabilities(&fetcher.default_capabilities());

        let mut adapter =
            ProviderAdapter::new(provider.name.clone(), fetcher, ledger.clone(), bar_store.clone())
                .with_capabilities(capabilities)
                .with_api_key_identifier(provider.api_key_identifier())
                .with_config(provider.public_settings())
                .with_stats_window(config.stats_window);
        if let Some(ref sender) = warnings {
            adapter = adapter.with_warning_channel(sender.clone());
        }

        router.register(adapter)?;
    }
    Ok(router)
}
