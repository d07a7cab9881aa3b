use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use stockproxy_market_data::{
    BarFetcher, BarRequest, CapabilityDescriptor, HealthSnapshot, RoutingDecision, StockBar,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::bars::{BarStore, PersistenceWarning};
use crate::errors::{Error, Result};
use crate::health::ProviderStats;
use crate::jobs::{JobId, JobLedger};

/// Number of most recent ledger rows the hit-rate is computed over.
pub const DEFAULT_STATS_WINDOW: usize = 100;

/// Status code recorded for requests rejected by the capability check.
const CLIENT_REJECT_STATUS: u16 = 400;
const SUCCESS_STATUS: u16 = 200;

/// Successful retrieval.
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub job_id: JobId,
    pub bars_fetched: usize,
    /// Background bar persistence. Dropping the handle detaches the task.
    pub persistence: JoinHandle<()>,
}

/// One registered provider: a fetcher plus the bookkeeping around it.
pub struct ProviderAdapter {
    name: String,
    fetcher: Arc<dyn BarFetcher>,
    capabilities: CapabilityDescriptor,
    api_key_identifier: String,
    config: BTreeMap<String, String>,
    stats_window: usize,
    ledger: Arc<dyn JobLedger>,
    bar_store: Arc<dyn BarStore>,
    warnings: Option<UnboundedSender<PersistenceWarning>>,
}

impl ProviderAdapter {
    /// Create an adapter using the fetcher's default capabilities.
    pub fn new(
        name: impl Into<String>,
        fetcher: Arc<dyn BarFetcher>,
        ledger: Arc<dyn JobLedger>,
        bar_store: Arc<dyn BarStore>,
    ) -> Self {
        let capabilities = fetcher.default_capabilities();
        Self {
            name: name.into(),
            fetcher,
            capabilities,
            api_key_identifier: "****".to_string(),
            config: BTreeMap::new(),
            stats_window: DEFAULT_STATS_WINDOW,
            ledger,
            bar_store,
            warnings: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityDescriptor) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_api_key_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.api_key_identifier = identifier.into();
        self
    }

    /// Non-secret settings reported in [`ProviderStats::config`].
    pub fn with_config(mut self, config: BTreeMap<String, String>) -> Self {
        self.config = config;
        self
    }

    pub fn with_stats_window(mut self, window: usize) -> Self {
        self.stats_window = window;
        self
    }

    /// Forward persistence failures to `sender` in addition to logging them.
    pub fn with_warning_channel(mut self, sender: UnboundedSender<PersistenceWarning>) -> Self {
        self.warnings = Some(sender);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &CapabilityDescriptor {
        &self.capabilities
    }

    /// Redacted vendor URL for `request`.
    pub fn request_url(&self, request: &BarRequest) -> String {
        self.fetcher.request_url(request)
    }

    /// Advisory reachability check. Never fails; problems degrade the snapshot.
    pub async fn ping_health(&self) -> HealthSnapshot {
        let started = Instant::now();
        let result = self.fetcher.ping().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                debug!("{}: ping ok in {}ms", self.name, latency_ms);
                HealthSnapshot::reachable(&self.name, latency_ms)
            }
            Err(e) => {
                warn!("{}: ping failed after {}ms: {}", self.name, latency_ms, e);
                HealthSnapshot::unreachable(&self.name, latency_ms, e.to_string())
            }
        }
    }

    /// Run one retrieval against the ledger row `job_id`.
    ///
    /// The row is moved to `InFlight` with the request URL, then finalized
    /// exactly once. Client and provider failures are recorded before they
    /// are returned. On success bar persistence is spawned in the background.
    pub async fn retrieve(&self, job_id: &JobId, request: &BarRequest) -> Result<RetrievalOutcome> {
        let url = self.request_url(request);
        self.ledger.start(job_id, &url).await?;

        let fetched = match self.capabilities.resolve_path(request) {
            RoutingDecision::Reject(reason) => {
                let message = format!(
                    "{} cannot serve {}:{} at {}: {}",
                    self.name, request.exchange, request.symbol, request.interval, reason
                );
                self.finalize(job_id, &url, CLIENT_REJECT_STATUS, &message)
                    .await?;
                info!("{}: rejected job {}: {}", self.name, job_id, reason);
                return Err(Error::Client {
                    status_code: CLIENT_REJECT_STATUS,
                    message,
                });
            }
            RoutingDecision::Daily => self.fetcher.fetch_daily(request).await,
            RoutingDecision::IntraDay => self.fetcher.fetch_intraday(request).await,
        };

        match fetched {
            Ok(bars) => {
                let bars_fetched = bars.len();
                // Bars are only persisted once the row records the success
                self.finalize(
                    job_id,
                    &url,
                    SUCCESS_STATUS,
                    &format!("fetched {} bars", bars_fetched),
                )
                .await?;
                debug!(
                    "{}: job {} fetched {} bars for {}",
                    self.name, job_id, bars_fetched, request.symbol
                );

                Ok(RetrievalOutcome {
                    job_id: job_id.clone(),
                    bars_fetched,
                    persistence: self.spawn_persistence(job_id, request, bars),
                })
            }
            Err(fetch_error) => {
                let error = Error::from(fetch_error);
                let status_code = error.status_code().unwrap_or(502);
                self.finalize(job_id, &url, status_code, &error.to_string())
                    .await?;
                info!(
                    "{}: job {} failed with {}: {}",
                    self.name, job_id, status_code, error
                );
                Err(error)
            }
        }
    }

    /// Apply the terminal ledger update.
    ///
    /// On failure the row stays `InFlight` and the error is returned as is.
    async fn finalize(
        &self,
        job_id: &JobId,
        url: &str,
        status_code: u16,
        message: &str,
    ) -> Result<()> {
        match self
            .ledger
            .finalize(job_id, &self.name, url, status_code, message)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(
                    "{}: could not finalize job {} with {}, row left unfinalized: {}",
                    self.name, job_id, status_code, e
                );
                Err(e)
            }
        }
    }

    /// Save `bars` without blocking the caller. Failures become warnings.
    fn spawn_persistence(
        &self,
        job_id: &JobId,
        request: &BarRequest,
        bars: Vec<StockBar>,
    ) -> JoinHandle<()> {
        let store = self.bar_store.clone();
        let warnings = self.warnings.clone();
        let provider = self.name.clone();
        let job_id = job_id.clone();
        let request = request.clone();

        tokio::spawn(async move {
            let bar_count = bars.len();
            match store
                .save(&request.symbol, &request.exchange, request.interval, bars)
                .await
            {
                Ok(written) => debug!(
                    "{}: persisted {} of {} bars for job {}",
                    provider, written, bar_count, job_id
                ),
                Err(e) => {
                    let warning = PersistenceWarning {
                        job_id,
                        provider,
                        symbol: request.symbol,
                        exchange: request.exchange,
                        interval: request.interval,
                        bar_count,
                        message: e.to_string(),
                    };
                    warn!("{}", warning);
                    if let Some(sender) = warnings {
                        // Receiver may have gone away
                        let _ = sender.send(warning);
                    }
                }
            }
        })
    }

    /// Health snapshot over the most recent `stats_window` ledger rows.
    pub fn get_stats(&self) -> Result<ProviderStats> {
        let entries = self.ledger.recent_for(&self.name, self.stats_window)?;
        Ok(ProviderStats::from_entries(
            &self.name,
            &self.api_key_identifier,
            self.config.clone(),
            &entries,
        ))
    }
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("name", &self.name)
            .field("fetcher", &self.fetcher.id())
            .field("capabilities", &self.capabilities)
            .field("api_key_identifier", &self.api_key_identifier)
            .field("stats_window", &self.stats_window)
            .finish()
    }
}
