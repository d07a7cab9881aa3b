use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, error, info, warn};
use stockproxy_market_data::HealthSnapshot;

use crate::errors::{Error, Result};
use crate::health::ProviderStats;
use crate::jobs::{JobId, JobLedger, RetrievalJobRequest, RetrievalJobResult};

use super::adapter::ProviderAdapter;

/// Registry of provider adapters keyed by name, and the dispatch entry point.
pub struct ProxyRouter {
    ledger: Arc<dyn JobLedger>,
    adapters: BTreeMap<String, Arc<ProviderAdapter>>,
}

impl ProxyRouter {
    pub fn new(ledger: Arc<dyn JobLedger>) -> Self {
        Self {
            ledger,
            adapters: BTreeMap::new(),
        }
    }

    /// Register an adapter under its name. Names must be unique.
    pub fn register(&mut self, adapter: ProviderAdapter) -> Result<()> {
        let name = adapter.name().to_string();
        if self.adapters.contains_key(&name) {
            return Err(Error::InvalidConfigValue(format!(
                "provider '{}' is already registered",
                name
            )));
        }
        info!("Registered provider '{}'", name);
        self.adapters.insert(name, Arc::new(adapter));
        Ok(())
    }

    /// Registered provider names, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn adapter(&self, provider_name: &str) -> Result<Arc<ProviderAdapter>> {
        self.adapters
            .get(provider_name)
            .cloned()
            .ok_or_else(|| Error::ProviderNotRegistered(provider_name.to_string()))
    }

    /// Route `request` to the named provider and return the finalized ledger
    /// row as the result.
    ///
    /// Client and provider failures come back as `Ok` results in a failed
    /// state (see [`RetrievalJobResult::error_kind`]). `Err` is reserved for
    /// unregistered providers, ledger inconsistencies and storage errors.
    pub async fn dispatch(
        &self,
        provider_name: &str,
        request: RetrievalJobRequest,
    ) -> Result<RetrievalJobResult> {
        let adapter = self.adapter(provider_name)?;
        let bar_request = request.bar_request();

        let job_id = match request.job_id {
            Some(job_id) => {
                self.verify_precreated(&job_id, adapter.name())?;
                job_id
            }
            None => {
                self.ledger
                    .create(adapter.name(), &adapter.request_url(&bar_request))
                    .await?
            }
        };

        debug!(
            "Dispatching job {} to '{}' for {}:{} at {}",
            job_id, provider_name, bar_request.exchange, bar_request.symbol, bar_request.interval
        );

        match adapter.retrieve(&job_id, &bar_request).await {
            // Persistence runs detached from the caller
            Ok(_outcome) => {}
            Err(e) if e.kind().is_some() => {
                debug!("Job {} finished with a recorded failure: {}", job_id, e);
            }
            Err(e) => {
                error!("Job {} aborted: {}", job_id, e);
                return Err(e);
            }
        }

        let row = self
            .ledger
            .find(&job_id)?
            .ok_or_else(|| Error::ledger(&job_id, "row missing after retrieval"))?;

        if !row.state.is_terminal() {
            error!("Job {} read back in non-terminal state {}", job_id, row.state);
            return Err(Error::ledger(
                &job_id,
                format!("row not finalized (state {})", row.state),
            ));
        }

        Ok(row.into())
    }

    fn verify_precreated(&self, job_id: &JobId, provider_name: &str) -> Result<()> {
        let row = self
            .ledger
            .find(job_id)?
            .ok_or_else(|| Error::ledger(job_id, "referenced job not found"))?;

        if row.provider_name != provider_name {
            return Err(Error::ledger(
                job_id,
                format!(
                    "job was created for '{}', dispatched to '{}'",
                    row.provider_name, provider_name
                ),
            ));
        }
        Ok(())
    }

    pub fn get_stats(&self, provider_name: &str) -> Result<ProviderStats> {
        self.adapter(provider_name)?.get_stats()
    }

    /// Stats for every registered provider, in name order.
    pub fn all_stats(&self) -> Result<Vec<ProviderStats>> {
        self.adapters.values().map(|a| a.get_stats()).collect()
    }

    /// Ping every provider concurrently.
    pub async fn ping_all(&self) -> Vec<HealthSnapshot> {
        let snapshots = join_all(self.adapters.values().map(|a| a.ping_health())).await;

        let unreachable = snapshots.iter().filter(|s| !s.reachable).count();
        if unreachable > 0 {
            warn!(
                "{} of {} providers unreachable",
                unreachable,
                snapshots.len()
            );
        }
        snapshots
    }

    /// Names of providers whose capabilities admit `request`, sorted.
    ///
    /// Lets a caller that saw a provider failure re-dispatch elsewhere.
    pub fn admissible_providers(&self, request: &RetrievalJobRequest) -> Vec<String> {
        let bar_request = request.bar_request();
        self.adapters
            .values()
            .filter(|a| a.capabilities().is_admissible(&bar_request))
            .map(|a| a.name().to_string())
            .collect()
    }
}
