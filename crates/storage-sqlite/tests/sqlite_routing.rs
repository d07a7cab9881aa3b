//! Routing against the SQLite ledger and bar store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use stockproxy_core::bars::BarStore;
use stockproxy_core::jobs::{JobLedger, JobState, RetrievalJobRequest};
use stockproxy_core::proxy::{ProviderAdapter, ProxyRouter};
use stockproxy_market_data::{
    BarFetcher, BarRequest, CapabilityDescriptor, FetchError, Interval, StockBar,
};
use stockproxy_storage_sqlite::{
    create_pool, run_migrations, spawn_writer, SqliteBarStore, SqliteJobLedger,
};
use tempfile::{tempdir, TempDir};

struct FixedFetcher {
    bars: usize,
}

#[async_trait]
impl BarFetcher for FixedFetcher {
    fn id(&self) -> &'static str {
        "FIXED"
    }

    fn default_capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new(["NASDAQ"], [Interval::FiveMinutes], true)
    }

    fn request_url(&self, request: &BarRequest) -> String {
        format!(
            "https://fixed.test/bars?symbol={}&interval={}&token=***",
            request.symbol, request.interval
        )
    }

    async fn ping(&self) -> Result<(), FetchError> {
        Ok(())
    }

    async fn fetch_daily(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError> {
        Ok((0..self.bars)
            .map(|i| {
                request.bar(
                    Utc.with_ymd_and_hms(2024, 4, 1 + i as u32, 0, 0, 0).unwrap(),
                    dec!(50),
                    dec!(51),
                    dec!(49.5),
                    dec!(50.25),
                    dec!(1200),
                )
            })
            .collect())
    }

    async fn fetch_intraday(&self, request: &BarRequest) -> Result<Vec<StockBar>, FetchError> {
        Err(FetchError::SymbolNotFound(request.symbol.clone()))
    }
}

struct Harness {
    _dir: TempDir,
    ledger: Arc<SqliteJobLedger>,
    store: Arc<SqliteBarStore>,
    router: ProxyRouter,
}

fn harness(bars: usize) -> Harness {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("proxy.db");
    let pool = create_pool(db_path.to_str().unwrap()).unwrap();
    run_migrations(&pool).unwrap();
    let writer = spawn_writer((*pool).clone()).unwrap();

    let ledger = Arc::new(SqliteJobLedger::new(pool.clone(), writer.clone()));
    let store = Arc::new(SqliteBarStore::new(pool, writer));
    let mut router = ProxyRouter::new(ledger.clone());
    router
        .register(ProviderAdapter::new(
            "fixed",
            Arc::new(FixedFetcher { bars }),
            ledger.clone(),
            store.clone(),
        ))
        .unwrap();

    Harness {
        _dir: dir,
        ledger,
        store,
        router,
    }
}

#[tokio::test]
async fn test_successful_dispatch_is_durable() {
    let h = harness(3);

    let result = h
        .router
        .dispatch(
            "fixed",
            RetrievalJobRequest::new("msft", "nasdaq", Interval::OneDay),
        )
        .await
        .unwrap();
    assert_eq!(result.state, JobState::Succeeded);
    assert_eq!(result.status_code, Some(200));

    let row = h.ledger.find(&result.job_id).unwrap().unwrap();
    assert_eq!(row.state, JobState::Succeeded);
    assert_eq!(row.url, "https://fixed.test/bars?symbol=MSFT&interval=1day&token=***");

    let mut stored = Vec::new();
    for _ in 0..100 {
        stored = h.store.load("MSFT", "NASDAQ", Interval::OneDay).unwrap();
        if stored.len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].close, dec!(50.25));
}

#[tokio::test]
async fn test_failures_are_recorded_with_their_class() {
    let h = harness(3);

    let rejected = h
        .router
        .dispatch(
            "fixed",
            RetrievalJobRequest::new("VOD", "LSE", Interval::OneDay),
        )
        .await
        .unwrap();
    assert_eq!(rejected.state, JobState::ClientFailed);
    assert_eq!(rejected.status_code, Some(400));

    let missing = h
        .router
        .dispatch(
            "fixed",
            RetrievalJobRequest::new("ZZZZ", "NASDAQ", Interval::FiveMinutes),
        )
        .await
        .unwrap();
    assert_eq!(missing.state, JobState::ClientFailed);
    assert_eq!(missing.status_code, Some(404));

    let recent = h.ledger.recent_for("fixed", 10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, missing.job_id);
    assert!(recent.iter().all(|row| row.state.is_terminal()));
}

#[tokio::test]
async fn test_persistence_handle_completes_before_load() {
    let h = harness(2);
    let adapter = h.router.adapter("fixed").unwrap();
    let request = RetrievalJobRequest::new("AAPL", "NASDAQ", Interval::OneDay).bar_request();
    let job_id = h
        .ledger
        .create("fixed", &adapter.request_url(&request))
        .await
        .unwrap();

    let outcome = adapter.retrieve(&job_id, &request).await.unwrap();
    assert_eq!(outcome.bars_fetched, 2);
    outcome.persistence.await.unwrap();

    assert_eq!(h.store.load("AAPL", "NASDAQ", Interval::OneDay).unwrap().len(), 2);
    let stats = h.router.get_stats("fixed").unwrap();
    assert_eq!(stats.sample_size, 1);
}
