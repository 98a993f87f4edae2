use std::sync::Arc;

use serde::Serialize;

use crate::alerting::DispatcherRegistry;
use crate::store::Store;

use super::error::PipelineError;
use super::persister::MetricPersister;
use super::registry::PipelineRegistry;

/// Upper bound on concurrently running series pipelines. Caps peak
/// outbound API calls and held database work per batch.
const BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// Drives one full sync pass: discover series of active integrations,
/// then fetch → normalize → persist each one in bounded concurrent
/// batches. A failing series never aborts its siblings.
pub struct PipelineWorker {
    store: Arc<Store>,
    registry: Arc<PipelineRegistry>,
    persister: MetricPersister,
}

impl PipelineWorker {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<PipelineRegistry>,
        dispatchers: Arc<DispatcherRegistry>,
    ) -> Self {
        let persister = MetricPersister::new(store.clone(), dispatchers);
        Self {
            store,
            registry,
            persister,
        }
    }

    /// One sync pass. Only the discovery query can fail the run as a
    /// whole; everything after is contained per series.
    pub async fn run_sync(&self) -> anyhow::Result<SyncSummary> {
        tracing::info!("pipeline: starting sync");
        let series_ids = self.store.list_active_series_ids()?;
        tracing::info!("pipeline: found {} series to process", series_ids.len());

        let batches = series_ids.len().div_ceil(BATCH_SIZE);
        let mut success = 0;
        let mut failed = 0;

        for (n, batch) in series_ids.chunks(BATCH_SIZE).enumerate() {
            tracing::debug!("pipeline: processing batch {}/{batches}", n + 1);
            let outcomes =
                futures_util::future::join_all(batch.iter().map(|id| self.process_series(id)))
                    .await;
            for (series_id, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(count) => {
                        success += 1;
                        tracing::debug!("pipeline: series {series_id}: {count} snapshots");
                    }
                    Err(e) if e.is_configuration() => {
                        // Deployment defect, not an upstream outage.
                        failed += 1;
                        tracing::error!("pipeline: series {series_id}: {e}");
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::warn!("pipeline: series {series_id}: {e}");
                    }
                }
            }
        }

        let summary = SyncSummary {
            total: series_ids.len(),
            success,
            failed,
        };
        tracing::info!(
            "pipeline: sync complete (total={} success={} failed={})",
            summary.total,
            summary.success,
            summary.failed
        );
        Ok(summary)
    }

    /// One series pipeline. Re-reads the series and its integration
    /// fresh; a long run must not act on stale rows from discovery.
    async fn process_series(&self, series_id: &str) -> Result<usize, PipelineError> {
        let (series, integration) = self
            .store
            .get_series_with_integration(series_id)
            .map_err(|e| PipelineError::Persistence {
                series_id: series_id.to_string(),
                source: e,
            })?
            .ok_or_else(|| PipelineError::Persistence {
                series_id: series_id.to_string(),
                source: anyhow::anyhow!("series disappeared mid-run"),
            })?;

        let fetcher = self.registry.fetcher(integration.provider)?;
        let normalizer = self.registry.normalizer(integration.provider)?;

        let raw = fetcher
            .fetch(&integration.id, &series.metric_key, &series.settings)
            .await?;
        let snapshots = normalizer.normalize(&raw, &series.metric_key);
        self.persister.persist(&series.id, &snapshots).await?;
        Ok(snapshots.len())
    }
}

/// Background engine: a sync pass every `interval_secs`. 0 disables it.
pub fn spawn_sync_engine(worker: Arc<PipelineWorker>, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::info!("sync engine disabled; relying on external cron");
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match worker.run_sync().await {
                Ok(summary) => tracing::info!(
                    "sync engine: pass complete (total={} success={} failed={})",
                    summary.total,
                    summary.success,
                    summary.failed
                ),
                Err(e) => tracing::error!("sync engine error: {e}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::integration::Provider;
    use crate::pipeline::error::FetchError;
    use crate::pipeline::normalizer::DefaultNormalizer;
    use crate::pipeline::types::{MetricFetcher, RawMetric};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds for every key except those containing "fail", while
    /// tracking how many fetches run at once.
    struct CountingFetcher {
        current: AtomicUsize,
        max_seen: AtomicUsize,
        drained_to_zero: AtomicUsize,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
                drained_to_zero: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetricFetcher for CountingFetcher {
        async fn fetch(
            &self,
            _integration_id: &str,
            metric_key: &str,
            _settings: &str,
        ) -> Result<RawMetric, FetchError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            if self.current.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.drained_to_zero.fetch_add(1, Ordering::SeqCst);
            }
            if metric_key.contains("fail") {
                return Err(FetchError::UnsupportedMetricKey(metric_key.to_string()));
            }
            Ok(RawMetric {
                metric: metric_key.to_string(),
                value: Some(1.0),
                count: None,
                timestamp: chrono::Utc::now(),
                meta: None,
            })
        }
    }

    fn seeded_store(series_count: usize) -> Arc<Store> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.create_workspace("ws1", "Acme").unwrap();
        store
            .create_integration("int1", "ws1", Provider::Sentry, "sandbox", "{}")
            .unwrap();
        for i in 0..series_count {
            store
                .create_series(
                    &format!("ser{i}"),
                    "ws1",
                    "int1",
                    &format!("sentry.metric_{i}"),
                    "Metric",
                    "{}",
                )
                .unwrap();
        }
        store
    }

    fn worker_with(store: Arc<Store>, fetcher: Arc<CountingFetcher>) -> PipelineWorker {
        let registry = PipelineRegistry::empty().register(
            Provider::Sentry,
            fetcher,
            Arc::new(DefaultNormalizer),
        );
        PipelineWorker::new(store, Arc::new(registry), Arc::new(DispatcherRegistry::none()))
    }

    #[tokio::test]
    async fn one_failing_series_never_aborts_the_rest() {
        let store = seeded_store(3);
        store
            .create_series("serx", "ws1", "int1", "sentry.always_fail", "Broken", "{}")
            .unwrap();
        let worker = worker_with(store.clone(), Arc::new(CountingFetcher::new()));

        let summary = worker.run_sync().await.unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.success, 3);
        assert_eq!(summary.failed, 1);
        // Healthy siblings still persisted.
        assert_eq!(store.count_snapshots("ser0").unwrap(), 1);
        assert_eq!(store.count_snapshots("serx").unwrap(), 0);
    }

    #[tokio::test]
    async fn batches_cap_concurrency_at_twenty() {
        let store = seeded_store(45);
        let fetcher = Arc::new(CountingFetcher::new());
        let worker = worker_with(store, fetcher.clone());

        let summary = worker.run_sync().await.unwrap();
        assert_eq!(summary.total, 45);
        assert_eq!(summary.success, 45);

        let max = fetcher.max_seen.load(Ordering::SeqCst);
        assert!(max <= 20, "ran {max} series concurrently");
        assert!(max > 1, "batch never overlapped fetches");
        // 45 series settle as three batches: 20, 20, 5.
        assert_eq!(fetcher.drained_to_zero.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn missing_registry_entry_counts_as_failed() {
        let store = seeded_store(2);
        let registry = PipelineRegistry::empty();
        let worker = PipelineWorker::new(
            store,
            Arc::new(registry),
            Arc::new(DispatcherRegistry::none()),
        );
        let summary = worker.run_sync().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn inactive_integrations_are_not_synced() {
        let store = seeded_store(2);
        store.create_workspace("ws2", "Beta").unwrap();
        store
            .create_integration("int2", "ws2", Provider::Sentry, "sandbox", "{}")
            .unwrap();
        store
            .create_series("serd", "ws2", "int2", "sentry.metric_d", "Metric", "{}")
            .unwrap();
        store
            .set_integration_status("int2", crate::models::integration::IntegrationStatus::Error)
            .unwrap();

        let worker = worker_with(store, Arc::new(CountingFetcher::new()));
        let summary = worker.run_sync().await.unwrap();
        assert_eq!(summary.total, 2);
    }

    #[tokio::test]
    async fn repeated_runs_append_snapshots() {
        let store = seeded_store(1);
        let worker = worker_with(store.clone(), Arc::new(CountingFetcher::new()));
        worker.run_sync().await.unwrap();
        worker.run_sync().await.unwrap();
        assert_eq!(store.count_snapshots("ser0").unwrap(), 2);
    }
}
