use std::sync::Arc;

use crate::alerting::DispatcherRegistry;
use crate::store::Store;

use super::error::PipelineError;
use super::types::UnifiedSnapshot;

/// Persists normalized snapshots and hands triggered alerts to the
/// dispatch layer. The store does the snapshot insert and alert
/// evaluation in one transaction; dispatch happens after commit in a
/// spawned task so a slow channel can never hold the transaction open.
pub struct MetricPersister {
    store: Arc<Store>,
    dispatchers: Arc<DispatcherRegistry>,
}

impl MetricPersister {
    pub fn new(store: Arc<Store>, dispatchers: Arc<DispatcherRegistry>) -> Self {
        Self { store, dispatchers }
    }

    pub async fn persist(
        &self,
        series_id: &str,
        snapshots: &[UnifiedSnapshot],
    ) -> Result<(), PipelineError> {
        let triggered = self
            .store
            .persist_snapshots(series_id, snapshots)
            .map_err(|e| PipelineError::Persistence {
                series_id: series_id.to_string(),
                source: e,
            })?;

        for t in triggered {
            let dispatchers = self.dispatchers.clone();
            let store = self.store.clone();
            tokio::spawn(async move {
                let delivered = dispatchers.dispatch_all(&t.alert, &t.history).await;
                if delivered > 0 {
                    if let Err(e) = store.mark_history_dispatched(&t.history.id) {
                        tracing::warn!(
                            "failed to mark history {} dispatched: {e}",
                            t.history.id
                        );
                    }
                }
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::AlertType;
    use crate::models::integration::Provider;
    use chrono::{TimeZone, Utc};

    fn seeded() -> (Arc<Store>, MetricPersister) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.create_workspace("ws1", "Acme").unwrap();
        store
            .create_integration("int1", "ws1", Provider::Stripe, "sandbox", "{}")
            .unwrap();
        store
            .create_series("ser1", "ws1", "int1", "stripe.mrr", "MRR", "{}")
            .unwrap();
        let persister = MetricPersister::new(store.clone(), Arc::new(DispatcherRegistry::none()));
        (store, persister)
    }

    fn snap(value: f64) -> UnifiedSnapshot {
        UnifiedSnapshot {
            metric_key: "stripe.mrr".into(),
            value,
            captured_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn persists_snapshots_and_history() {
        let (store, persister) = seeded();
        store
            .create_alert("al1", "ser1", AlertType::AboveThreshold, 100.0, true)
            .unwrap();
        persister.persist("ser1", &[snap(150.0)]).await.unwrap();
        assert_eq!(store.count_snapshots("ser1").unwrap(), 1);
        assert_eq!(store.list_alert_history("al1", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_series_is_a_persistence_error() {
        let (_store, persister) = seeded();
        let err = persister.persist("nope", &[snap(1.0)]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Persistence { .. }));
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let (store, persister) = seeded();
        persister.persist("ser1", &[]).await.unwrap();
        assert_eq!(store.count_snapshots("ser1").unwrap(), 0);
    }
}
