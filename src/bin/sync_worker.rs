use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pulse_api::alerting::DispatcherRegistry;
use pulse_api::config::PulseConfig;
use pulse_api::pipeline::registry::PipelineRegistry;
use pulse_api::pipeline::worker::PipelineWorker;
use pulse_api::store::Store;
use pulse_api::vault::StoreVault;

/// One-shot sync pass over every active series. Meant for external
/// schedulers (cron, systemd timers) running against the same database
/// file as the API server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pulse_api=debug")
        }))
        .init();

    let config_path =
        std::env::var("PULSE_CONFIG").unwrap_or_else(|_| "./pulse.toml".to_string());
    let cfg = PulseConfig::load(&config_path)?;

    let db_path = std::env::var("PULSE_DB").unwrap_or_else(|_| "./pulse.db".to_string());
    let store = Arc::new(Store::open(&db_path)?);
    tracing::info!("store opened at {db_path}");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.sync.http_timeout_secs))
        .build()?;

    let vault = Arc::new(StoreVault::new(store.clone()));
    let registry = Arc::new(PipelineRegistry::standard(vault, http.clone()));
    let dispatchers = Arc::new(DispatcherRegistry::from_config(&cfg.alerting, http));
    let worker = PipelineWorker::new(store, registry, dispatchers);

    tracing::info!("pulse-sync-worker starting");
    let summary = worker.run_sync().await?;
    tracing::info!(
        total = summary.total,
        success = summary.success,
        failed = summary.failed,
        "pulse-sync-worker finished"
    );

    Ok(())
}
