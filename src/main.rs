use axum::{Router, routing::delete, routing::get, routing::post, routing::put};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pulse_api::AppState;
use pulse_api::alerting::DispatcherRegistry;
use pulse_api::config::PulseConfig;
use pulse_api::handlers;
use pulse_api::pipeline::registry::PipelineRegistry;
use pulse_api::pipeline::worker::{PipelineWorker, spawn_sync_engine};
use pulse_api::store::Store;
use pulse_api::vault::StoreVault;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pulse_api=debug,tower_http=debug")
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

    let worker = Arc::new(PipelineWorker::new(
        store.clone(),
        registry,
        dispatchers,
    ));

    // Background sync engine; interval 0 means cron-only operation.
    spawn_sync_engine(worker.clone(), cfg.sync.interval_secs);

    let cron_secret = std::env::var("PULSE_CRON_SECRET").ok();
    if cron_secret.is_none() {
        tracing::warn!("PULSE_CRON_SECRET not set; POST /api/v1/sync is disabled");
    }

    let state = AppState {
        store,
        worker,
        cron_secret,
    };

    let app = Router::new()
        // Workspaces
        .route(
            "/api/v1/workspaces",
            get(handlers::workspaces::list_workspaces)
                .post(handlers::workspaces::create_workspace),
        )
        .route(
            "/api/v1/workspaces/{id}",
            delete(handlers::workspaces::delete_workspace),
        )
        // Integrations
        .route(
            "/api/v1/integrations",
            get(handlers::integrations::list_integrations)
                .post(handlers::integrations::create_integration),
        )
        .route(
            "/api/v1/integrations/{id}",
            get(handlers::integrations::get_integration)
                .delete(handlers::integrations::delete_integration),
        )
        // Metric series
        .route("/api/v1/series", get(handlers::series::list_series))
        .route(
            "/api/v1/series/{id}/settings",
            put(handlers::series::update_series_settings),
        )
        .route(
            "/api/v1/series/{id}/snapshots",
            get(handlers::series::list_snapshots),
        )
        // Alert rules
        .route(
            "/api/v1/series/{id}/alerts",
            get(handlers::alerts::list_alerts).post(handlers::alerts::create_alert),
        )
        .route(
            "/api/v1/alerts/{id}",
            put(handlers::alerts::update_alert).delete(handlers::alerts::delete_alert),
        )
        .route(
            "/api/v1/alerts/{id}/history",
            get(handlers::alerts::alert_history),
        )
        // Sync triggers
        .route("/api/v1/sync", post(handlers::sync::cron_sync))
        .route("/api/v1/admin/sync", post(handlers::sync::force_sync))
        .route(
            "/api/v1/admin/seed-metrics",
            post(handlers::sync::seed_metrics),
        )
        // Health
        .route("/healthz", get(handlers::health::healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080u16);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("pulse-api listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
