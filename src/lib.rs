pub mod alerting;
pub mod config;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod vault;

use std::sync::Arc;

use pipeline::worker::PipelineWorker;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub worker: Arc<PipelineWorker>,
    pub cron_secret: Option<String>,
}
