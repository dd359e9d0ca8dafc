use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

mod channel;
mod error;
mod history;
mod observability;
mod search;
mod system;
mod trends;

pub use error::ApiError;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<crate::services::SearchOrchestrator> {
        &self.shared.orchestrator
    }

    #[must_use]
    pub fn history(&self) -> &Arc<crate::services::HistoryExporter> {
        &self.shared.history
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .route("/search", get(search::search))
        .route("/search/stream", get(search::search_stream))
        .route("/topics", post(search::topics))
        .route("/trends/{topic}", get(trends::get_trend))
        .route("/channel/{channel_id}", get(channel::get_channel))
        .route("/history", get(history::list_history))
        .route("/history/{search_id}/rerun", post(search::rerun))
        .route("/export/{search_id}", get(history::export))
        .route("/stats", get(system::get_stats))
        .route("/maintenance", post(system::run_maintenance))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}
