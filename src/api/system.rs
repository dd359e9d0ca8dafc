use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{MaintenanceReport, VideoStore};

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub videos: u64,
    pub searches: u64,
    pub cached_responses: u64,
    pub uptime_seconds: u64,
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let counts = state.shared.store.counts().await?;
    Ok(Json(StatsResponse {
        videos: counts.videos,
        searches: counts.searches,
        cached_responses: state.shared.cache.len().await,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    }))
}

pub async fn run_maintenance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MaintenanceReport>, ApiError> {
    let report = state.shared.maintenance.run_now().await?;
    Ok(Json(report))
}
