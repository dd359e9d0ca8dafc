use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::TrendPoint;

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub topic: String,
    pub trend_data: Vec<TrendPoint>,
}

pub async fn get_trend(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
) -> Result<Json<TrendResponse>, ApiError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ApiError::validation("Topic must not be empty"));
    }

    let trend_data = state.shared.trends.trend(topic).await?;
    Ok(Json(TrendResponse {
        topic: topic.to_string(),
        trend_data,
    }))
}
