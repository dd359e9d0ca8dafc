use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{ChannelAnalysis, ChannelId};

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub analysis: ChannelAnalysis,
}

/// Aggregates over stored videos only; an unknown channel yields an empty
/// analysis rather than a 404.
pub async fn get_channel(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<ChannelResponse>, ApiError> {
    let analysis = state
        .shared
        .channels
        .analyze(&ChannelId::new(channel_id))
        .await?;
    Ok(Json(ChannelResponse { analysis }))
}
