use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{HistoryEntry, SearchId};
use crate::services::ExportFormat;

use super::{ApiError, AppState};

const DEFAULT_HISTORY_LIMIT: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 1000);
    let history = state.history().list(limit).await?;
    Ok(Json(HistoryResponse { history }))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    Path(search_id): Path<i64>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let report = state
        .history()
        .export(SearchId::new(search_id), params.format)
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", report.filename);
    Ok((
        [
            (header::CONTENT_TYPE, report.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.body,
    )
        .into_response())
}
