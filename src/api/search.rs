use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::domain::{SearchId, VideoId, VideoRecord};
use crate::services::{SearchOutcome, StreamItem};

use super::{ApiError, AppState};

const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub max_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    #[serde(default)]
    pub transcripts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub topics: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<VideoRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_ids: Vec<VideoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_id: Option<SearchId>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub offline: bool,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            results: outcome.results,
            missing_ids: outcome.missing_ids,
            search_id: outcome.search_id,
            offline: outcome.offline,
        }
    }
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let outcome = state
        .orchestrator()
        .search(&params.query, params.max_results)
        .await?;
    Ok(Json(outcome.into()))
}

/// NDJSON stream of results in completion order, terminated by a
/// `{"done": true}` line. Falls back to the batch body when streaming is
/// disabled or the client only accepts plain JSON.
pub async fn search_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let streaming_enabled = state.config().read().await.server.streaming_enabled;
    if !streaming_enabled || prefers_json(&headers) {
        let outcome = state
            .orchestrator()
            .search(&params.query, params.max_results)
            .await?;
        return Ok(Json(SearchResponse::from(outcome)).into_response());
    }

    let rx = state
        .orchestrator()
        .clone()
        .search_stream(&params.query, params.max_results)
        .await?;

    let lines = futures::stream::unfold(rx, |mut rx| async move {
        let item: StreamItem = rx.recv().await?;
        let line = serde_json::to_string(&item).map(|mut json| {
            json.push('\n');
            json
        });
        Some((line, rx))
    });

    Ok(([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response())
}

pub async fn rerun(
    State(state): State<Arc<AppState>>,
    Path(search_id): Path<i64>,
) -> Result<Json<SearchResponse>, ApiError> {
    let entry = state.history().get(SearchId::new(search_id)).await?;
    info!(event = "search_rerun", search_id, query = %entry.query, "Re-running recorded search");

    let outcome = state.orchestrator().search(&entry.query, None).await?;
    Ok(Json(outcome.into()))
}

/// Topics shared by the posted transcripts.
pub async fn topics(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TopicRequest>,
) -> Result<Json<TopicResponse>, ApiError> {
    let count = request.transcripts.len();
    let topics = state.orchestrator().extract_topics(request.transcripts).await?;
    info!(event = "topics_extracted", transcripts = count, topics = topics.len());
    Ok(Json(TopicResponse { topics }))
}

fn prefers_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json") && !accept.contains(NDJSON))
}
