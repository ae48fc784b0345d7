//! Handlers for `/api/queue` and `/api/mission-status`.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use clipcraftr_core::status::{JobType, MissionStatus};
use clipcraftr_core::types::DbId;
use clipcraftr_db::models::job::{Job, JobFilter};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::handlers::RequestorQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    #[serde(rename = "type", default = "default_job_type")]
    pub job_type: String,
    /// Missing payloads are rejected by payload validation, not by the
    /// extractor.
    #[serde(default)]
    pub payload: Value,
    pub user_id: Option<String>,
    pub guild_id: Option<String>,
}

fn default_job_type() -> String {
    JobType::Queue.as_str().to_string()
}

#[derive(Debug, Serialize)]
pub struct QueueListResponse {
    pub queue: Vec<Job>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub item: Job,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionStatusRequest {
    pub status: String,
    pub user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// GET /api/queue
///
/// Pending and processing jobs in queue order. Supports optional `userId`,
/// `type`, `limit` and `offset` query parameters.
pub async fn list_queue(
    State(state): State<AppState>,
    Query(filter): Query<JobFilter>,
) -> AppResult<Json<QueueListResponse>> {
    let queue = state.queue.list_queue(&filter).await?;
    Ok(Json(QueueListResponse { queue }))
}

/// POST /api/queue
pub async fn enqueue(
    State(state): State<AppState>,
    Json(input): Json<EnqueueRequest>,
) -> AppResult<impl IntoResponse> {
    let item = state
        .queue
        .enqueue(&input.job_type, input.payload, input.user_id, input.guild_id)
        .await?;

    Ok(Json(json!({
        "message": "Added to queue",
        "item": item,
    })))
}

/// GET /api/queue/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<Json<JobResponse>> {
    let item = state.queue.get_job(job_id).await?;
    Ok(Json(JobResponse { item }))
}

/// GET /api/queue/{id}/position
pub async fn get_position(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let position = state.queue.get_position(job_id).await?;
    Ok(Json(position))
}

/// DELETE /api/queue/{id}
///
/// Only pending jobs can be removed; anything else is a 409.
pub async fn remove_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Query(requestor): Query<RequestorQuery>,
) -> AppResult<impl IntoResponse> {
    state
        .queue
        .remove(job_id, requestor.requested_by.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Removed from queue",
        "id": job_id,
    })))
}

// ---------------------------------------------------------------------------
// Mission status
// ---------------------------------------------------------------------------

/// GET /api/mission-status
pub async fn get_mission_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.queue.get_mission_status().await;
    Json(json!({ "missionStatus": status }))
}

/// POST /api/mission-status
pub async fn set_mission_status(
    State(state): State<AppState>,
    Json(input): Json<MissionStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let status: MissionStatus = input.status.parse()?;
    state
        .queue
        .set_mission_status(status, input.user_id.as_deref())
        .await;

    Ok(Json(json!({
        "message": "Mission status updated",
        "missionStatus": status,
    })))
}
