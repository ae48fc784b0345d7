//! Handlers for `/api/clips`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use clipcraftr_core::types::DbId;
use clipcraftr_pipeline::submission::{ClipSubmission, ListingQuery};
use serde_json::json;

use crate::error::AppResult;
use crate::handlers::RequestorQuery;
use crate::state::AppState;

/// POST /api/clips
///
/// Download, probe and store a clip, then queue its processing job.
/// Returns 201 with `{clip, job, position}`.
pub async fn submit_clip(
    State(state): State<AppState>,
    Json(input): Json<ClipSubmission>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.submissions.submit_clip(input).await?;

    tracing::info!(
        clip_id = outcome.clip.id,
        job_id = outcome.job.id,
        "Clip submitted",
    );

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/clips
///
/// Clips newest first. Optional `discordId`, `status`, `limit` and `offset`
/// query parameters; deleted clips appear only when asked for by status.
pub async fn list_clips(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> AppResult<impl IntoResponse> {
    let clips = state.submissions.list_clips(&query).await?;
    Ok(Json(json!({ "clips": clips })))
}

/// GET /api/clips/{id}
pub async fn get_clip(
    State(state): State<AppState>,
    Path(clip_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let clip = state.submissions.get_clip(clip_id).await?;
    Ok(Json(json!({ "clip": clip })))
}

/// DELETE /api/clips/{id}
///
/// Soft delete; the stored file is kept.
pub async fn delete_clip(
    State(state): State<AppState>,
    Path(clip_id): Path<DbId>,
    Query(requestor): Query<RequestorQuery>,
) -> AppResult<impl IntoResponse> {
    state
        .submissions
        .delete_clip(clip_id, requestor.requested_by.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Clip deleted",
        "id": clip_id,
    })))
}
