//! Handlers for `/api/montages`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use clipcraftr_core::types::DbId;
use clipcraftr_pipeline::submission::{ListingQuery, MontageRequest};
use serde_json::json;

use crate::error::AppResult;
use crate::handlers::RequestorQuery;
use crate::state::AppState;

/// POST /api/montages
///
/// Returns 201 with `{montage, job}`.
pub async fn create_montage(
    State(state): State<AppState>,
    Json(input): Json<MontageRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.submissions.create_montage(input).await?;

    tracing::info!(
        montage_id = outcome.montage.id,
        job_id = outcome.job.id,
        "Montage requested",
    );

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/montages
///
/// Montages newest first. Optional `discordId`, `status`, `limit` and
/// `offset` query parameters.
pub async fn list_montages(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> AppResult<impl IntoResponse> {
    let montages = state.submissions.list_montages(&query).await?;
    Ok(Json(json!({ "montages": montages })))
}

/// GET /api/montages/{id}
pub async fn get_montage(
    State(state): State<AppState>,
    Path(montage_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let montage = state.submissions.get_montage(montage_id).await?;
    Ok(Json(json!({ "montage": montage })))
}

/// POST /api/montages/{id}/cancel, also DELETE /api/montages/{id}
///
/// A montage is never removed; deleting it cancels it.
pub async fn cancel_montage(
    State(state): State<AppState>,
    Path(montage_id): Path<DbId>,
    Query(requestor): Query<RequestorQuery>,
) -> AppResult<impl IntoResponse> {
    let montage = state
        .submissions
        .cancel_montage(montage_id, requestor.requested_by.as_deref())
        .await?;
    Ok(Json(json!({ "montage": montage })))
}
