//! Status codes and bodies produced by `AppError`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use clipcraftr_api::error::AppError;
use clipcraftr_core::error::CoreError;
use clipcraftr_db::StoreError;
use clipcraftr_pipeline::processor::ProcessingError;
use clipcraftr_pipeline::PipelineError;
use http_body_util::BodyExt;
use serde_json::Value;

async fn error_to_response(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ---------------------------------------------------------------------------
// Test: CoreError variants map to their HTTP statuses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_maps_to_404() {
    let (status, json) = error_to_response(AppError::Core(CoreError::NotFound {
        entity: "Job",
        id: 42,
    }))
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Job with id 42 not found");
}

#[tokio::test]
async fn validation_maps_to_400() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Validation("bad payload".into()))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "bad payload");
}

#[tokio::test]
async fn conflict_maps_to_409() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Conflict("Queue limit reached".into()))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn internal_hides_details() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Internal("secret detail".into()))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Test: store and processing errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_store_write_uses_domain_status() {
    let err = StoreError::Rejected(CoreError::Conflict("Duplicate clip".into()));
    let (status, json) = error_to_response(AppError::Store(err)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Duplicate clip");
}

#[tokio::test]
async fn database_failure_is_500() {
    let err = StoreError::Database(sqlx::Error::PoolTimedOut);
    let (status, json) = error_to_response(AppError::Store(err)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn processing_failure_is_422() {
    let err = PipelineError::from(ProcessingError::Download("connection reset".into()));
    let (status, json) = error_to_response(AppError::from(err)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "PROCESSING_ERROR");
    assert_eq!(json["error"], "Download failed: connection reset");
}

#[tokio::test]
async fn bad_request_is_400() {
    let (status, json) = error_to_response(AppError::BadRequest("nope".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}
