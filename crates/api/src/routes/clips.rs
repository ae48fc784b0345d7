use axum::routing::get;
use axum::Router;

use crate::handlers::clips;
use crate::state::AppState;

/// Routes mounted at `/clips`.
///
/// ```text
/// GET    /        -> list_clips
/// POST   /        -> submit_clip
/// GET    /{id}    -> get_clip
/// DELETE /{id}    -> delete_clip
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(clips::list_clips).post(clips::submit_clip))
        .route("/{id}", get(clips::get_clip).delete(clips::delete_clip))
}
