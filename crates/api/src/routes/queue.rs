use axum::routing::get;
use axum::Router;

use crate::handlers::queue;
use crate::state::AppState;

/// Queue and mission status routes, mounted at the `/api` root.
///
/// ```text
/// GET    /queue                 -> list_queue
/// POST   /queue                 -> enqueue
/// GET    /queue/{id}            -> get_job
/// DELETE /queue/{id}            -> remove_job
/// GET    /queue/{id}/position   -> get_position
/// GET    /mission-status        -> get_mission_status
/// POST   /mission-status        -> set_mission_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(queue::list_queue).post(queue::enqueue))
        .route("/queue/{id}", get(queue::get_job).delete(queue::remove_job))
        .route("/queue/{id}/position", get(queue::get_position))
        .route(
            "/mission-status",
            get(queue::get_mission_status).post(queue::set_mission_status),
        )
}
