pub mod clips;
pub mod health;
pub mod montages;
pub mod queue;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /queue                       list, enqueue
/// /queue/{id}                  get, remove
/// /queue/{id}/position         queue position
/// /mission-status              get, set
///
/// /clips                       submit
/// /clips/{id}                  get, soft delete
///
/// /montages                    create
/// /montages/{id}               get
/// /montages/{id}/cancel        cancel (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(queue::router())
        .nest("/clips", clips::router())
        .nest("/montages", montages::router())
}
