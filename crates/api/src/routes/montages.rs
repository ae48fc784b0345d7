use axum::routing::{get, post};
use axum::Router;

use crate::handlers::montages;
use crate::state::AppState;

/// Routes mounted at `/montages`.
///
/// ```text
/// GET    /               -> list_montages
/// POST   /               -> create_montage
/// GET    /{id}           -> get_montage
/// DELETE /{id}           -> cancel_montage
/// POST   /{id}/cancel    -> cancel_montage
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(montages::list_montages).post(montages::create_montage))
        .route(
            "/{id}",
            get(montages::get_montage).delete(montages::cancel_montage),
        )
        .route("/{id}/cancel", post(montages::cancel_montage))
}
