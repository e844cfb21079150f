pub mod sessions;

use axum::middleware;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no session) and **sessioned** (the
/// session middleware resolves or issues the session cookie first).
///
/// `state` is needed to wire up the session middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let sessioned = Router::new()
        .route("/v1/session", get(sessions::describe))
        .route(
            "/v1/session/values/:key",
            get(sessions::get_value)
                .put(sessions::put_value)
                .delete(sessions::delete_value),
        )
        .route("/v1/session/logout", post(sessions::logout))
        .route_layer(middleware::from_fn_with_state(
            state,
            sessions::attach_session,
        ));

    public.merge(sessioned)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
