//! Session middleware and the session-data endpoints.
//!
//! - `GET    /v1/session`             : redacted id + whether data exists
//! - `GET    /v1/session/values/:key` : read one value (404 when unset)
//! - `PUT    /v1/session/values/:key` : write one JSON value
//! - `DELETE /v1/session/values/:key` : remove one value
//! - `POST   /v1/session/logout`      : invalidate and clear the cookie

use axum::body::Body;
use axum::extract::{Extension, Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;

use hs_sessions::Session;

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Middleware
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Axum middleware that resolves the request's [`Session`] and exposes it as
/// an `Extension<Session>`.  Attach via `axum::middleware::from_fn_with_state`.
///
/// A request whose session cookie cannot be read is rejected with 400 rather
/// than silently given a new session.
pub async fn attach_session(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    let mut issued = HeaderMap::new();

    let session = match state.sessions.session(&parts, &mut issued) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, path = %parts.uri.path(), "unreadable session cookie");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    parts.extensions.insert(session);
    let mut response = next.run(Request::from_parts(parts, body)).await;
    merge_set_cookies(response.headers_mut(), &issued);
    response
}

/// Put the middleware's `Set-Cookie` headers ahead of the handler's own, so a
/// handler that clears the cookie (logout) wins over a freshly issued one.
fn merge_set_cookies(headers: &mut HeaderMap, issued: &HeaderMap) {
    if issued.is_empty() {
        return;
    }
    let from_handler: Vec<HeaderValue> = headers.get_all(SET_COOKIE).iter().cloned().collect();
    headers.remove(SET_COOKIE);
    for value in issued.get_all(SET_COOKIE) {
        headers.append(SET_COOKIE, value.clone());
    }
    for value in from_handler {
        headers.append(SET_COOKIE, value);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn describe(Extension(session): Extension<Session>) -> impl IntoResponse {
    Json(serde_json::json!({
        "id": session.id().redacted(),
        "exists": session.exists(),
    }))
}

pub async fn get_value(
    Extension(session): Extension<Session>,
    Path(key): Path<String>,
) -> Response {
    match session.get(&key) {
        Some(value) => Json(serde_json::json!({ "key": key, "value": value })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("key not set: {key}") })),
        )
            .into_response(),
    }
}

pub async fn put_value(
    Extension(session): Extension<Session>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> impl IntoResponse {
    session.set(&key, value.clone());
    Json(serde_json::json!({ "key": key, "value": value }))
}

pub async fn delete_value(
    Extension(session): Extension<Session>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let deleted = session.del(&key);
    Json(serde_json::json!({ "deleted": deleted }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    state.sessions.invalidate(&mut headers, &session);
    (headers, Json(serde_json::json!({ "invalidated": true })))
}
