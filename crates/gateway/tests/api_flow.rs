//! Session middleware + endpoints, driven through the router in-process.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use hs_domain::config::Config;
use hs_gateway::{api, bootstrap};
use hs_sessions::SetCookie;

fn app() -> Router {
    let mut config = Config::default();
    config.sessions.key_env = "HS_GATEWAY_TEST_KEY_UNSET".into();
    let state = bootstrap::build_app_state(Arc::new(config)).unwrap();
    api::router(state.clone()).with_state(state)
}

fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn set_cookies(response: &axum::response::Response) -> Vec<SetCookie> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| SetCookie::parse(v.to_str().unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn health_does_not_touch_sessions() {
    let response = app().oneshot(request("GET", "/health", None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn first_visit_issues_cookie() {
    let response = app()
        .oneshot(request("GET", "/v1/session", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "hs_session");
    assert!(cookies[0].http_only);
    assert!(cookies[0].secure);
    assert_eq!(cookies[0].max_age, Some(1800));

    let body = json_body(response).await;
    assert_eq!(body["exists"], true);
}

#[tokio::test]
async fn values_persist_across_requests() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request("PUT", "/v1/session/values/theme", None, Some(json!("dark"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = &set_cookies(&response)[0];
    let cookie = format!("hs_session={}", cookie.value);

    let response = app
        .clone()
        .oneshot(request("GET", "/v1/session/values/theme", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(json_body(response).await["value"], "dark");

    let response = app
        .clone()
        .oneshot(request("DELETE", "/v1/session/values/theme", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["deleted"], true);

    let response = app
        .oneshot(request("GET", "/v1/session/values/theme", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_clears_cookie_and_data() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request("PUT", "/v1/session/values/user", None, Some(json!("alice"))))
        .await
        .unwrap();
    let cookie = format!("hs_session={}", set_cookies(&response)[0].value);

    let response = app
        .clone()
        .oneshot(request("POST", "/v1/session/logout", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].is_removal());

    let response = app
        .oneshot(request("GET", "/v1/session/values/user", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_on_first_visit_ends_with_removal() {
    let response = app()
        .oneshot(request("POST", "/v1/session/logout", None, None))
        .await
        .unwrap();
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(!cookies[0].is_removal());
    assert!(cookies[1].is_removal());
}

#[tokio::test]
async fn unreadable_cookie_is_rejected() {
    let response = app()
        .oneshot(request("GET", "/v1/session", Some("hs_session=%FF%FE"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert!(json_body(response).await["error"].is_string());
}
