use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ridelink::{app, state::AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Builds the full router against fresh in-memory state.
pub fn create_test_app() -> (Router, AppState) {
    let state = AppState::fake();
    (app::build_app(state.clone()), state)
}

/// Drives one request through the router and decodes the JSON body.
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Registers a user and returns the auth response body.
#[allow(dead_code)]
pub async fn register(app: &Router, name: &str, email: &str, role: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": name,
            "email": email,
            "password": "correct-horse-battery",
            "role": role,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body
}

#[allow(dead_code)]
pub fn access_token(auth_body: &Value) -> String {
    auth_body["accessToken"]
        .as_str()
        .expect("accessToken in auth response")
        .to_string()
}
