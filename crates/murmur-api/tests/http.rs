use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    routing::get,
};
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use murmur_api::{AppStateInner, AuthConfig, RequestValidator, router, with_request_timeout};
use murmur_db::Storage;

fn app() -> Router {
    router(Arc::new(AppStateInner {
        storage: Storage::memory(),
        validator: RequestValidator::default(),
        auth: AuthConfig {
            secret: "integration-test-secret".into(),
            issuer: "murmur".into(),
            audience: "murmur".into(),
            ttl: Duration::hours(1),
        },
        invitation_ttl: Duration::hours(72),
        env: "test".into(),
    }))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Register, activate and log in. Returns the user id and a JWT.
async fn signup(app: &Router, name: &str) -> (i64, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/authentication/user",
        None,
        Some(json!({
            "username": name,
            "email": format!("{name}@example.com"),
            "password": "correct horse battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_i64().unwrap();
    let invitation = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["is_active"], false);

    let (status, body) = call(
        app,
        Method::PUT,
        &format!("/users/activate/{invitation}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": null }));

    let (status, body) = call(
        app,
        Method::POST,
        "/authentication/token",
        None,
        Some(json!({ "email": format!("{name}@example.com"), "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (id, body["data"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn health_reports_env() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["env"], "test");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = app();
    for uri in ["/users/feed", "/posts/1", "/users/1"] {
        let (status, body) = call(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = call(&app, Method::GET, uri, Some("not.a.jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = app();
    signup(&app, "alice").await;

    let (s1, b1) = call(
        &app,
        Method::POST,
        "/authentication/token",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong password" })),
    )
    .await;
    let (s2, b2) = call(
        &app,
        Method::POST,
        "/authentication/token",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "wrong password" })),
    )
    .await;

    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(b1, b2);
}

#[tokio::test]
async fn registration_validation_and_duplicates() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/authentication/user",
        None,
        Some(json!({ "username": "bob", "email": "bob", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("email") && message.contains("password"));

    let (status, _) = call(
        &app,
        Method::POST,
        "/authentication/user",
        None,
        Some(json!({ "username": "bob", "email": "bob@example.com", "password": "long enough", "admin": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    signup(&app, "bob").await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/authentication/user",
        None,
        Some(json!({ "username": "bobby", "email": "bob@example.com", "password": "long enough" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "a user with that email already exists");

    let (status, _) = call(&app, Method::PUT, "/users/activate/unknown-token", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_lifecycle_with_ownership_and_versions() {
    let app = app();
    let (_, owner) = signup(&app, "carol").await;
    let (_, other) = signup(&app, "dan").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/posts",
        Some(&owner),
        Some(json!({ "title": "hello", "content": "world", "tags": ["t1", "t2"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["tags"], json!(["t1", "t2"]));
    assert_eq!(body["data"]["version"], 0);
    let id = body["data"]["id"].as_i64().unwrap();
    let uri = format!("/posts/{id}");

    let (status, _) = call(&app, Method::PATCH, &uri, Some(&other), Some(json!({ "title": "mine" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::DELETE, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "title": "edited", "version": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "edited");
    assert_eq!(body["data"]["content"], "world");
    assert_eq!(body["data"]["version"], 1);

    let (status, _) = call(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "title": "stale", "version": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/comments/post/{id}"),
        Some(&other),
        Some(json!({ "content": "nice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["username"], "dan");

    let (status, body) = call(&app, Method::GET, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "edited");
    assert_eq!(body["data"]["comments"][0]["content"], "nice");

    let (status, body) = call(&app, Method::DELETE, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": null }));

    let (status, _) = call(&app, Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::GET, "/posts/abc", Some(&owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn follow_and_feed() {
    let app = app();
    let (me_id, me) = signup(&app, "erin").await;
    let (friend_id, friend) = signup(&app, "frank").await;

    call(
        &app,
        Method::POST,
        "/posts",
        Some(&friend),
        Some(json!({ "title": "from frank", "content": "hi", "tags": ["news"] })),
    )
    .await;

    let (status, body) = call(&app, Method::GET, "/users/feed", Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, _) = call(&app, Method::PUT, &format!("/users/{me_id}/follow"), Some(&me), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let follow = format!("/users/{friend_id}/follow");
    let (status, _) = call(&app, Method::PUT, &follow, Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::PUT, &follow, Some(&me), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, Method::GET, "/users/feed?tags=news&limit=5", Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["title"], "from frank");
    assert_eq!(body["data"][0]["username"], "frank");
    assert_eq!(body["data"][0]["comments_count"], 0);

    let (status, _) = call(&app, Method::GET, "/users/feed?limit=500", Some(&me), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unfollow = format!("/users/{friend_id}/unfollow");
    for _ in 0..2 {
        let (status, _) = call(&app, Method::PUT, &unfollow, Some(&me), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = call(&app, Method::GET, "/users/feed", Some(&me), None).await;
    assert_eq!(body["data"], json!([]));

    let (status, body) = call(&app, Method::GET, &format!("/users/{friend_id}"), Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "frank");
    assert!(body["data"].get("password_hash").is_none());

    let (status, _) = call(&app, Method::GET, "/users/9999", Some(&me), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn slow_request_times_out_with_json_error() {
    let slow = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            "late"
        }),
    );
    let app = with_request_timeout(slow, std::time::Duration::from_millis(20));

    let (status, body) = call(&app, Method::GET, "/slow", None, None).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["error"], "the request took too long to process");
}
