use std::time::Duration;

use axum::{
    BoxError, Router,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use tower::{ServiceBuilder, timeout::TimeoutLayer, timeout::error::Elapsed};

use crate::error::ApiError;
use crate::state::AppState;
use crate::{auth, comments, health, posts, users};

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Every route, with state attached. CORS and tracing are added by the
/// binary, along with [`with_request_timeout`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/authentication/user", post(auth::register))
        .route("/authentication/token", post(auth::create_token))
        .route("/users/activate/{token}", put(users::activate_user))
        .route("/users/feed", get(users::feed))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/follow", put(users::follow_user))
        .route("/users/{id}/unfollow", put(users::unfollow_user))
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/comments/post/{id}", post(comments::create_comment))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Bound every request by `timeout`. Expiry answers with the usual JSON
/// error body instead of an empty 408.
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_timeout))
            .layer(TimeoutLayer::new(timeout)),
    )
}

async fn handle_timeout(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::RequestTimeout
    } else {
        ApiError::Internal(anyhow::anyhow!(err))
    }
}
