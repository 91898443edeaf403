use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use murmur_db::StoreError;
use murmur_types::api::Envelope;

use crate::error::ApiError;
use crate::extract::{FeedQuery, PathUser};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn get_user(_: AuthUser, PathUser(user): PathUser) -> impl IntoResponse {
    Json(Envelope { data: user })
}

/// The caller starts following the user in the path.
pub async fn follow_user(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    PathUser(target): PathUser,
) -> Result<impl IntoResponse, ApiError> {
    if me.id == target.id {
        return Err(ApiError::Validation("you cannot follow yourself".into()));
    }

    state
        .storage
        .followers
        .follow(me.id, target.id)
        .await
        .map_err(|e| match e {
            StoreError::Conflict => ApiError::Conflict("already following this user"),
            other => other.into(),
        })?;

    Ok(Json(Envelope { data: () }))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    PathUser(target): PathUser,
) -> Result<impl IntoResponse, ApiError> {
    if me.id == target.id {
        return Err(ApiError::Validation("you cannot unfollow yourself".into()));
    }

    state.storage.followers.unfollow(me.id, target.id).await?;
    Ok(Json(Envelope { data: () }))
}

/// Redeem an invitation token. Unknown and expired tokens look the same.
pub async fn activate_user(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.storage.users.activate(&token).await?;
    info!("user activated");
    Ok(Json(Envelope { data: () }))
}

pub async fn feed(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    FeedQuery(filter): FeedQuery,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.storage.posts.feed(me.id, &filter).await?;
    Ok(Json(Envelope { data: items }))
}
