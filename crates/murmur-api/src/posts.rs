use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use murmur_db::StoreError;
use murmur_types::api::{CreatePostRequest, Envelope, PostResponse, UpdatePostRequest};
use murmur_types::models::NewPost;

use crate::error::ApiError;
use crate::extract::{PathPost, Payload};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(req): Payload<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .storage
        .posts
        .create(NewPost {
            title: req.title,
            content: req.content,
            user_id: user.id,
            tags: req.tags,
        })
        .await?;

    info!(post_id = post.id, user_id = user.id, "post created");
    Ok((StatusCode::CREATED, Json(Envelope { data: post })))
}

/// A post together with its comments, newest comment first.
pub async fn get_post(
    State(state): State<AppState>,
    _: AuthUser,
    PathPost(post): PathPost,
) -> Result<impl IntoResponse, ApiError> {
    let comments = state.storage.comments.list_for_post(post.id).await?;
    Ok(Json(Envelope {
        data: PostResponse { post, comments },
    }))
}

/// Partial update guarded by the post's version counter.
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathPost(mut post): PathPost,
    Payload(req): Payload<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if post.user_id != user.id {
        return Err(ApiError::Forbidden);
    }

    let expected_version = req.version.unwrap_or(post.version);
    if let Some(title) = req.title {
        post.title = title;
    }
    if let Some(content) = req.content {
        post.content = content;
    }
    if let Some(tags) = req.tags {
        post.tags = tags;
    }

    state
        .storage
        .posts
        .update(&mut post, expected_version)
        .await
        .map_err(|e| match e {
            StoreError::Conflict => ApiError::Conflict("post was modified by another request"),
            other => other.into(),
        })?;

    Ok(Json(Envelope { data: post }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathPost(post): PathPost,
) -> Result<impl IntoResponse, ApiError> {
    if post.user_id != user.id {
        return Err(ApiError::Forbidden);
    }

    state.storage.posts.delete(post.id).await?;
    info!(post_id = post.id, "post deleted");
    Ok(Json(Envelope { data: () }))
}
