use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use murmur_types::api::{CreateCommentRequest, Envelope};
use murmur_types::models::NewComment;

use crate::error::ApiError;
use crate::extract::{PathPost, Payload};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathPost(post): PathPost,
    Payload(req): Payload<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .storage
        .comments
        .create(NewComment {
            post_id: post.id,
            user_id: user.id,
            content: req.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(Envelope { data: comment })))
}
