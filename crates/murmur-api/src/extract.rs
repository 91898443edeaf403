//! Typed extractors. Each one resolves its input up front, so handlers only
//! ever see validated payloads and entities that exist.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use murmur_types::api::FeedParams;
use murmur_types::models::{FeedFilter, Post, User};

use crate::error::ApiError;
use crate::state::AppState;

/// A JSON body that deserialized cleanly and passed the state's
/// [`RequestValidator`](crate::validation::RequestValidator).
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<T> FromRequest<AppState> for Payload<T>
where
    T: DeserializeOwned + Validate + Send + 'static,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

        state.validator.validate(&value)?;
        Ok(Payload(value))
    }
}

/// The post named by the `{id}` path segment.
#[derive(Debug, Clone)]
pub struct PathPost(pub Post);

impl FromRequestParts<AppState> for PathPost {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = path_id(parts, state).await?;
        Ok(PathPost(state.storage.posts.get_by_id(id).await?))
    }
}

/// The user named by the `{id}` path segment.
#[derive(Debug, Clone)]
pub struct PathUser(pub User);

impl FromRequestParts<AppState> for PathUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = path_id(parts, state).await?;
        Ok(PathUser(state.storage.users.get_by_id(id).await?))
    }
}

/// Feed query string with defaults applied and bounds checked.
#[derive(Debug, Clone)]
pub struct FeedQuery(pub FeedFilter);

impl FromRequestParts<AppState> for FeedQuery {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<FeedParams>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

        Ok(FeedQuery(state.validator.feed_filter(params)?))
    }
}

async fn path_id(parts: &mut Parts, state: &AppState) -> Result<i64, ApiError> {
    let Path(raw) = Path::<String>::from_request_parts(parts, state)
        .await
        .map_err(|_| ApiError::Validation("invalid id".into()))?;
    parse_id(&raw)
}

/// Ids are positive decimal integers.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::Validation(format!("invalid id: {raw}")))
}
