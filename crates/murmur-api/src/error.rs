use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use murmur_crypto::CredentialError;
use murmur_db::StoreError;
use murmur_types::api::ErrorEnvelope;

/// Every way a request can fail. `IntoResponse` is the only place a status
/// code is chosen.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("a user with that email already exists")]
    DuplicateEmail,

    #[error("a user with that username already exists")]
    DuplicateUsername,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("the request took too long to process")]
    RequestTimeout,

    #[error("the server encountered a problem and could not process your request")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateEmail | ApiError::DuplicateUsername => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(cause) => error!("internal error: {cause:#}"),
            other => warn!(status = status.as_u16(), "request rejected: {other}"),
        }

        let body = ErrorEnvelope {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Conflict => ApiError::Conflict("resource conflict"),
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            StoreError::DuplicateUsername => ApiError::DuplicateUsername,
            e @ (StoreError::Timeout(_)
            | StoreError::Pool(_)
            | StoreError::Sqlite(_)
            | StoreError::Encode(_)
            | StoreError::Join(_)) => ApiError::Internal(e.into()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            e @ (CredentialError::Hash(_) | CredentialError::MalformedHash(_)) => {
                ApiError::Internal(e.into())
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::NotFound, StatusCode::NOT_FOUND),
            (StoreError::Conflict, StatusCode::CONFLICT),
            (StoreError::DuplicateEmail, StatusCode::BAD_REQUEST),
            (StoreError::DuplicateUsername, StatusCode::BAD_REQUEST),
            (
                StoreError::Timeout(std::time::Duration::from_secs(5)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (store, status) in cases {
            assert_eq!(ApiError::from(store).status(), status);
        }
    }

    #[test]
    fn request_timeout_is_408() {
        assert_eq!(ApiError::RequestTimeout.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = ApiError::from(StoreError::Timeout(std::time::Duration::from_secs(5)));
        let message = err.to_string();
        assert!(!message.contains("5s"));
        assert!(message.contains("server encountered a problem"));
    }
}
