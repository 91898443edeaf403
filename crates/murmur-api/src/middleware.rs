use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use murmur_db::StoreError;
use murmur_types::api::Claims;
use murmur_types::models::User;

use crate::error::ApiError;
use crate::state::{AppState, AuthConfig};

/// The caller, resolved from a valid `Authorization: Bearer` JWT.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized)?;

        let claims = verify_token(&state.auth, bearer.token())?;
        let user_id: i64 = claims.sub.parse().map_err(|_| ApiError::Unauthorized)?;

        // A token can outlive its account
        match state.storage.users.get_by_id(user_id).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(StoreError::NotFound) => Err(ApiError::Unauthorized),
            Err(e) => Err(e.into()),
        }
    }
}

/// Sign a token for `user` valid for `config.ttl`.
pub fn issue_token(config: &AuthConfig, user: &User) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        exp: (now + config.ttl).timestamp() as usize,
        iat: now.timestamp() as usize,
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))
}

/// Check signature, expiry, issuer and audience.
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("rejected token: {e}");
        ApiError::Unauthorized
    })
}
