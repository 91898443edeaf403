use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};

use murmur_crypto::{InvitationToken, dummy_verify, hash_password, verify_password};
use murmur_db::StoreError;
use murmur_types::api::{Envelope, RegisterRequest, RegisterResponse, TokenRequest};
use murmur_types::models::NewUser;

use crate::error::ApiError;
use crate::extract::Payload;
use crate::middleware::issue_token;
use crate::state::AppState;

/// Create an inactive account and hand back its one-time invitation token.
pub async fn register(
    State(state): State<AppState>,
    Payload(req): Payload<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Argon2 is CPU heavy; keep it off the async workers
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let token = InvitationToken::generate();
    let user = state
        .storage
        .users
        .create_and_invite(
            NewUser {
                username: req.username,
                email: req.email,
                password_hash,
            },
            token.digest,
            state.invitation_ttl,
        )
        .await?;

    info!(user_id = user.id, "registered user {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(Envelope {
            data: RegisterResponse {
                user,
                token: token.plaintext,
            },
        }),
    ))
}

/// Exchange email and password of an active account for a JWT.
pub async fn create_token(
    State(state): State<AppState>,
    Payload(req): Payload<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let creds = match state.storage.users.get_credentials_by_email(&req.email).await {
        Ok(creds) => creds,
        Err(StoreError::NotFound) => {
            // Same cost as a real check so unknown emails are not distinguishable
            let password = req.password;
            tokio::task::spawn_blocking(move || dummy_verify(&password)).await?;
            return Err(ApiError::Unauthorized);
        }
        Err(e) => return Err(e.into()),
    };

    let password = req.password;
    let hash = creds.password_hash;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
    if !matches {
        warn!(user_id = creds.user.id, "login with wrong password");
        return Err(ApiError::Unauthorized);
    }

    let token = issue_token(&state.auth, &creds.user)?;
    Ok((StatusCode::CREATED, Json(Envelope { data: token })))
}
