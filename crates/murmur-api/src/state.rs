use std::sync::Arc;

use chrono::Duration;

use murmur_db::Storage;

use crate::validation::RequestValidator;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub storage: Storage,
    pub validator: RequestValidator,
    pub auth: AuthConfig,
    /// How long a freshly issued invitation stays redeemable.
    pub invitation_ttl: Duration,
    /// Deployment name reported by `/health`.
    pub env: String,
}

/// JWT signing and validation parameters.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}
