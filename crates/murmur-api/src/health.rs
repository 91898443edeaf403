use axum::{Json, extract::State};

use murmur_types::api::{Envelope, HealthResponse};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Envelope<HealthResponse>> {
    Json(Envelope {
        data: HealthResponse {
            status: "ok".into(),
            env: state.env.clone(),
            version: env!("CARGO_PKG_VERSION").into(),
        },
    })
}
