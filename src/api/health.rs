//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub backend: BackendHealthResponse,
    pub composer: ComposerHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct BackendHealthResponse {
    #[serde(rename = "type")]
    pub backend_type: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ComposerHealthResponse {
    pub active_sessions: usize,
    pub idle_timeout_seconds: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_type = state.composer.backend().backend_type();
    let base_url = (backend_type == "http").then(|| state.settings.backend.base_url.clone());

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        backend: BackendHealthResponse {
            backend_type: backend_type.to_string(),
            base_url,
        },
        composer: ComposerHealthResponse {
            active_sessions: state.composer.session_count(),
            idle_timeout_seconds: state.settings.composer.idle_timeout_seconds,
        },
    })
}
