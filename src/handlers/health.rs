// src/handlers/health.rs

use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub keys: KeysStatus,
}

#[derive(Debug, Serialize)]
pub struct KeysStatus {
    pub configured: usize,
    pub active_index: usize,
}

/// `GET /api/health`
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.client.status();
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        keys: KeysStatus {
            configured: status.configured,
            active_index: status.active_index,
        },
    })
}
