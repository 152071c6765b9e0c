// src/metrics.rs

//! Rotation metrics.
//!
//! Recording goes through the `metrics` facade and is a no-op until the binary
//! installs a Prometheus recorder; `GET /metrics` renders it when present.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use ::metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

pub const ATTEMPTS_TOTAL: &str = "gemini_rotator_attempts_total";
pub const KEY_ROTATIONS_TOTAL: &str = "gemini_rotator_key_rotations_total";
pub const EXHAUSTED_TOTAL: &str = "gemini_rotator_exhausted_total";
pub const ACTIVE_KEY_INDEX: &str = "gemini_rotator_active_key_index";
pub const KEYS_CONFIGURED: &str = "gemini_rotator_keys_configured";

/// Installs the process-wide Prometheus recorder.
///
/// Returns `None` if a recorder is already installed.
pub fn install_prometheus_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder; metrics disabled");
            None
        }
    }
}

/// Counts one transport attempt by outcome (`success`, `quota`, `fatal`).
pub fn record_attempt(operation: &'static str, outcome: &'static str) {
    counter!(ATTEMPTS_TOTAL, "operation" => operation, "outcome" => outcome).increment(1);
}

pub fn record_rotation(new_index: usize) {
    counter!(KEY_ROTATIONS_TOTAL).increment(1);
    record_active_index(new_index);
}

pub fn record_active_index(index: usize) {
    gauge!(ACTIVE_KEY_INDEX).set(index as f64);
}

pub fn record_exhausted() {
    counter!(EXHAUSTED_TOTAL).increment(1);
}

pub fn record_keys_configured(count: usize) {
    gauge!(KEYS_CONFIGURED).set(count as f64);
}

/// `GET /metrics`: Prometheus text format, or 404 when no recorder is installed.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::NOT_FOUND,
            "metrics recorder not installed".to_string(),
        ),
    }
}
