// src/lib.rs

// --- Modules ---
pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod probe;
pub mod state;
pub mod transport;

use crate::handlers::{code_handler, health_check, requirements_handler};
use axum::{
    body::Body,
    http::{HeaderValue, Request as AxumRequest},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{path::PathBuf, sync::Arc, time::Instant};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

// Re-exports of the main types
pub use client::{RotatingCredentialClient, RotationStatus};
pub use config::AppConfig;
pub use credentials::{CredentialProvider, CredentialSet, CredentialSource};
pub use error::{AppError, ClientError, ProviderError, Result};
pub use state::AppState;

/// Builds the Axum router for the service.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/ai/requirements", post(requirements_handler))
        .route("/api/ai/code", post(code_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(axum::middleware::from_fn(trace_requests))
        .with_state(state)
}

/// Adds a request id and a tracing span to every request.
async fn trace_requests(
    mut req: AxumRequest<Body>,
    next: axum::middleware::Next,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %method,
        url.path = %path,
    );

    req.extensions_mut().insert(request_id);

    async move {
        let mut response = next.run(req).await;
        let elapsed = start_time.elapsed();

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("X-Request-ID", value);
        }

        info!(
            http.response.duration = ?elapsed,
            http.status_code = response.status().as_u16(),
            "Finished processing request"
        );

        response
    }
    .instrument(span)
    .await
}

/// Resolves the config path, then loads and validates the configuration.
pub fn setup_configuration(config_path_override: Option<PathBuf>) -> Result<(AppConfig, PathBuf)> {
    let config_path = config_path_override.unwrap_or_else(|| PathBuf::from("config.yaml"));

    let config_path_display = config_path.display().to_string();
    if config_path.exists() {
        info!(config.path = %config_path_display, "Using configuration file");
    } else {
        info!(config.path = %config_path_display, "Optional configuration file not found. Using defaults and environment variables.");
    }

    let app_config = config::load_config(&config_path).map_err(|e| {
        error!(
            config.path = %config_path_display,
            error = ?e,
            "Failed to load or validate configuration."
        );
        e
    })?;

    info!(
        server.host = %app_config.server.host,
        server.port = app_config.server.port,
        gemini.model = %app_config.gemini.model,
        gemini.credential_source = ?app_config.gemini.credential_source,
        "Configuration loaded and validated successfully."
    );

    Ok((app_config, config_path))
}

/// Builds the application state and router for `config`.
pub fn build_app(config: &AppConfig, metrics: Option<PrometheusHandle>) -> Result<Router> {
    let state = AppState::new(config)
        .map_err(|e| {
            error!(error = ?e, "Failed to initialize application state.");
            e
        })?
        .with_metrics(metrics);
    info!("Application state initialized successfully.");
    Ok(create_router(Arc::new(state)))
}
