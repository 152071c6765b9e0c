// src/state.rs

use crate::client::RotatingCredentialClient;
use crate::config::AppConfig;
use crate::error::Result;
use crate::transport::GeminiTransportFactory;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

/// Shared state handed to every Axum handler.
///
/// The rotating client is built once here and shared; there is no global instance.
pub struct AppState {
    pub config: AppConfig,
    pub client: Arc<RotatingCredentialClient>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Builds the Gemini transport factory and the rotating client from `config`.
    ///
    /// Keys are not read yet; the client loads them on first use.
    pub fn new(config: &AppConfig) -> Result<Self> {
        info!("Creating shared AppState: building HTTP client and rotating Gemini client...");
        let factory = GeminiTransportFactory::from_config(config)?;
        let client = RotatingCredentialClient::new(
            config.gemini.credential_source,
            Arc::new(factory),
        );
        Ok(Self::with_client(config.clone(), Arc::new(client)))
    }

    pub fn with_client(config: AppConfig, client: Arc<RotatingCredentialClient>) -> Self {
        Self {
            config,
            client,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("client", &self.client)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
