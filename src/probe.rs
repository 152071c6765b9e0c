// src/probe.rs

//! Checks every configured key on its own, without rotation.

use crate::credentials::{preview, CredentialSet};
use crate::error::ProviderError;
use crate::transport::TransportFactory;
use serde_json::Value;
use tracing::{info, warn};

pub const PROBE_PROMPT: &str = "Hello";

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub index: usize,
    pub preview: String,
    pub result: Result<String, ProviderError>,
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// One line summary, as printed by `keys test`.
    pub fn summary(&self) -> String {
        match &self.result {
            Ok(text) => format!("Key {} ({}) works! Response: {}", self.index, self.preview, text.trim()),
            Err(err) => format!(
                "Key {} ({}) failed. Status: {}, Message: {}",
                self.index,
                self.preview,
                err.status.map_or_else(|| "none".to_string(), |s| s.to_string()),
                err.message
            ),
        }
    }
}

/// Sends [`PROBE_PROMPT`] once with each key, in order, and reports every result.
pub async fn probe_credentials(
    factory: &dyn TransportFactory,
    credentials: &CredentialSet,
    model: &str,
) -> Vec<ProbeOutcome> {
    info!(keys = credentials.len(), model, "Probing Gemini API keys");
    let payload = Value::String(PROBE_PROMPT.to_string());
    let mut outcomes = Vec::with_capacity(credentials.len());

    for (index, key) in credentials.iter().enumerate() {
        let result = match factory.build(key) {
            Ok(transport) => transport.generate(model, &payload, None).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            warn!(key.index = index, upstream.status = ?err.status, error = %err, "Key probe failed");
        }
        outcomes.push(ProbeOutcome {
            index,
            preview: preview(key),
            result,
        });
    }
    outcomes
}
