// src/transport/gemini.rs

use super::{CallConfig, Conversation, Transport, TransportFactory};
use crate::config::AppConfig;
use crate::error::{AppError, ProviderError};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, trace};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Builds [`GeminiTransport`]s that share one connection pool.
#[derive(Clone, Debug)]
pub struct GeminiTransportFactory {
    http: Client,
    base_url: String,
    api_version: String,
}

impl GeminiTransportFactory {
    /// Creates the shared HTTP client from the server timeouts and Gemini endpoint settings.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let http = configure_builder(
            Client::builder(),
            config.server.connect_timeout_secs,
            config.server.request_timeout_secs,
        )
        .build()
        .map_err(AppError::HttpClientBuild)?;
        Ok(Self::with_client(
            http,
            &config.gemini.base_url,
            &config.gemini.api_version,
        ))
    }

    pub fn with_client(http: Client, base_url: &str, api_version: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.trim_matches('/').to_string(),
        }
    }

    /// Binds a transport to `credential` without type erasure.
    pub fn bind(&self, credential: &SecretString) -> GeminiTransport {
        GeminiTransport {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            api_version: self.api_version.clone(),
            api_key: credential.clone(),
        }
    }
}

impl TransportFactory for GeminiTransportFactory {
    fn build(&self, credential: &SecretString) -> Result<Arc<dyn Transport>, ProviderError> {
        Ok(Arc::new(self.bind(credential)))
    }
}

fn configure_builder(builder: ClientBuilder, connect_secs: u64, request_secs: u64) -> ClientBuilder {
    builder
        .connect_timeout(Duration::from_secs(connect_secs))
        .timeout(Duration::from_secs(request_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Some(Duration::from_secs(60)))
}

/// Gemini REST client bound to a single API key.
#[derive(Clone)]
pub struct GeminiTransport {
    http: Client,
    base_url: String,
    api_version: String,
    api_key: SecretString,
}

impl std::fmt::Debug for GeminiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiTransport")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("api_key", &crate::credentials::preview(&self.api_key))
            .finish()
    }
}

impl GeminiTransport {
    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, self.api_version, model
        )
    }

    #[instrument(level = "debug", skip(self, contents, config), fields(model = %model))]
    async fn post_generate(
        &self,
        model: &str,
        contents: Value,
        config: Option<&CallConfig>,
    ) -> Result<Content, ProviderError> {
        let body = request_body(contents, config);
        let url = self.endpoint(model);
        trace!(url = %url, "Sending generateContent request");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(status = %status, bytes = bytes.len(), "Received generateContent response");

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &bytes));
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::with_status(
                status.as_u16(),
                format!("Failed to decode generateContent response: {e}"),
            )
        })?;

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(
        &self,
        model: &str,
        contents: &Value,
        config: Option<&CallConfig>,
    ) -> Result<String, ProviderError> {
        let content = self
            .post_generate(model, normalize_contents(contents), config)
            .await?;
        Ok(content.text())
    }

    fn start_conversation(
        &self,
        model: &str,
        config: Option<&CallConfig>,
    ) -> Box<dyn Conversation> {
        Box::new(GeminiConversation {
            transport: self.clone(),
            model: model.to_string(),
            config: config.cloned(),
            history: Vec::new(),
        })
    }
}

/// Conversation that keeps its history in memory and resends it each turn.
pub struct GeminiConversation {
    transport: GeminiTransport,
    model: String,
    config: Option<CallConfig>,
    history: Vec<Value>,
}

#[async_trait]
impl Conversation for GeminiConversation {
    async fn send(&mut self, message: &str) -> Result<String, ProviderError> {
        self.history.push(user_turn(message));
        let result = self
            .transport
            .post_generate(
                &self.model,
                Value::Array(self.history.clone()),
                self.config.as_ref(),
            )
            .await;

        match result {
            Ok(content) => {
                let text = content.text();
                self.history.push(json!({
                    "role": "model",
                    "parts": content.parts.iter().map(Part::to_value).collect::<Vec<_>>(),
                }));
                Ok(text)
            }
            Err(err) => {
                // a failed turn is not part of the conversation
                self.history.pop();
                Err(err)
            }
        }
    }
}

fn user_turn(text: &str) -> Value {
    json!({ "role": "user", "parts": [{ "text": text }] })
}

/// Accepts the shapes callers commonly pass: plain text, a single content
/// object, or a full `contents` array.
fn normalize_contents(contents: &Value) -> Value {
    match contents {
        Value::String(text) => Value::Array(vec![user_turn(text)]),
        Value::Array(_) => contents.clone(),
        Value::Object(_) => Value::Array(vec![contents.clone()]),
        other => Value::Array(vec![user_turn(&other.to_string())]),
    }
}

fn request_body(contents: Value, config: Option<&CallConfig>) -> Value {
    let mut body = json!({ "contents": contents });
    if let Some(config) = config {
        if let Some(instruction) = &config.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }
        if !config.generation.is_empty() {
            body["generationConfig"] = Value::Object(config.generation.clone());
        }
    }
    body
}

fn error_from_body(status: u16, bytes: &[u8]) -> ProviderError {
    let message = serde_json::from_slice::<ErrorEnvelope>(bytes)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            if text.is_empty() {
                format!("Gemini API returned status {status}")
            } else {
                text
            }
        });
    ProviderError::with_status(status, message)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(&self) -> String {
        self.parts.iter().filter_map(|p| p.text.as_deref()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl Part {
    fn to_value(&self) -> Value {
        json!({ "text": self.text.clone().unwrap_or_default() })
    }
}
