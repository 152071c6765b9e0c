// src/transport/mod.rs

//! Seams between the rotating client and the generative-AI provider.
//!
//! A [`TransportFactory`] binds a [`Transport`] to exactly one API key. The
//! rotating client asks the factory for a fresh transport each time it
//! switches keys, so an implementation never has to deal with key changes.

pub mod gemini;

pub use gemini::{GeminiTransport, GeminiTransportFactory};

use crate::error::ProviderError;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Optional per-call configuration.
///
/// Everything other than the system instruction is forwarded to the provider
/// untouched as generation settings (temperature, topP, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(flatten)]
    pub generation: Map<String, Value>,
}

impl CallConfig {
    pub fn with_system_instruction(instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: Some(instruction.into()),
            generation: Map::new(),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.generation.insert(key.into(), value.into());
        self
    }
}

/// A provider client bound to a single API key.
#[async_trait]
pub trait Transport: Send + Sync {
    /// One-shot generation. `contents` is provider-specific and passed through.
    async fn generate(
        &self,
        model: &str,
        contents: &Value,
        config: Option<&CallConfig>,
    ) -> Result<String, ProviderError>;

    /// Starts an empty conversation scoped to this transport's key.
    fn start_conversation(&self, model: &str, config: Option<&CallConfig>)
        -> Box<dyn Conversation>;
}

/// A conversation started by a [`Transport`].
#[async_trait]
pub trait Conversation: Send {
    async fn send(&mut self, message: &str) -> Result<String, ProviderError>;
}

/// Builds transports bound to a given key.
pub trait TransportFactory: Send + Sync {
    fn build(&self, credential: &SecretString) -> Result<Arc<dyn Transport>, ProviderError>;
}
