// src/config/app.rs

use crate::credentials::CredentialSource;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize, Validate)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    #[validate(length(min = 1, message = "host must not be empty"))]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    #[validate(range(min = 1, message = "connect timeout cannot be 0"))]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1, message = "request timeout cannot be 0"))]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where the Gemini API lives and which model the service calls.
///
/// API keys are not part of this file; they come from the environment
/// according to `credential_source`.
#[derive(Debug, Deserialize, Clone, PartialEq, Serialize, Validate)]
pub struct GeminiConfig {
    #[serde(default = "default_base_url")]
    #[validate(url(message = "base_url must be a valid URL"))]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    #[validate(length(min = 1, message = "api_version must not be empty"))]
    pub api_version: String,
    #[serde(default = "default_model")]
    #[validate(length(min = 1, message = "model must not be empty"))]
    pub model: String,
    #[serde(default)]
    pub credential_source: CredentialSource,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            model: default_model(),
            credential_source: CredentialSource::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default, Serialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub gemini: GeminiConfig,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    120
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_version() -> String {
    "v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
