// src/error.rs
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Error reported by the generative-AI transport for a single attempt.
///
/// `status` is the HTTP status returned by the provider, if the failure got
/// that far; network-level failures carry `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(Some(status), message)
    }

    pub fn without_status(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Terminal outcomes of a rotating client call.
///
/// Quota failures never surface on their own: they either trigger a rotation
/// or end up as the source of [`ClientError::Exhausted`].
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No Gemini API keys configured")]
    ConfigurationEmpty,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("All Gemini API keys exhausted or rate limited after {attempts} attempt(s)")]
    Exhausted {
        attempts: usize,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Fatal(ProviderError),
}

impl ClientError {
    /// The provider error behind this outcome, if there was one.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Exhausted { source, .. } => Some(source),
            Self::Fatal(err) => Some(err),
            Self::ConfigurationEmpty | Self::InvalidRequest(_) => None,
        }
    }
}

/// Structured error response body.
#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Serialize, Debug)]
struct ErrorDetails {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Service-level errors.
///
/// Implements `IntoResponse` so handlers can return it directly.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    #[error("HTTP client build error: {0}")]
    HttpClientBuild(#[source] reqwest::Error),

    #[error("Malformed request body: {0}")]
    JsonBody(#[from] JsonRejection),

    #[error("Request validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn config_validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    fn to_status_and_details(&self) -> (StatusCode, ErrorDetails) {
        match self {
            // --- 4xx: caller mistakes ---
            Self::JsonBody(rejection) => {
                warn!("Malformed request body: {}", rejection.body_text());
                (
                    StatusCode::BAD_REQUEST,
                    ErrorDetails {
                        error_type: "INVALID_JSON".to_string(),
                        message: "Request body is not valid JSON for this endpoint".to_string(),
                        details: Some(rejection.body_text()),
                    },
                )
            }
            Self::Validation(e) => {
                warn!("Request validation failed: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorDetails {
                        error_type: "VALIDATION_ERROR".to_string(),
                        message: "Request body failed validation".to_string(),
                        details: Some(e.to_string()),
                    },
                )
            }

            // --- outcomes of the rotating client ---
            Self::Client(ClientError::InvalidRequest(msg)) => (
                StatusCode::BAD_REQUEST,
                ErrorDetails {
                    error_type: "INVALID_REQUEST".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            Self::Client(ClientError::ConfigurationEmpty) => {
                error!("Request rejected: no Gemini API keys configured");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorDetails {
                        error_type: "NO_API_KEYS".to_string(),
                        message: "No Gemini API keys are configured".to_string(),
                        details: None,
                    },
                )
            }
            Self::Client(ClientError::Exhausted { attempts, source }) => {
                error!(attempts, last_error = %source, "All Gemini API keys exhausted");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    ErrorDetails {
                        error_type: "API_KEYS_EXHAUSTED".to_string(),
                        message: "All Gemini API keys exhausted or rate limited".to_string(),
                        details: Some(format!("attempts: {attempts}; last error: {source}")),
                    },
                )
            }
            Self::Client(ClientError::Fatal(err)) => {
                error!(upstream.status = ?err.status, "Gemini error: {}", err.message);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorDetails {
                        error_type: "UPSTREAM_ERROR".to_string(),
                        message: err.message.clone(),
                        details: err.status.map(|s| format!("upstream status: {s}")),
                    },
                )
            }

            // --- 5xx: our own failures, details stay in the logs ---
            Self::Config(e) => {
                error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "CONFIG_ERROR".to_string(),
                        message: "Internal server configuration error".to_string(),
                        details: None,
                    },
                )
            }
            Self::ConfigValidation { message, field } => {
                error!(field = ?field, "Configuration validation error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "CONFIG_ERROR".to_string(),
                        message: "Internal server configuration error".to_string(),
                        details: None,
                    },
                )
            }
            Self::HttpClientBuild(e) => {
                error!("HTTP client build error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "HTTP_CLIENT_BUILD_ERROR".to_string(),
                        message: "Internal server error building HTTP client".to_string(),
                        details: None,
                    },
                )
            }
            Self::Internal(msg) => {
                error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "INTERNAL_SERVER_ERROR".to_string(),
                        message: "An unexpected internal server error occurred".to_string(),
                        details: None,
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, details) = self.to_status_and_details();
        (status, Json(ErrorResponse { error: details })).into_response()
    }
}

/// Result type alias for the service.
pub type Result<T, E = AppError> = std::result::Result<T, E>;
