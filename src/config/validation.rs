// src/config/validation.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use tracing::{debug, warn};
use url::Url;
use validator::Validate;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> Result<()> {
        debug!("Starting configuration validation");

        if let Err(e) = config.validate() {
            warn!("Field validation failed: {}", e);
            return Err(AppError::config_validation(e.to_string(), None));
        }

        if let Err(e) = Self::validate_server_config(config) {
            warn!("Server config validation failed: {}", e);
            return Err(e);
        }
        debug!("Server config validation passed");

        if let Err(e) = Self::validate_gemini_config(config) {
            warn!("Gemini config validation failed: {}", e);
            return Err(e);
        }
        debug!("Gemini config validation passed");

        Ok(())
    }

    fn validate_server_config(config: &AppConfig) -> Result<()> {
        if config.server.port == 0 {
            return Err(AppError::config_validation(
                "Server port cannot be 0",
                Some("server.port"),
            ));
        }
        Ok(())
    }

    fn validate_gemini_config(config: &AppConfig) -> Result<()> {
        let url = Url::parse(&config.gemini.base_url).map_err(|e| {
            AppError::config_validation(
                format!("Invalid URL in base_url: {} - {}", config.gemini.base_url, e),
                Some("gemini.base_url"),
            )
        })?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::config_validation(
                    format!("Unsupported scheme '{scheme}' in base_url. Supported: http, https"),
                    Some("gemini.base_url"),
                ))
            }
        }

        if config.gemini.model.contains(char::is_whitespace) {
            return Err(AppError::config_validation(
                format!("Model name must not contain whitespace: '{}'", config.gemini.model),
                Some("gemini.model"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(err, AppError::ConfigValidation { field: Some(ref f), .. } if f == "server.port"));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 0;
        assert!(ConfigValidator::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.server.connect_timeout_secs = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut config = AppConfig::default();
        config.gemini.base_url = "ftp://example.com".to_string();
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("Unsupported scheme"));
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let mut config = AppConfig::default();
        config.gemini.base_url = "not a url".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn empty_model_is_rejected() {
        let mut config = AppConfig::default();
        config.gemini.model = String::new();
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
