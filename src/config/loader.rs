// src/config/loader.rs

use crate::config::{AppConfig, ConfigValidator};
use crate::error::Result;
use ::config::{Config, Environment, File, FileFormat};
use std::path::Path;
use tracing::{debug, info, warn};

/// Prefix for structured overrides, e.g. `ROTATOR__SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "ROTATOR";

/// Loads configuration: defaults, then the YAML file (if present), then
/// `ROTATOR__*` environment variables, then `PORT`. The result is validated.
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if config_path.exists() {
        info!("Loading configuration from file: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).format(FileFormat::Yaml));
    } else {
        info!(
            "Configuration file {} not found, using defaults",
            config_path.display()
        );
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let mut config: AppConfig = builder.build()?.try_deserialize()?;

    override_with_env(&mut config);

    ConfigValidator::validate(&config)?;

    debug!("Configuration loaded and validated successfully");
    Ok(config)
}

fn override_with_env(config: &mut AppConfig) {
    if let Ok(port_str) = std::env::var("PORT") {
        if let Ok(port) = port_str.parse::<u16>() {
            info!("Overriding server port from environment variable: {}", port);
            config.server.port = port;
        } else {
            warn!("Invalid PORT environment variable: {}", port_str);
        }
    }
}

/// Serializes a configuration as YAML, for `config` CLI output and templates.
pub fn to_yaml(config: &AppConfig) -> Result<String> {
    serde_yaml::to_string(config).map_err(|e| {
        crate::error::AppError::Internal(format!("Failed to serialize config: {e}"))
    })
}
