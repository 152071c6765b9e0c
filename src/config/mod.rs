// src/config/mod.rs

pub mod app;
pub mod loader;
pub mod validation;

pub use app::{AppConfig, GeminiConfig, ServerConfig};
pub use loader::{load_config, to_yaml};
pub use validation::ConfigValidator;
