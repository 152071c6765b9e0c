// src/handlers/mod.rs

pub mod ai;
pub mod health;

pub use ai::{code_handler, requirements_handler};
pub use health::health_check;
