//! Error types for the hierarchical agent orchestrator
//!
//! Only configuration problems surface to callers. Gateway, extraction and
//! routing failures are absorbed at the component that observes them.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Startup Errors
    // =============================

    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("Model gateway error: {0}")]
    Gateway(String),

    #[error("Model gateway timed out after {0}s")]
    GatewayTimeout(u64),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Command blocked by sandbox policy: {0}")]
    CommandBlocked(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
