// src/errors.rs

//! Error type for configuration, I/O and preference-tool failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A preference tool (`defaults`, `plutil`) exited unsuccessfully.
    #[error("{command} failed: {stderr}")]
    ToolFailed { command: String, stderr: String },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PrefwatchError>;
