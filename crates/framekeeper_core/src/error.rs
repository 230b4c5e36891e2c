//! Core error types

use thiserror::Error;

/// Errors raised by configuration and control-argument validation
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration knob has an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A control operation received an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
