//! Error types for the core crate
//! 
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Error type for configuration handling
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Io(e) => format!("File operation failed: {}", e),
            CoreError::Config(msg) => format!("Configuration error: {}", msg),
            CoreError::TomlParse(e) => format!("Configuration file is malformed: {}", e),
            _ => self.to_string(),
        }
    }
}
