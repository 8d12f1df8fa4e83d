//! Error types for keeper-core

use thiserror::Error;

/// Result type alias using keeper-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Keeper
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Extension id that does not match the id syntax
    #[error("Invalid extension id: {id:?}")]
    InvalidExtensionId { id: String },

    /// Manifest document that is not a top-level object
    #[error("Malformed manifest: {message}")]
    MalformedManifest { message: String },

    /// URL that cannot be used as an update source
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid extension id error
    pub fn invalid_extension_id(id: impl Into<String>) -> Self {
        Self::InvalidExtensionId { id: id.into() }
    }

    /// Create a malformed manifest error
    pub fn malformed_manifest(message: impl Into<String>) -> Self {
        Self::MalformedManifest {
            message: message.into(),
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}
