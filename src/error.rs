//! Error types for concierge.

use thiserror::Error;

/// Main error type for concierge operations.
#[derive(Error, Debug)]
pub enum ConciergeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),

    #[error("AI provider error: {0}")]
    Ai(#[from] AiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors raised by a data-source integration (mail, source control,
/// calendar, drive).
///
/// These never escape the dispatcher: they are folded into the
/// `warnings` of a query result. `Clone` so a failed fetch can be
/// reported alongside a stale cached payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("{0} is not authenticated")]
    NotAuthenticated(String),

    #[error("{0} is disabled or not configured")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Operation {operation} is not supported by {integration}")]
    Unsupported {
        integration: String,
        operation: String,
    },

    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

impl IntegrationError {
    /// Map a reqwest failure the same way for every HTTP client.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IntegrationError::Http("Request timed out".to_string())
        } else if err.is_connect() {
            IntegrationError::Http(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            IntegrationError::Decode(err.to_string())
        } else {
            IntegrationError::Http(format!("Request failed: {}", err))
        }
    }
}

/// AI provider errors.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Empty completion")]
    EmptyCompletion,
}

/// Result type alias for concierge operations.
pub type Result<T> = std::result::Result<T, ConciergeError>;
