//! Error types for adapter construction and registry I/O.

use thiserror::Error;

/// Result type alias using [`AdapterError`].
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Errors raised by adapters and the factory table.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Failed to connect to the registry.
    #[error("failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The registry answered with an unexpected status.
    #[error("HTTP error from registry: {status} - {message}")]
    HttpError {
        /// HTTP status code, `0` when unknown.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The registry URL is malformed.
    #[error("invalid registry URL '{url}': {message}")]
    InvalidUrl {
        /// URL string.
        url: String,
        /// Parser message.
        message: String,
    },

    /// The registry record cannot be turned into a client.
    #[error("invalid registry configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// The registry answered successfully but the response is unusable.
    #[error("invalid response from registry: {message}")]
    InvalidResponse {
        /// What was wrong with the response.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// No factory is registered for the registry type.
    #[error("no adapter factory registered for registry type '{registry_type}'")]
    FactoryNotFound {
        /// Requested type tag.
        registry_type: String,
    },

    /// A factory was registered twice for the same type.
    #[error("adapter factory for registry type '{registry_type}' is already registered")]
    DuplicateFactory {
        /// Duplicated type tag.
        registry_type: String,
    },

    /// The adapter lacks a capability the caller needs.
    #[error("registry does not support {capability}")]
    Unsupported {
        /// Missing capability.
        capability: String,
    },
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::ConnectionFailed {
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                source: err,
            }
        } else if err.is_decode() {
            Self::HttpError {
                status: 0,
                message: format!("failed to decode response: {err}"),
            }
        } else {
            Self::HttpError {
                status: err.status().map_or(0, |s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError { source: err }
    }
}

impl From<AdapterError> for ferry_core::Error {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::FactoryNotFound { .. } | AdapterError::Unsupported { .. } => {
                Self::unsupported(err.to_string())
            }
            AdapterError::InvalidUrl { .. } | AdapterError::InvalidConfig { .. } => {
                Self::bad_request(err.to_string())
            }
            AdapterError::DuplicateFactory { .. } => Self::internal(err.to_string()),
            AdapterError::ConnectionFailed { .. }
            | AdapterError::HttpError { .. }
            | AdapterError::InvalidResponse { .. }
            | AdapterError::JsonError { .. } => Self::upstream(err.to_string()),
        }
    }
}
