//! Error types for the Flipt provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while reconciling Flipt resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested entity was not found.
    ///
    /// Raised when the remote request itself succeeded but the semantic
    /// lookup failed, e.g. a variant missing from its flag during an update.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be built or sent.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The Flipt API answered with a non-success status.
    #[error("API error: {method} {url} returned {status}: {body}")]
    Api {
        /// HTTP method of the failed request.
        method: String,
        /// Full request URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Operation failed due to current remote state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// For [`ProviderError::Api`] this is the response body.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::Api { body, .. } => body,
            Self::FailedPrecondition(msg) => msg,
        }
    }

    /// Build an API error from the pieces of a failed exchange.
    pub fn api(
        method: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::Api {
            method: method.into(),
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Short category label used as a diagnostic summary.
    fn summary(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not Found",
            Self::Validation(_) => "Invalid Configuration",
            Self::Configuration(_) => "Provider Configuration Error",
            Self::UnknownResource(_) => "Unknown Resource Type",
            Self::Serialization(_) => "Parse Error",
            Self::Transport(_) => "Client Error",
            Self::Api { .. } => "API Error",
            Self::FailedPrecondition(_) => "Conflicting Remote State",
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::error(err.summary()).with_detail(err.to_string())
    }
}
