//! Parlay gateway error types

use std::time::Duration;

use crate::types::ProviderKind;

/// Parlay gateway error types
#[derive(Debug, thiserror::Error)]
pub enum ParlayError {
    // Configuration / programming errors (never retried)
    #[error("provider type not found: {0}")]
    ProviderTypeNotFound(String),

    #[error("provider creation failed for type '{provider_type}': {source}")]
    CreationFailed {
        provider_type: String,
        #[source]
        source: Box<ParlayError>,
    },

    #[error("provider not registered: {0}")]
    NotRegistered(String),

    /// Named lookup miss (distinct from "unhealthy").
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // Selection errors
    #[error("no providers of type {0} registered")]
    NoProvidersOfKind(ProviderKind),

    #[error("no healthy providers of type {0} available")]
    NoHealthyProviders(ProviderKind),

    #[error("no {0} providers match the selection criteria")]
    NoMatchingProviders(ProviderKind),

    // Fusion errors
    #[error("no providers returned valid data")]
    NoValidData,

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    // Lifecycle errors
    #[error("provider '{0}' is not initialized")]
    NotInitialized(String),

    #[error("provider '{0}' has been disposed")]
    Disposed(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("data error: {0}")]
    DataError(String),

    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),
}

impl ParlayError {
    /// Whether the error is worth retrying.
    ///
    /// Network, timeout, rate-limit and server-side errors are transient.
    /// Validation, auth and configuration errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }

    /// Server-provided backoff hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether this is a timeout-class failure rather than a connectivity failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for ParlayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ParlayError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            ParlayError::DataError(err.to_string())
        } else {
            ParlayError::Http(err.to_string())
        }
    }
}

/// Result type alias for parlay gateway operations
pub type Result<T> = std::result::Result<T, ParlayError>;
