//! # Error Handling Module
//!
//! Defines the error taxonomy for the gateway pipeline using the `thiserror`
//! crate, along with the HTTP status code each failure maps to at the
//! response boundary.
//!
//! Every stage failure is recovered locally into a `PipelineResult`; nothing
//! escapes the pipeline boundary as an unhandled fault except
//! misconfiguration, which fails fast at construction time before any
//! request is processed.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Main result type used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// All failures a request can encounter inside the pipeline
///
/// The `#[error("...")]` attribute from `thiserror` implements `Display`
/// with the given message. Variants are values, never panics: stages return
/// them and the pipeline folds them into the terminal result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// Configuration-related errors (invalid capacity, unknown integration, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Authentication failed because no credential was supplied
    #[error("Authentication failed: no credential provided")]
    MissingCredential,

    /// Authentication failed because the credential did not validate
    #[error("Authentication failed: {reason}")]
    InvalidCredential { reason: String },

    /// Request admission was denied by the rate limiter
    #[error("Rate limit exceeded: {limit} requests per {window:?}")]
    RateLimited { limit: u32, window: Duration },

    /// The backend integration reported an error
    #[error("Backend error ({integration}): {message}")]
    BackendError { integration: String, message: String },

    /// The backend call exceeded the per-request timeout and was cancelled
    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    /// A cached entry failed to deserialize. Degraded to a cache miss by the
    /// caller, never surfaced to clients.
    #[error("Corrupt cache entry for key: {key}")]
    CacheCorrupt { key: String },
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a backend error for the named integration
    pub fn backend<S: Into<String>>(integration: S, message: S) -> Self {
        Self::BackendError {
            integration: integration.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code this error maps to at the response boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::InvalidCredential { .. } => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BackendError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::CacheCorrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, stable name of the error kind, used as the `reason` field of
    /// a `PipelineResult` and for metrics classification
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "Configuration",
            Self::MissingCredential => "MissingCredential",
            Self::InvalidCredential { .. } => "InvalidCredential",
            Self::RateLimited { .. } => "RateLimited",
            Self::BackendError { .. } => "BackendError",
            Self::Timeout { .. } => "Timeout",
            Self::CacheCorrupt { .. } => "CacheCorrupt",
        }
    }

    /// Check if this error should be retried
    ///
    /// Backend faults and timeouts are transient; auth and throttle
    /// rejections are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendError { .. } | Self::Timeout { .. })
    }
}
