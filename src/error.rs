//! Error types for composition, transformation and provider operations

use std::fmt;
use thiserror::Error;

/// Result type alias for imaginarium operations
pub type Result<T> = std::result::Result<T, ImaginariumError>;

/// External services the crate talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Image hosting and transformation provider
    Hosting,
    /// Background removal API
    BackgroundRemoval,
    /// Payment capture API
    Payments,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hosting => write!(f, "image hosting"),
            Self::BackgroundRemoval => write!(f, "background removal"),
            Self::Payments => write!(f, "payments"),
        }
    }
}

/// Error types for imaginarium operations
#[derive(Error, Debug)]
pub enum ImaginariumError {
    /// Zero, negative or non-finite image dimensions or scale
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Provider returned a non-2xx status, timed out or sent an unusable body
    #[error("{service} service unavailable: {reason}")]
    UpstreamUnavailable { service: Upstream, reason: String },

    /// Caller tried to mutate a record it does not own
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Record or resource lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credit balance too low for the requested operation
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: u32, available: i64 },

    /// Malformed or incomplete request payload
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (config files and the like)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image decoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl ImaginariumError {
    /// Create a new invalid dimensions error
    pub fn invalid_dimensions<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDimensions(msg.into())
    }

    /// Create a new upstream failure for `service`
    pub fn upstream<S: Into<String>>(service: Upstream, reason: S) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: reason.into(),
        }
    }

    /// Create a new unauthorized error
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new invalid request error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Wrap a transport-level `reqwest` failure
    pub fn network_error(service: Upstream, operation: &str, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            "timed out"
        } else if error.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::upstream(service, format!("{operation} {kind}: {error}"))
    }

    /// Non-2xx response from a provider, with a truncated body for context
    pub fn upstream_status(
        service: Upstream,
        operation: &str,
        status: reqwest::StatusCode,
        body: &str,
    ) -> Self {
        let snippet: String = body.chars().take(200).collect();
        Self::upstream(
            service,
            format!("{operation} returned {status}: {}", snippet.trim()),
        )
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }

    /// Errors raised before any network call (geometry, merge, validation)
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimensions(_) | Self::InvalidRequest(_) | Self::InvalidConfig(_)
        )
    }

    /// Provider failures that should surface as a dismissible notification
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}
