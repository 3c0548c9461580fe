//! Error types for promise tracking
//!
//! Only structural failures live here. An error raised or rejected by the
//! tracked work is captured into the tracker and never surfaces as a
//! [`TrackError`].

use thiserror::Error;

/// Boxed error carried across the thenable registration boundary
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structural failure raised out of `track` itself
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Returned value looked like a thennable, but threw the following error when registering handlers: {cause}")]
    InvalidThennable {
        #[source]
        cause: BoxError,
    },

    #[error("Deadline timer requires a Tokio runtime: {0}")]
    RuntimeUnavailable(#[from] tokio::runtime::TryCurrentError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, TrackError>;

impl TrackError {
    /// Create an invalid thennable error wrapping the registration failure
    pub fn invalid_thennable(cause: impl Into<BoxError>) -> Self {
        TrackError::InvalidThennable {
            cause: cause.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        TrackError::InvalidConfig(msg.into())
    }

    /// Error kind name, matching the names callers filter on
    pub fn kind(&self) -> &'static str {
        match self {
            TrackError::InvalidThennable { .. } => "InvalidThennableError",
            TrackError::RuntimeUnavailable(_) => "RuntimeUnavailableError",
            TrackError::InvalidConfig(_) => "InvalidConfigError",
        }
    }

    /// The original registration error, if this is an invalid thennable
    pub fn cause(&self) -> Option<&BoxError> {
        match self {
            TrackError::InvalidThennable { cause } => Some(cause),
            _ => None,
        }
    }
}
