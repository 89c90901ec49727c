//! Store error types
//!
//! Error definitions with transient/permanent classification. The sync
//! engine performs no retries itself, but logs the classification so an
//! external scheduler can decide how urgently to re-run.

use thiserror::Error;

/// Error produced by a source or target store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to reach the platform at all.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An operation ran past its deadline.
    #[error("{operation} timed out after {timeout_secs} seconds")]
    Timeout { operation: String, timeout_secs: u64 },

    /// The platform throttled the request.
    #[error("rate limited by the platform{}", retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Credentials were rejected.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// The platform answered with something we could not interpret.
    #[error("invalid response from platform: {message}")]
    InvalidResponse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The platform rejected the operation (validation, missing collection).
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration is invalid; detected at startup, fatal.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl StoreError {
    /// Check if this error is transient and a later run may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed { .. }
                | StoreError::Timeout { .. }
                | StoreError::RateLimited { .. }
        )
    }

    /// Check if this error is permanent and needs human intervention.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Stable code for log correlation and alerting.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            StoreError::Timeout { .. } => "TIMEOUT",
            StoreError::RateLimited { .. } => "RATE_LIMITED",
            StoreError::AuthenticationFailed => "AUTH_FAILED",
            StoreError::InvalidResponse { .. } => "INVALID_RESPONSE",
            StoreError::OperationFailed { .. } => "OPERATION_FAILED",
            StoreError::InvalidConfiguration { .. } => "INVALID_CONFIG",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        StoreError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        StoreError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error with source.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        StoreError::InvalidResponse {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid response error with source.
    pub fn invalid_response_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::InvalidResponse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        StoreError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
