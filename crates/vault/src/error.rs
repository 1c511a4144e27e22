//! Vault error types and result alias.
//!
//! Backends map their internal failures onto [`VaultError`]. The
//! [`CredentialVault`](crate::CredentialVault) trait itself never returns these
//! errors to callers: a failing backend degrades to a miss or a no-op at the
//! vault boundary. The error type exists so backends can classify failures
//! (transient or not) before that boundary logs and absorbs them.
//!
//! # Error Types
//!
//! - [`VaultError::Connection`] - Network or connection-related failures
//! - [`VaultError::Timeout`] - Operation exceeded its time limit
//! - [`VaultError::Serialization`] - Stored data could not be decoded
//! - [`VaultError::Unsupported`] - The backend does not implement an operation
//! - [`VaultError::Internal`] - Backend-specific internal errors
//!
//! # Example
//!
//! ```
//! use progress_common_vault::{VaultError, VaultResult};
//!
//! fn lookup() -> VaultResult<String> {
//!     Err(VaultError::connection("connection refused"))
//! }
//!
//! assert!(lookup().unwrap_err().is_transient());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for backend operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur inside a vault backend.
///
/// Errors preserve their source chain via the `#[source]` attribute, enabling
/// structured logging to display the full error context.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions must
/// include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VaultError {
    /// Connection or network error.
    ///
    /// The backend could not be reached (connection refused, dropped
    /// connection, DNS failure).
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("Operation timeout")]
    Timeout,

    /// Stored data could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend does not support the requested operation.
    #[error("Operation not supported by {backend} backend: {operation}")]
    Unsupported {
        /// Backend name.
        backend: &'static str,
        /// Operation name.
        operation: &'static str,
    },

    /// Internal backend error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },
}

impl VaultError {
    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Unsupported` error.
    #[must_use]
    pub fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        Self::Unsupported { backend, operation }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` for failures that are expected to clear on their own
    /// (connectivity loss, timeouts).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}

/// Configuration validation error.
///
/// Returned by configuration builders when a required field is missing or a
/// value is outside its accepted range.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required field was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: &'static str,
    },

    /// A duration field was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Field name.
        field: &'static str,
    },

    /// A field held a value that could not be parsed.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
