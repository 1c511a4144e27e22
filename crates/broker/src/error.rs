//! Broker error taxonomy.
//!
//! Every failure a caller of the broker can observe is a [`BrokerError`].
//! Lower layers keep their own error types ([`AuthError`], [`VaultError`],
//! [`UpstreamError`]); they are converted here with their source chain
//! preserved, and [`BrokerError::user_action`] tells the caller what the end
//! user should do next.

use std::sync::Arc;

use progress_common_authn::AuthError;
use progress_common_vault::{BoxError, ConfigError, ResourceId, VaultError};
use thiserror::Error;

use crate::upstream::UpstreamError;

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors surfaced by the session broker.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions must
/// include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BrokerError {
    /// The session token is malformed, forged, revoked or of the wrong kind.
    #[error("Invalid session token")]
    InvalidToken {
        /// Why verification failed, when a codec error was involved.
        #[source]
        source: Option<AuthError>,
    },

    /// The session token was genuine but is past its expiry.
    #[error("Session token expired")]
    ExpiredToken,

    /// The token is valid but the principal has no live upstream credential.
    #[error("No active session for this principal")]
    SessionNotFound,

    /// The resource is not in the principal's authorized set.
    #[error("Resource {resource} is not accessible to this principal")]
    Forbidden {
        /// Resource that was requested.
        resource: ResourceId,
    },

    /// The authorized resource set could not be determined.
    #[error("Authorization unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The credential vault could not be reached or initialized.
    #[error("Credential vault unavailable: {message}")]
    BackendUnavailable {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The upstream system did not accept the login.
    #[error("Upstream authentication failed ({kind:?})")]
    UpstreamAuthFailure {
        /// Whether the user or the upstream is at fault.
        kind: UpstreamFailureKind,
        /// The upstream error.
        #[source]
        source: UpstreamError,
    },

    /// Configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An invariant of the broker itself was violated.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },
}

/// Classification of an upstream login failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailureKind {
    /// The upstream refused the username and password.
    Rejected,
    /// The upstream could not be reached or answered nonsense.
    Unreachable,
}

/// What the end user should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Authenticate again to obtain a fresh session.
    LogInAgain,
    /// Stop asking for this resource; it belongs to someone else.
    NotYourResource,
    /// Nothing is wrong with the request; retry later.
    TryLater,
    /// Correct the username or password.
    WrongCredentials,
}

impl BrokerError {
    /// Creates an [`BrokerError::InvalidToken`] error without a codec source.
    #[must_use]
    pub fn invalid_token() -> Self {
        Self::InvalidToken { source: None }
    }

    /// Creates a [`BrokerError::Forbidden`] error.
    #[must_use]
    pub fn forbidden(resource: ResourceId) -> Self {
        Self::Forbidden { resource }
    }

    /// Creates a [`BrokerError::Unavailable`] error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    /// Creates a [`BrokerError::BackendUnavailable`] error with a source.
    #[must_use]
    pub fn backend_unavailable(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::BackendUnavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a [`BrokerError::Internal`] error with a source.
    #[must_use]
    pub fn internal(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Classifies the error into the action the end user should take.
    #[must_use]
    pub fn user_action(&self) -> UserAction {
        match self {
            Self::InvalidToken { .. } | Self::ExpiredToken | Self::SessionNotFound => {
                UserAction::LogInAgain
            },
            Self::Forbidden { .. } => UserAction::NotYourResource,
            Self::UpstreamAuthFailure { kind: UpstreamFailureKind::Rejected, .. } => {
                UserAction::WrongCredentials
            },
            Self::UpstreamAuthFailure { kind: UpstreamFailureKind::Unreachable, .. }
            | Self::Unavailable { .. }
            | Self::BackendUnavailable { .. }
            | Self::Config(_)
            | Self::Internal { .. } => UserAction::TryLater,
        }
    }
}

impl From<AuthError> for BrokerError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired => Self::ExpiredToken,
            AuthError::InvalidSigningKey(_) | AuthError::TokenEncoding(_) => {
                Self::internal("session token codec failure", err)
            },
            other => Self::InvalidToken { source: Some(other) },
        }
    }
}

impl From<UpstreamError> for BrokerError {
    fn from(err: UpstreamError) -> Self {
        let kind = match err {
            UpstreamError::Rejected => UpstreamFailureKind::Rejected,
            _ => UpstreamFailureKind::Unreachable,
        };
        Self::UpstreamAuthFailure { kind, source: err }
    }
}

impl From<VaultError> for BrokerError {
    fn from(err: VaultError) -> Self {
        Self::backend_unavailable("credential vault failure", err)
    }
}
