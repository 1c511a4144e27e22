//! Collaborators the broker calls on the upstream academic-records system.
//!
//! The broker never talks to the upstream directly. Deployments supply an
//! [`UpstreamAuthenticator`] for logins and a [`ResourceDirectory`] for the
//! authoritative list of resources a principal may access.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use progress_common_vault::{BoxError, PrincipalId, UpstreamCredential};
use thiserror::Error;

/// The identity the upstream returns for a successful login.
#[derive(Debug, Clone)]
pub struct UpstreamIdentity {
    /// Principal the session is bound to.
    pub principal: PrincipalId,
    /// Bearer value for calling the upstream on the principal's behalf.
    pub credential: UpstreamCredential,
}

impl UpstreamIdentity {
    /// Creates an identity.
    pub fn new(principal: impl Into<PrincipalId>, credential: UpstreamCredential) -> Self {
        Self { principal: principal.into(), credential }
    }

    /// Returns `true` if either half is blank and the identity is unusable.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.principal.is_blank() || self.credential.is_blank()
    }
}

/// Failures reported by upstream collaborators.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions must
/// include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpstreamError {
    /// The upstream refused the supplied username and password.
    #[error("Upstream rejected the credentials")]
    Rejected,

    /// The upstream could not be reached.
    #[error("Upstream unreachable: {message}")]
    Unreachable {
        /// Description of the failure.
        message: String,
        /// The underlying transport error.
        #[source]
        source: Option<BoxError>,
    },

    /// The upstream answered with something the broker cannot use.
    #[error("Invalid upstream response: {message}")]
    InvalidResponse {
        /// What was wrong with the response.
        message: String,
    },

    /// The upstream did not answer in time.
    #[error("Upstream did not respond within {timeout:?}")]
    Timeout {
        /// Bound that was exceeded.
        timeout: Duration,
    },
}

impl UpstreamError {
    /// Creates an [`UpstreamError::Unreachable`] error.
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable { message: message.into(), source: None }
    }

    /// Creates an [`UpstreamError::Unreachable`] error with a source.
    #[must_use]
    pub fn unreachable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unreachable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates an [`UpstreamError::InvalidResponse`] error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }
}

/// Verifies a username and password against the upstream.
#[async_trait]
pub trait UpstreamAuthenticator: Send + Sync {
    /// Authenticates the user and returns the upstream identity.
    ///
    /// Implementations should bound their own network time; the broker
    /// additionally wraps the call in its configured upstream timeout.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UpstreamIdentity, UpstreamError>;
}

/// Fetches the authoritative list of resources a principal may access.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Returns the raw listing for `principal`.
    ///
    /// The expected shape is a JSON array of objects carrying an `"id"`
    /// field; see [`parse_listing`](crate::gate::parse_listing).
    async fn fetch_listing(
        &self,
        principal: &PrincipalId,
        credential: &UpstreamCredential,
    ) -> Result<serde_json::Value, UpstreamError>;
}
