//! Login, refresh and logout.
//!
//! [`LoginOrchestrator`] exchanges upstream credentials for session tokens.
//! A successful login stores the upstream credential in the vault for the
//! lifetime of the refresh token and issues an access/refresh pair bound to
//! the upstream principal.

use std::{sync::Arc, time::Duration};

use chrono::TimeDelta;
use progress_common_authn::{RevocationRegistry, SessionClaims, TokenCodec, TokenType};
use progress_common_vault::{CredentialVault, PrincipalId};

use crate::{
    error::BrokerError,
    gate::DEFAULT_UPSTREAM_TIMEOUT,
    upstream::{UpstreamAuthenticator, UpstreamError, UpstreamIdentity},
};

/// Default lifetime of an access token.
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default lifetime of a refresh token and of the stored upstream credential.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Session tokens handed to a client.
#[derive(Clone)]
pub struct TokenPair {
    /// Principal both tokens are bound to.
    pub principal: PrincipalId,
    /// Short-lived bearer token for API calls.
    pub access_token: String,
    /// Long-lived token for obtaining new access tokens.
    pub refresh_token: String,
    /// Lifetime of the access token.
    pub expires_in: Duration,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("principal", &self.principal)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Drives the login, refresh and logout flows.
pub struct LoginOrchestrator<V> {
    codec: Arc<TokenCodec>,
    registry: Arc<dyn RevocationRegistry>,
    vault: Arc<V>,
    authenticator: Arc<dyn UpstreamAuthenticator>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    upstream_timeout: Duration,
}

impl<V> Clone for LoginOrchestrator<V> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            registry: Arc::clone(&self.registry),
            vault: Arc::clone(&self.vault),
            authenticator: Arc::clone(&self.authenticator),
            access_ttl: self.access_ttl,
            refresh_ttl: self.refresh_ttl,
            upstream_timeout: self.upstream_timeout,
        }
    }
}

impl<V: CredentialVault> LoginOrchestrator<V> {
    /// Creates an orchestrator with default token lifetimes.
    pub fn new(
        codec: Arc<TokenCodec>,
        registry: Arc<dyn RevocationRegistry>,
        vault: Arc<V>,
        authenticator: Arc<dyn UpstreamAuthenticator>,
    ) -> Self {
        Self {
            codec,
            registry,
            vault,
            authenticator,
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Sets the access and refresh token lifetimes.
    #[must_use]
    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    /// Sets the bound on a single upstream login call.
    #[must_use]
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Authenticates against the upstream and opens a session.
    ///
    /// Nothing is stored and no token is issued unless the upstream accepts
    /// the login and returns a usable identity.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::UpstreamAuthFailure`] if the upstream rejects the
    ///   login, cannot be reached, times out or returns a blank identity
    /// - [`BrokerError::Internal`] if tokens cannot be issued
    #[tracing::instrument(skip_all)]
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, BrokerError> {
        let identity = self.authenticate_upstream(username, password).await.map_err(|err| {
            if matches!(err, UpstreamError::Rejected) {
                tracing::warn!("upstream rejected login");
            } else {
                tracing::error!(error = %err, "upstream login failed");
            }
            BrokerError::from(err)
        })?;

        let UpstreamIdentity { principal, credential } = identity;
        // Both tokens must exist before the credential is stored.
        let access_token = self.issue(&principal, TokenType::Access, self.access_ttl)?;
        let refresh_token = self.issue(&principal, TokenType::Refresh, self.refresh_ttl)?;
        self.vault.store_credential(&principal, &credential, self.refresh_ttl).await;

        tracing::info!(principal = %principal, "login succeeded");
        Ok(TokenPair { principal, access_token, refresh_token, expires_in: self.access_ttl })
    }

    /// Issues a new access token for a refresh token.
    ///
    /// The refresh token is returned unchanged in the pair.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::InvalidToken`] for a revoked, forged or non-refresh
    ///   token
    /// - [`BrokerError::ExpiredToken`] for an expired refresh token
    /// - [`BrokerError::SessionNotFound`] if the upstream credential is gone
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, BrokerError> {
        if self.registry.is_revoked(refresh_token).await {
            tracing::debug!("rejected revoked refresh token");
            return Err(BrokerError::invalid_token());
        }

        let claims = self.codec.verify_typed(refresh_token, TokenType::Refresh).map_err(|err| {
            tracing::debug!(error = %err, "rejected refresh token");
            BrokerError::from(err)
        })?;

        let principal = claims.principal();
        if !self.vault.credential_exists(&principal).await {
            tracing::debug!(principal = %principal, "refresh for principal without session");
            return Err(BrokerError::SessionNotFound);
        }

        let access_token = self.issue(&principal, TokenType::Access, self.access_ttl)?;
        tracing::debug!(principal = %principal, "access token refreshed");
        Ok(TokenPair {
            principal,
            access_token,
            refresh_token: refresh_token.to_owned(),
            expires_in: self.access_ttl,
        })
    }

    /// Ends a session.
    ///
    /// Every presented token that still verifies is revoked until its natural
    /// expiry, and the upstream credential and cached resource set of its
    /// principal are removed.
    ///
    /// # Errors
    ///
    /// Returns the access token's verification error if neither token
    /// verifies; nothing is changed in that case.
    #[tracing::instrument(skip_all)]
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), BrokerError> {
        let access = self.codec.verify(access_token);
        let refresh = refresh_token.map(|token| (token, self.codec.verify(token)));

        let mut verified: Vec<(&str, SessionClaims)> = Vec::with_capacity(2);
        let access_err = match access {
            Ok(claims) => {
                verified.push((access_token, claims));
                None
            },
            Err(err) => Some(err),
        };
        if let Some((token, Ok(claims))) = refresh {
            verified.push((token, claims));
        }

        if verified.is_empty() {
            let err = access_err.map_or_else(BrokerError::invalid_token, BrokerError::from);
            tracing::debug!(error = %err, "logout with no valid token");
            return Err(err);
        }

        let mut principals: Vec<PrincipalId> = Vec::with_capacity(verified.len());
        for (token, claims) in verified {
            self.registry.revoke(token, claims.expires_at()).await;
            let principal = claims.principal();
            if !principals.contains(&principal) {
                principals.push(principal);
            }
        }
        for principal in &principals {
            self.vault.remove_credential(principal).await;
            tracing::info!(principal = %principal, "logged out");
        }
        Ok(())
    }

    async fn authenticate_upstream(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UpstreamIdentity, UpstreamError> {
        let identity = tokio::time::timeout(
            self.upstream_timeout,
            self.authenticator.authenticate(username, password),
        )
        .await
        .map_err(|_| UpstreamError::Timeout { timeout: self.upstream_timeout })??;

        if identity.is_blank() {
            return Err(UpstreamError::invalid_response("blank principal or credential"));
        }
        Ok(identity)
    }

    fn issue(
        &self,
        principal: &PrincipalId,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, BrokerError> {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        Ok(self.codec.issue(principal, token_type, ttl)?)
    }
}
