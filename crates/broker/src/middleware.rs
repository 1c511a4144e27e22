//! Per-request session resolution.
//!
//! [`SessionMiddleware`] turns an `Authorization` header into a
//! [`PrincipalContext`], or into nothing. It never rejects a request itself:
//! a missing, revoked, invalid or unmapped token simply yields no context,
//! and enforcement is left to [`AuthorizationGate`](crate::AuthorizationGate),
//! which only accepts a context.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use progress_common_authn::{RevocationRegistry, TokenCodec, TokenType};
use progress_common_vault::{CredentialVault, PrincipalId, UpstreamCredential};

/// Authorization scheme accepted by [`bearer_token`].
const BEARER_SCHEME: &str = "Bearer";

/// The authenticated caller of a request.
///
/// Only [`SessionMiddleware`] can construct one, so holding a context proves
/// the request carried a valid, unrevoked access token whose principal still
/// has an upstream credential.
#[derive(Clone)]
pub struct PrincipalContext {
    principal: PrincipalId,
    credential: UpstreamCredential,
    token: Arc<str>,
    expires_at: DateTime<Utc>,
}

impl PrincipalContext {
    pub(crate) fn new(
        principal: PrincipalId,
        credential: UpstreamCredential,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self { principal, credential, token: Arc::from(token), expires_at }
    }

    /// The authenticated principal.
    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Upstream credential for calls on the principal's behalf.
    #[must_use]
    pub fn credential(&self) -> &UpstreamCredential {
        &self.credential
    }

    /// The access token presented with the request.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Natural expiry of the presented access token.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl std::fmt::Debug for PrincipalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalContext")
            .field("principal", &self.principal)
            .field("credential", &self.credential)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for any other
/// scheme or an empty token.
///
/// # Examples
///
/// ```
/// use progress_common_broker::middleware::bearer_token;
///
/// assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
/// assert_eq!(bearer_token("Bearer "), None);
/// ```
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves session tokens into principal contexts.
pub struct SessionMiddleware<V> {
    codec: Arc<TokenCodec>,
    registry: Arc<dyn RevocationRegistry>,
    vault: Arc<V>,
}

impl<V> Clone for SessionMiddleware<V> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            registry: Arc::clone(&self.registry),
            vault: Arc::clone(&self.vault),
        }
    }
}

impl<V: CredentialVault> SessionMiddleware<V> {
    /// Creates a middleware over shared services.
    pub fn new(
        codec: Arc<TokenCodec>,
        registry: Arc<dyn RevocationRegistry>,
        vault: Arc<V>,
    ) -> Self {
        Self { codec, registry, vault }
    }

    /// Resolves the value of an `Authorization` header.
    ///
    /// Returns `None` if the header is absent or not a bearer token, and
    /// otherwise behaves like [`authenticate_token`](Self::authenticate_token).
    pub async fn authenticate(&self, authorization: Option<&str>) -> Option<PrincipalContext> {
        let Some(token) = authorization.and_then(bearer_token) else {
            tracing::debug!("no bearer token presented");
            return None;
        };
        self.authenticate_token(token).await
    }

    /// Resolves a raw session token.
    ///
    /// Checks, in order, short-circuiting on the first failure: revocation,
    /// signature and expiry (access tokens only), then the upstream
    /// credential lookup.
    #[tracing::instrument(name = "authenticate", skip_all)]
    pub async fn authenticate_token(&self, token: &str) -> Option<PrincipalContext> {
        if self.registry.is_revoked(token).await {
            tracing::debug!("rejected revoked session token");
            return None;
        }

        let claims = match self.codec.verify_typed(token, TokenType::Access) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::debug!(error = %err, "rejected session token");
                return None;
            },
        };

        let principal = claims.principal();
        let Some(credential) = self.vault.retrieve_credential(&principal).await else {
            tracing::debug!(principal = %principal, "no upstream credential for session");
            return None;
        };

        tracing::debug!(principal = %principal, "session resolved");
        Some(PrincipalContext::new(principal, credential, token, claims.expires_at()))
    }
}
