//! Per-resource authorization.
//!
//! [`AuthorizationGate`] decides whether a principal may touch a resource by
//! checking it against the principal's authorized resource set. The set is
//! cached in the credential vault; on a miss the gate fetches the
//! authoritative listing from the [`ResourceDirectory`], caches it and
//! decides against the fresh copy.
//!
//! Concurrent misses for the same principal each fetch and store; the last
//! write wins.

use std::{sync::Arc, time::Duration};

use fail::fail_point;
use progress_common_vault::{
    CredentialVault, PrincipalId, ResourceId, ResourceSet, UpstreamCredential,
};
use serde_json::Value;

use crate::{
    error::BrokerError,
    middleware::PrincipalContext,
    upstream::{ResourceDirectory, UpstreamError},
};

/// Default lifetime of a cached resource set.
pub const DEFAULT_RESOURCE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default bound on a single listing fetch.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The resource belongs to the principal.
    Allow,
    /// Access is refused.
    Deny(DenyReason),
}

/// Why an authorization check refused access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The resource is not in the principal's authorized set.
    Forbidden,
    /// The authorized set could not be determined.
    Unavailable,
}

impl Decision {
    /// Returns `true` for [`Decision::Allow`].
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts a denial into the matching [`BrokerError`].
    ///
    /// # Errors
    ///
    /// [`BrokerError::Forbidden`] or [`BrokerError::Unavailable`] for a
    /// denial.
    pub fn into_result(self, resource_id: &ResourceId) -> Result<(), BrokerError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::Forbidden) => Err(BrokerError::forbidden(resource_id.clone())),
            Self::Deny(DenyReason::Unavailable) => {
                Err(BrokerError::unavailable("authorized resources could not be determined"))
            },
        }
    }
}

/// Derives the authorized resource set from an upstream listing.
///
/// The listing must be a JSON array. Each element that is an object with a
/// non-null `"id"` contributes that id: strings as they are, any other value
/// as its JSON rendering. Blank strings, missing ids and non-object elements
/// are skipped.
///
/// # Errors
///
/// Returns [`UpstreamError::InvalidResponse`] if the listing is not an array.
///
/// # Examples
///
/// ```
/// use progress_common_broker::gate::parse_listing;
/// use serde_json::json;
///
/// let set = parse_listing(&json!([{"id": 101}, {"id": "102"}, {"name": "no id"}])).unwrap();
/// assert_eq!(set.len(), 2);
/// assert!(set.contains("101"));
///
/// assert!(parse_listing(&json!({"cards": []})).is_err());
/// ```
pub fn parse_listing(listing: &Value) -> Result<ResourceSet, UpstreamError> {
    let entries = listing.as_array().ok_or_else(|| {
        UpstreamError::invalid_response(format!(
            "expected a JSON array of resources, got {}",
            json_kind(listing)
        ))
    })?;

    Ok(entries
        .iter()
        .filter_map(|entry| match entry.get("id")? {
            Value::Null => None,
            Value::String(id) => (!id.trim().is_empty()).then(|| ResourceId::from(id.as_str())),
            // Anything else is identified by its JSON rendering: 42, true, [1].
            other => Some(ResourceId::from(other.to_string())),
        })
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decides resource access against cached or freshly fetched listings.
pub struct AuthorizationGate<V> {
    vault: Arc<V>,
    directory: Arc<dyn ResourceDirectory>,
    cache_ttl: Duration,
    upstream_timeout: Duration,
}

impl<V> Clone for AuthorizationGate<V> {
    fn clone(&self) -> Self {
        Self {
            vault: Arc::clone(&self.vault),
            directory: Arc::clone(&self.directory),
            cache_ttl: self.cache_ttl,
            upstream_timeout: self.upstream_timeout,
        }
    }
}

impl<V: CredentialVault> AuthorizationGate<V> {
    /// Creates a gate with the default cache lifetime and upstream timeout.
    pub fn new(vault: Arc<V>, directory: Arc<dyn ResourceDirectory>) -> Self {
        Self {
            vault,
            directory,
            cache_ttl: DEFAULT_RESOURCE_CACHE_TTL,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Sets how long a fetched resource set stays cached.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the bound on a single listing fetch.
    #[must_use]
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Decides whether `principal` may access `resource_id`.
    #[tracing::instrument(skip_all, fields(principal = %principal, resource = %resource_id))]
    pub async fn authorize(
        &self,
        principal: &PrincipalId,
        resource_id: &ResourceId,
        credential: &UpstreamCredential,
    ) -> Decision {
        if let Some(cached) = self.vault.retrieve_authorized_resources(principal).await {
            tracing::debug!(count = cached.len(), "authorized resources cache hit");
            return decide(&cached, resource_id);
        }

        tracing::debug!("authorized resources cache miss, fetching listing");
        let fresh = match self.fetch_resources(principal, credential).await {
            Ok(fresh) => fresh,
            Err(err) => {
                tracing::warn!(error = %err, "resource listing unavailable");
                return Decision::Deny(DenyReason::Unavailable);
            },
        };

        if fresh.is_empty() {
            tracing::debug!("upstream listing holds no resources, not caching");
        } else {
            self.vault.store_authorized_resources(principal, &fresh, self.cache_ttl).await;
        }
        decide(&fresh, resource_id)
    }

    /// Like [`authorize`](Self::authorize) for the caller in `ctx`.
    pub async fn authorize_context(
        &self,
        ctx: &PrincipalContext,
        resource_id: &ResourceId,
    ) -> Decision {
        self.authorize(ctx.principal(), resource_id, ctx.credential()).await
    }

    /// Like [`authorize_context`](Self::authorize_context), mapping denials
    /// into errors.
    ///
    /// # Errors
    ///
    /// See [`Decision::into_result`].
    pub async fn require(
        &self,
        ctx: &PrincipalContext,
        resource_id: &ResourceId,
    ) -> Result<(), BrokerError> {
        self.authorize_context(ctx, resource_id).await.into_result(resource_id)
    }

    async fn fetch_resources(
        &self,
        principal: &PrincipalId,
        credential: &UpstreamCredential,
    ) -> Result<ResourceSet, UpstreamError> {
        fail_point!("gate-before-upstream-fetch", |_| {
            Err(UpstreamError::unreachable("injected failure before listing fetch"))
        });

        let listing = tokio::time::timeout(
            self.upstream_timeout,
            self.directory.fetch_listing(principal, credential),
        )
        .await
        .map_err(|_| UpstreamError::Timeout { timeout: self.upstream_timeout })??;

        parse_listing(&listing)
    }
}

fn decide(resources: &ResourceSet, resource_id: &ResourceId) -> Decision {
    if resources.contains(resource_id) {
        Decision::Allow
    } else {
        tracing::warn!(resource = %resource_id, "denied access to resource outside authorized set");
        Decision::Deny(DenyReason::Forbidden)
    }
}
