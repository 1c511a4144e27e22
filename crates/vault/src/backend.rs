//! Credential vault trait definition.
//!
//! This module defines the [`CredentialVault`] trait, the single interface
//! through which the broker stores upstream credentials and the cached set of
//! resources each principal owns. Two implementations exist:
//! [`MemoryVault`](crate::MemoryVault) in this crate and `RedisVault` in
//! `progress-common-vault-redis`.
//!
//! # Design Philosophy
//!
//! - **Infallible at the boundary**: a vault never returns a backend error to its caller. A
//!   failing backend is logged and treated as a miss (reads) or a no-op (writes), so an outage
//!   degrades to "fetch again upstream" or "log in again", never to a crash.
//! - **TTL on every entry**: nothing is stored without an expiry.
//! - **Blank input is never stored**: empty principals, empty credentials and empty resource sets
//!   are rejected before reaching storage.
//!
//! # Implementing a Backend
//!
//! 1. Implement the [`CredentialVault`] trait
//! 2. Map backend-specific errors to [`VaultError`](crate::VaultError) internally
//! 3. Log and absorb those errors before returning from a trait method
//! 4. Run the [`conformance`](crate::conformance) suite against the new backend

use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;

use crate::types::{PrincipalId, ResourceId, UpstreamCredential};

/// Set of resource ids a principal is allowed to read.
pub type ResourceSet = HashSet<ResourceId>;

/// Abstract store of principal → upstream credential and principal → allowed
/// resource ids.
///
/// Implementations must be `Send + Sync`; every method is called concurrently
/// from many in-flight requests. Each method is individually atomic; no
/// method holds a lock across an I/O wait.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`store_credential`](CredentialVault::store_credential) | Store or overwrite a principal's upstream credential |
/// | [`retrieve_credential`](CredentialVault::retrieve_credential) | Fetch a live credential |
/// | [`remove_credential`](CredentialVault::remove_credential) | Drop credential and resource set together |
/// | [`credential_exists`](CredentialVault::credential_exists) | Liveness check without the value |
/// | [`store_authorized_resources`](CredentialVault::store_authorized_resources) | Cache a non-empty allow-list |
/// | [`retrieve_authorized_resources`](CredentialVault::retrieve_authorized_resources) | Fetch the cached allow-list |
/// | [`clear`](CredentialVault::clear) / [`size`](CredentialVault::size) | Administrative |
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use progress_common_vault::{CredentialVault, MemoryVault, PrincipalId, UpstreamCredential};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let vault = MemoryVault::new();
/// let principal = PrincipalId::from("u1");
///
/// vault.store_credential(&principal, &UpstreamCredential::new("up-1"), Duration::from_secs(60)).await;
/// let credential = vault.retrieve_credential(&principal).await;
/// assert_eq!(credential.as_ref().map(UpstreamCredential::expose), Some("up-1"));
/// # });
/// ```
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Stores `credential` for `principal`, replacing any previous entry.
    ///
    /// A blank principal or blank credential is ignored with a warning.
    async fn store_credential(
        &self,
        principal: &PrincipalId,
        credential: &UpstreamCredential,
        ttl: Duration,
    );

    /// Returns the principal's credential if one was stored and its TTL has
    /// not elapsed.
    async fn retrieve_credential(&self, principal: &PrincipalId) -> Option<UpstreamCredential>;

    /// Removes the principal's credential and its cached resource set.
    ///
    /// Removing a principal that has nothing stored is a no-op.
    async fn remove_credential(&self, principal: &PrincipalId);

    /// Returns `true` if a live credential exists for the principal.
    ///
    /// Uses the same expiry semantics as
    /// [`retrieve_credential`](CredentialVault::retrieve_credential).
    async fn credential_exists(&self, principal: &PrincipalId) -> bool;

    /// Caches the set of resource ids `principal` may read.
    ///
    /// An empty set or a blank principal is ignored: an empty allow-list would
    /// lock the principal out after a transient upstream read returned no rows.
    async fn store_authorized_resources(
        &self,
        principal: &PrincipalId,
        resources: &ResourceSet,
        ttl: Duration,
    );

    /// Returns the cached allow-list, or `None` on miss, expiry or an empty
    /// stored set.
    async fn retrieve_authorized_resources(&self, principal: &PrincipalId) -> Option<ResourceSet>;

    /// Removes every entry the backend can enumerate.
    ///
    /// Backends that cannot enumerate their keys log a warning and do nothing.
    async fn clear(&self);

    /// Returns the number of stored credential entries.
    ///
    /// Backends that cannot count their keys cheaply return `0`.
    async fn size(&self) -> usize;
}
