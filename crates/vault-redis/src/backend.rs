//! Redis-backed credential vault.
//!
//! This module provides [`RedisVault`], which implements
//! [`CredentialVault`] on top of a shared Redis deployment so that several
//! broker instances see the same upstream credentials and resource sets.

use std::{collections::HashSet, future::Future, time::Duration};

use async_trait::async_trait;
use progress_common_vault::{
    CredentialVault, PrincipalId, ResourceId, ResourceSet, UpstreamCredential, VaultError,
    VaultResult,
};
use redis::{AsyncCommands, Client, RedisResult, aio::ConnectionManager};

use crate::{
    config::RedisVaultConfig,
    error::{RedisVaultError, Result},
    keys::KeySpace,
};

/// Longest expiry handed to Redis; larger TTLs are clamped.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

const BACKEND_NAME: &str = "redis";

/// Redis-backed implementation of [`CredentialVault`].
///
/// Credentials are stored as plain string values and resource sets as Redis
/// sets, both with native expiry (see the crate-level key layout). Entries
/// are written with millisecond precision, so expiry behaves like
/// [`MemoryVault`](progress_common_vault::MemoryVault) without a sweeper.
///
/// # Failure handling
///
/// The [`CredentialVault`] methods never fail: a Redis error is logged and
/// treated as a miss (reads) or a no-op (writes). A broker that loses Redis
/// therefore denies access and asks callers to log in again rather than
/// crashing. Use the `try_*` methods when the failure itself matters.
///
/// [`clear`](CredentialVault::clear) and [`size`](CredentialVault::size) are
/// not supported against a shared deployment; they log a warning and do
/// nothing.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use progress_common_vault::{CredentialVault, PrincipalId, UpstreamCredential};
/// use progress_common_vault_redis::{RedisVault, RedisVaultConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RedisVaultConfig::builder().url("redis://localhost:6379").build()?;
/// let vault = RedisVault::connect(config).await?;
///
/// let principal = PrincipalId::from("user-1");
/// vault
///     .store_credential(&principal, &UpstreamCredential::new("ext-abc"), Duration::from_secs(3600))
///     .await;
/// assert!(vault.credential_exists(&principal).await);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisVault {
    conn: ConnectionManager,
    keys: KeySpace,
    command_timeout: Duration,
}

impl std::fmt::Debug for RedisVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisVault")
            .field("keys", &self.keys)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisVault {
    /// Validates `config` and opens a managed connection.
    ///
    /// The connection manager reconnects on its own after the initial
    /// connection succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RedisVaultError::Config`] for an invalid configuration,
    /// [`RedisVaultError::Redis`] if the server cannot be reached, and
    /// [`RedisVaultError::Timeout`] if connecting takes longer than the
    /// configured connect timeout.
    #[tracing::instrument(skip_all, fields(url = %config.redacted_url()))]
    pub async fn connect(config: RedisVaultConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::open(config.url.as_str())?;
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| RedisVaultError::timeout("connect", config.connect_timeout))??;

        tracing::info!(key_prefix = %config.key_prefix, "connected to redis vault");
        Ok(Self {
            conn,
            keys: KeySpace::new(config.key_prefix),
            command_timeout: config.command_timeout,
        })
    }

    /// Runs one command under the configured time bound.
    async fn run<T>(
        &self,
        operation: &'static str,
        command: impl Future<Output = RedisResult<T>>,
    ) -> VaultResult<T> {
        match tokio::time::timeout(self.command_timeout, command).await {
            Ok(result) => result.map_err(|e| VaultError::from(RedisVaultError::from(e))),
            Err(_) => Err(RedisVaultError::timeout(operation, self.command_timeout).into()),
        }
    }

    /// Checks that the server answers.
    ///
    /// # Errors
    ///
    /// Returns a transient [`VaultError`] if Redis is unreachable or slow.
    pub async fn ping(&self) -> VaultResult<()> {
        let mut conn = self.conn.clone();
        let command = redis::cmd("PING");
        let _: String = self.run("ping", command.query_async(&mut conn)).await?;
        Ok(())
    }

    /// Stores `credential` for `principal`, replacing any previous value.
    ///
    /// A zero `ttl` removes the entry instead, since it would never be live.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] if the write fails or times out.
    pub async fn try_store_credential(
        &self,
        principal: &PrincipalId,
        credential: &UpstreamCredential,
        ttl: Duration,
    ) -> VaultResult<()> {
        let key = self.keys.credential_key(principal);
        let mut conn = self.conn.clone();
        if ttl.is_zero() {
            return self.run("del", conn.del::<_, ()>(&key)).await;
        }
        self.run("pset_ex", conn.pset_ex::<_, _, ()>(&key, credential.expose(), ttl_millis(ttl)))
            .await
    }

    /// Reads the credential stored for `principal`.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] if the read fails or times out.
    pub async fn try_retrieve_credential(
        &self,
        principal: &PrincipalId,
    ) -> VaultResult<Option<UpstreamCredential>> {
        let key = self.keys.credential_key(principal);
        let mut conn = self.conn.clone();
        let value = self.run("get", conn.get::<_, Option<String>>(&key)).await?;
        Ok(value.filter(|v| !v.trim().is_empty()).map(UpstreamCredential::new))
    }

    /// Removes the credential and resource set stored for `principal`.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] if the delete fails or times out.
    pub async fn try_remove_credential(&self, principal: &PrincipalId) -> VaultResult<()> {
        let keys = vec![self.keys.credential_key(principal), self.keys.resources_key(principal)];
        let mut conn = self.conn.clone();
        self.run("del", conn.del::<_, ()>(keys)).await
    }

    /// Returns whether a credential is stored for `principal`.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] if the check fails or times out.
    pub async fn try_credential_exists(&self, principal: &PrincipalId) -> VaultResult<bool> {
        let key = self.keys.credential_key(principal);
        let mut conn = self.conn.clone();
        self.run("exists", conn.exists::<_, bool>(&key)).await
    }

    /// Replaces the resource set stored for `principal`.
    ///
    /// The delete, add and expire run as one atomic transaction so readers
    /// never see a merged set or a set without expiry.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] if the transaction fails or times out.
    pub async fn try_store_authorized_resources(
        &self,
        principal: &PrincipalId,
        resources: &ResourceSet,
        ttl: Duration,
    ) -> VaultResult<()> {
        let key = self.keys.resources_key(principal);
        let mut conn = self.conn.clone();
        if ttl.is_zero() {
            return self.run("del", conn.del::<_, ()>(&key)).await;
        }

        let members: Vec<&str> = resources.iter().map(ResourceId::as_str).collect();
        let ttl_ms = i64::try_from(ttl_millis(ttl)).unwrap_or(i64::MAX);
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(&key)
            .ignore()
            .sadd(&key, members)
            .ignore()
            .pexpire(&key, ttl_ms)
            .ignore();

        self.run("store_resources", pipe.query_async(&mut conn)).await
    }

    /// Reads the resource set stored for `principal`.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError`] if the read fails or times out.
    pub async fn try_retrieve_authorized_resources(
        &self,
        principal: &PrincipalId,
    ) -> VaultResult<Option<ResourceSet>> {
        let key = self.keys.resources_key(principal);
        let mut conn = self.conn.clone();
        let members = self.run("smembers", conn.smembers::<_, HashSet<String>>(&key)).await?;
        if members.is_empty() {
            return Ok(None);
        }
        Ok(Some(members.into_iter().map(ResourceId::from).collect()))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    let ttl = ttl.min(MAX_TTL);
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn log_failure(operation: &'static str, err: &VaultError) {
    if err.is_transient() {
        tracing::warn!(operation, error = %err, "redis vault unavailable, treating as miss");
    } else {
        tracing::error!(operation, error = %err, "redis vault operation failed");
    }
}

#[async_trait]
impl CredentialVault for RedisVault {
    #[tracing::instrument(name = "store_credential", skip_all, fields(principal = %principal))]
    async fn store_credential(
        &self,
        principal: &PrincipalId,
        credential: &UpstreamCredential,
        ttl: Duration,
    ) {
        if principal.is_blank() {
            tracing::warn!("refusing to store credential for blank principal");
            return;
        }
        if credential.is_blank() {
            tracing::warn!("refusing to store blank credential");
            return;
        }

        match self.try_store_credential(principal, credential, ttl).await {
            Ok(()) => tracing::debug!(ttl_secs = ttl.as_secs(), "stored upstream credential"),
            Err(err) => log_failure("store_credential", &err),
        }
    }

    #[tracing::instrument(name = "retrieve_credential", skip_all, fields(principal = %principal))]
    async fn retrieve_credential(&self, principal: &PrincipalId) -> Option<UpstreamCredential> {
        if principal.is_blank() {
            return None;
        }
        self.try_retrieve_credential(principal)
            .await
            .inspect_err(|err| log_failure("retrieve_credential", err))
            .ok()
            .flatten()
    }

    #[tracing::instrument(name = "remove_credential", skip_all, fields(principal = %principal))]
    async fn remove_credential(&self, principal: &PrincipalId) {
        if principal.is_blank() {
            return;
        }
        match self.try_remove_credential(principal).await {
            Ok(()) => tracing::debug!("removed upstream credential and resource set"),
            Err(err) => log_failure("remove_credential", &err),
        }
    }

    #[tracing::instrument(name = "credential_exists", skip_all, fields(principal = %principal))]
    async fn credential_exists(&self, principal: &PrincipalId) -> bool {
        if principal.is_blank() {
            return false;
        }
        self.try_credential_exists(principal)
            .await
            .inspect_err(|err| log_failure("credential_exists", err))
            .unwrap_or(false)
    }

    #[tracing::instrument(
        name = "store_authorized_resources",
        skip_all,
        fields(principal = %principal, count = resources.len())
    )]
    async fn store_authorized_resources(
        &self,
        principal: &PrincipalId,
        resources: &ResourceSet,
        ttl: Duration,
    ) {
        if principal.is_blank() || resources.is_empty() {
            tracing::debug!("ignoring empty authorized resource set");
            return;
        }

        match self.try_store_authorized_resources(principal, resources, ttl).await {
            Ok(()) => tracing::debug!("cached authorized resources"),
            Err(err) => log_failure("store_authorized_resources", &err),
        }
    }

    #[tracing::instrument(
        name = "retrieve_authorized_resources",
        skip_all,
        fields(principal = %principal)
    )]
    async fn retrieve_authorized_resources(&self, principal: &PrincipalId) -> Option<ResourceSet> {
        if principal.is_blank() {
            return None;
        }
        self.try_retrieve_authorized_resources(principal)
            .await
            .inspect_err(|err| log_failure("retrieve_authorized_resources", err))
            .ok()
            .flatten()
    }

    async fn clear(&self) {
        let err = VaultError::unsupported(BACKEND_NAME, "clear");
        tracing::warn!(error = %err, "clear is not supported on a shared redis vault, ignoring");
    }

    async fn size(&self) -> usize {
        let err = VaultError::unsupported(BACKEND_NAME, "size");
        tracing::warn!(error = %err, "size is not supported on a shared redis vault, reporting 0");
        0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_rounds_sub_millisecond_up() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_millis(1500)), 1500);
    }

    #[test]
    fn test_ttl_millis_clamps_huge_ttl() {
        assert_eq!(ttl_millis(Duration::MAX), MAX_TTL.as_millis() as u64);
        assert!(i64::try_from(ttl_millis(Duration::MAX)).is_ok());
    }
}
