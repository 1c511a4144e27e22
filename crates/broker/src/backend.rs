//! Vault backend selection.

use std::time::Duration;

use async_trait::async_trait;
use progress_common_vault::{
    CredentialVault, MemoryVault, PrincipalId, ResourceSet, UpstreamCredential,
};
use progress_common_vault_redis::RedisVault;

use crate::{config::VaultConfig, error::BrokerError};

/// The credential vault chosen by [`VaultConfig`].
///
/// Dispatches statically to the selected backend.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum VaultBackend {
    /// In-process vault.
    Memory(MemoryVault),
    /// Shared Redis vault.
    Redis(RedisVault),
}

impl VaultBackend {
    /// Builds the backend described by `config`.
    ///
    /// The in-process vault starts its background sweeper; the Redis vault
    /// connects eagerly.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::Config`] for an invalid configuration
    /// - [`BrokerError::BackendUnavailable`] if Redis cannot be reached
    pub async fn from_config(config: &VaultConfig) -> Result<Self, BrokerError> {
        config.validate()?;
        match config {
            VaultConfig::Memory { sweep_interval } => {
                Ok(Self::Memory(MemoryVault::new().with_sweep_interval(*sweep_interval)))
            },
            VaultConfig::Redis(redis) => RedisVault::connect(redis.clone())
                .await
                .map(Self::Redis)
                .map_err(|e| BrokerError::backend_unavailable("failed to connect to redis vault", e)),
        }
    }

    /// Short backend name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }

    /// Stops background work owned by the backend.
    pub fn shutdown(&self) {
        if let Self::Memory(vault) = self {
            vault.shutdown();
        }
    }
}

impl From<MemoryVault> for VaultBackend {
    fn from(vault: MemoryVault) -> Self {
        Self::Memory(vault)
    }
}

impl From<RedisVault> for VaultBackend {
    fn from(vault: RedisVault) -> Self {
        Self::Redis(vault)
    }
}

#[async_trait]
impl CredentialVault for VaultBackend {
    async fn store_credential(
        &self,
        principal: &PrincipalId,
        credential: &UpstreamCredential,
        ttl: Duration,
    ) {
        match self {
            Self::Memory(v) => v.store_credential(principal, credential, ttl).await,
            Self::Redis(v) => v.store_credential(principal, credential, ttl).await,
        }
    }

    async fn retrieve_credential(&self, principal: &PrincipalId) -> Option<UpstreamCredential> {
        match self {
            Self::Memory(v) => v.retrieve_credential(principal).await,
            Self::Redis(v) => v.retrieve_credential(principal).await,
        }
    }

    async fn remove_credential(&self, principal: &PrincipalId) {
        match self {
            Self::Memory(v) => v.remove_credential(principal).await,
            Self::Redis(v) => v.remove_credential(principal).await,
        }
    }

    async fn credential_exists(&self, principal: &PrincipalId) -> bool {
        match self {
            Self::Memory(v) => v.credential_exists(principal).await,
            Self::Redis(v) => v.credential_exists(principal).await,
        }
    }

    async fn store_authorized_resources(
        &self,
        principal: &PrincipalId,
        resources: &ResourceSet,
        ttl: Duration,
    ) {
        match self {
            Self::Memory(v) => v.store_authorized_resources(principal, resources, ttl).await,
            Self::Redis(v) => v.store_authorized_resources(principal, resources, ttl).await,
        }
    }

    async fn retrieve_authorized_resources(&self, principal: &PrincipalId) -> Option<ResourceSet> {
        match self {
            Self::Memory(v) => v.retrieve_authorized_resources(principal).await,
            Self::Redis(v) => v.retrieve_authorized_resources(principal).await,
        }
    }

    async fn clear(&self) {
        match self {
            Self::Memory(v) => v.clear().await,
            Self::Redis(v) => v.clear().await,
        }
    }

    async fn size(&self) -> usize {
        match self {
            Self::Memory(v) => v.size().await,
            Self::Redis(v) => v.size().await,
        }
    }
}
