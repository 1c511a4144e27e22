//! Broker configuration.
//!
//! All durations are written in humantime form (`"15m"`, `"7d"`) when loaded
//! through serde. Builders validate on construction; deserialized values are
//! checked by [`BrokerConfig::validate`], which
//! [`Broker::from_config`](crate::Broker::from_config) always calls.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use progress_common_authn::{AuthError, DEFAULT_REVOCATION_SWEEP_INTERVAL, SigningKeyPair};
use progress_common_vault::{ConfigError, DEFAULT_SWEEP_INTERVAL};
use progress_common_vault_redis::RedisVaultConfig;
use serde::{Deserialize, Serialize};

use crate::{
    gate::{DEFAULT_RESOURCE_CACHE_TTL, DEFAULT_UPSTREAM_TIMEOUT},
    login::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL},
};

fn default_access_ttl() -> Duration {
    DEFAULT_ACCESS_TTL
}

fn default_refresh_ttl() -> Duration {
    DEFAULT_REFRESH_TTL
}

fn default_sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

fn default_revocation_sweep_interval() -> Duration {
    DEFAULT_REVOCATION_SWEEP_INTERVAL
}

fn default_resource_cache_ttl() -> Duration {
    DEFAULT_RESOURCE_CACHE_TTL
}

fn default_upstream_timeout() -> Duration {
    DEFAULT_UPSTREAM_TIMEOUT
}

fn check_nonzero(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::ZeroDuration { field });
    }
    Ok(())
}

fn check_token_lifetime(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    check_nonzero(field, value)?;
    let ttl = TimeDelta::from_std(value)
        .map_err(|e| ConfigError::Invalid { field, reason: e.to_string() })?;
    Utc::now().checked_add_signed(ttl).map(|_| ()).ok_or_else(|| ConfigError::Invalid {
        field,
        reason: "token expiry would be out of range".into(),
    })
}

// ============================================================================
// Tokens
// ============================================================================

/// Session token lifetimes and signing key.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use progress_common_broker::TokenConfig;
///
/// let config = TokenConfig::builder()
///     .access_ttl(Duration::from_secs(300))
///     .build()
///     .expect("valid token config");
///
/// assert_eq!(config.refresh_ttl(), Duration::from_secs(7 * 24 * 60 * 60));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    #[serde(with = "humantime_serde", default = "default_access_ttl")]
    pub(crate) access_ttl: Duration,
    #[serde(with = "humantime_serde", default = "default_refresh_ttl")]
    pub(crate) refresh_ttl: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) signing_seed: Option<String>,
}

#[bon::bon]
impl TokenConfig {
    /// Creates a validated token configuration.
    ///
    /// Without a `signing_seed` a fresh key is generated at startup, so
    /// tokens do not survive a restart and are not accepted by other
    /// instances.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a lifetime is zero or out of range, or the
    /// seed is not 32 base64url-encoded bytes.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_ACCESS_TTL)] access_ttl: Duration,
        #[builder(default = DEFAULT_REFRESH_TTL)] refresh_ttl: Duration,
        #[builder(into)] signing_seed: Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self { access_ttl, refresh_ttl, signing_seed };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_token_lifetime("access_ttl", self.access_ttl)?;
        check_token_lifetime("refresh_ttl", self.refresh_ttl)?;
        if let Some(seed) = &self.signing_seed {
            SigningKeyPair::from_base64_seed(seed)
                .map_err(|e| ConfigError::Invalid { field: "signing_seed", reason: e.to_string() })?;
        }
        Ok(())
    }

    /// Access token lifetime.
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime, also used for the stored upstream credential.
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Returns `true` if a fixed signing seed is configured.
    #[must_use]
    pub fn has_signing_seed(&self) -> bool {
        self.signing_seed.is_some()
    }

    /// Loads the configured signing key, or generates one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSigningKey`] for a malformed seed.
    pub fn signing_keys(&self) -> Result<SigningKeyPair, AuthError> {
        match &self.signing_seed {
            Some(seed) => SigningKeyPair::from_base64_seed(seed),
            None => {
                tracing::warn!("no signing seed configured, generating an ephemeral key");
                SigningKeyPair::generate()
            },
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            signing_seed: None,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("signing_seed", &self.signing_seed.as_ref().map(|_| "***"))
            .finish()
    }
}

// ============================================================================
// Vault
// ============================================================================

/// Which credential vault backend to run.
///
/// Serialized externally tagged:
///
/// ```
/// use progress_common_broker::VaultConfig;
///
/// let memory: VaultConfig = serde_json::from_str(r#"{"memory": {"sweep_interval": "1m"}}"#)?;
/// let redis: VaultConfig = serde_json::from_str(r#"{"redis": {"url": "redis://cache:6379"}}"#)?;
/// assert!(memory.validate().is_ok());
/// assert!(redis.validate().is_ok());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
#[non_exhaustive]
pub enum VaultConfig {
    /// In-process vault, private to this broker instance.
    Memory {
        /// How often expired entries are reclaimed.
        #[serde(with = "humantime_serde", default = "default_sweep_interval")]
        sweep_interval: Duration,
    },
    /// Shared Redis vault.
    Redis(RedisVaultConfig),
}

impl VaultConfig {
    /// Checks the backend configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero sweep interval or an invalid Redis
    /// configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Memory { sweep_interval } => check_nonzero("sweep_interval", *sweep_interval),
            Self::Redis(redis) => redis.validate(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::Memory { sweep_interval: DEFAULT_SWEEP_INTERVAL }
    }
}

// ============================================================================
// Broker
// ============================================================================

/// Top-level configuration for [`Broker`](crate::Broker).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use progress_common_broker::{BrokerConfig, VaultConfig};
///
/// let config = BrokerConfig::builder()
///     .vault(VaultConfig::Memory { sweep_interval: Duration::from_secs(60) })
///     .resource_cache_ttl(Duration::from_secs(600))
///     .build()
///     .expect("valid broker config");
///
/// assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    #[serde(default)]
    pub(crate) tokens: TokenConfig,
    #[serde(default)]
    pub(crate) vault: VaultConfig,
    #[serde(with = "humantime_serde", default = "default_revocation_sweep_interval")]
    pub(crate) revocation_sweep_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_resource_cache_ttl")]
    pub(crate) resource_cache_ttl: Duration,
    #[serde(with = "humantime_serde", default = "default_upstream_timeout")]
    pub(crate) upstream_timeout: Duration,
}

#[bon::bon]
impl BrokerConfig {
    /// Creates a validated broker configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any nested configuration is invalid or a
    /// duration is zero.
    #[builder]
    pub fn new(
        #[builder(default)] tokens: TokenConfig,
        #[builder(default)] vault: VaultConfig,
        #[builder(default = DEFAULT_REVOCATION_SWEEP_INTERVAL)] revocation_sweep_interval: Duration,
        #[builder(default = DEFAULT_RESOURCE_CACHE_TTL)] resource_cache_ttl: Duration,
        #[builder(default = DEFAULT_UPSTREAM_TIMEOUT)] upstream_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config =
            Self { tokens, vault, revocation_sweep_interval, resource_cache_ttl, upstream_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Checks the whole configuration.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tokens.validate()?;
        self.vault.validate()?;
        check_nonzero("revocation_sweep_interval", self.revocation_sweep_interval)?;
        check_nonzero("resource_cache_ttl", self.resource_cache_ttl)?;
        check_nonzero("upstream_timeout", self.upstream_timeout)
    }

    /// Token settings.
    #[must_use]
    pub fn tokens(&self) -> &TokenConfig {
        &self.tokens
    }

    /// Vault backend settings.
    #[must_use]
    pub fn vault(&self) -> &VaultConfig {
        &self.vault
    }

    /// How often expired revocations are reclaimed.
    #[must_use]
    pub fn revocation_sweep_interval(&self) -> Duration {
        self.revocation_sweep_interval
    }

    /// How long a fetched resource set stays cached.
    #[must_use]
    pub fn resource_cache_ttl(&self) -> Duration {
        self.resource_cache_ttl
    }

    /// Bound on a single upstream call.
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        self.upstream_timeout
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            tokens: TokenConfig::default(),
            vault: VaultConfig::default(),
            revocation_sweep_interval: DEFAULT_REVOCATION_SWEEP_INTERVAL,
            resource_cache_ttl: DEFAULT_RESOURCE_CACHE_TTL,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}
