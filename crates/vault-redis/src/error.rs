//! Error types for the Redis vault backend.
//!
//! [`RedisVaultError`] is what the fallible `try_*` methods on
//! [`RedisVault`](crate::RedisVault) produce; it converts into the generic
//! [`VaultError`] so callers can classify failures without depending on the
//! redis crate.

use std::{sync::Arc, time::Duration};

use progress_common_vault::{ConfigError, VaultError};
use redis::{ErrorKind, RedisError};
use thiserror::Error;

/// Result type alias for Redis vault operations.
pub type Result<T> = std::result::Result<T, RedisVaultError>;

/// Errors specific to the Redis vault backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RedisVaultError {
    /// The configuration was rejected before connecting.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The Redis client reported an error.
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// A command did not complete within its time bound.
    #[error("Redis {operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Bound that was exceeded.
        timeout: Duration,
    },
}

impl RedisVaultError {
    pub(crate) fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }
}

impl From<RedisVaultError> for VaultError {
    fn from(err: RedisVaultError) -> Self {
        match err {
            RedisVaultError::Config(source) => {
                VaultError::internal_with_source("Invalid Redis configuration", source)
            },
            RedisVaultError::Redis(source) => redis_error_to_vault_error(source),
            RedisVaultError::Timeout { operation, timeout } => {
                tracing::warn!(
                    operation,
                    timeout_ms = timeout.as_millis() as u64,
                    "Redis command timed out"
                );
                VaultError::timeout()
            },
        }
    }
}

fn redis_error_to_vault_error(err: RedisError) -> VaultError {
    if err.is_timeout() {
        return VaultError::timeout();
    }
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        return VaultError::connection_with_source("Redis unreachable", err);
    }
    match err.kind() {
        ErrorKind::TypeError => VaultError::Serialization {
            message: "Unexpected value stored in Redis".to_owned(),
            source: Some(Arc::new(err)),
        },
        _ => VaultError::internal_with_source("Redis command failed", err),
    }
}
