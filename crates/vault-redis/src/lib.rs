//! Redis-backed implementation of
//! [`CredentialVault`](progress_common_vault::CredentialVault) for the
//! Progress session broker.
//!
//! This crate provides [`RedisVault`], a vault backend that keeps upstream
//! credentials and authorized resource sets in a shared Redis deployment so
//! that several broker instances can serve the same sessions.
//!
//! # Features
//!
//! - **Shared state**: every broker instance reads the same entries
//! - **Native expiry**: TTLs are enforced by Redis with millisecond precision
//! - **Bounded latency**: every command runs under a configurable timeout
//! - **Graceful degradation**: Redis failures surface as misses, not panics
//!
//! # Quick Start
//!
//! ```no_run
//! // Requires a running Redis server.
//! use std::time::Duration;
//!
//! use progress_common_vault::{CredentialVault, PrincipalId, UpstreamCredential};
//! use progress_common_vault_redis::{RedisVault, RedisVaultConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisVaultConfig::builder()
//!         .url("redis://localhost:6379/0")
//!         .build()?;
//!
//!     let vault = RedisVault::connect(config).await?;
//!
//!     let principal = PrincipalId::from("user-1");
//!     let credential = UpstreamCredential::new("ext-abc123");
//!     vault.store_credential(&principal, &credential, Duration::from_secs(3600)).await;
//!
//!     let stored = vault.retrieve_credential(&principal).await;
//!     assert_eq!(stored.as_ref().map(UpstreamCredential::expose), Some("ext-abc123"));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Key Layout
//!
//! | Operation                       | Redis                                                  |
//! | ------------------------------- | ------------------------------------------------------ |
//! | `store_credential`              | `SET <prefix>token:<principal> <credential> PX <ttl>`  |
//! | `retrieve_credential`           | `GET <prefix>token:<principal>`                        |
//! | `remove_credential`             | `DEL <prefix>token:<principal> <prefix>cards:<principal>` |
//! | `store_authorized_resources`    | `MULTI; DEL; SADD <prefix>cards:<principal> ...; PEXPIRE; EXEC` |
//! | `retrieve_authorized_resources` | `SMEMBERS <prefix>cards:<principal>`                   |
//!
//! The default prefix is `ext:`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod keys;

/// Shared test utilities for Redis vault testing.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

/// Redis-backed credential vault.
pub use backend::RedisVault;
/// Configuration types and default constants for the Redis backend.
pub use config::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEY_PREFIX, RedisVaultConfig,
};
/// Redis-specific error types and result alias.
pub use error::{RedisVaultError, Result};
/// Configuration validation error type.
pub use progress_common_vault::ConfigError;
