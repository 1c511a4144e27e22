//! Credential vault abstraction for the Progress session broker.
//!
//! This crate provides the [`CredentialVault`] trait and the types shared by
//! every vault backend. The vault holds, per authenticated principal, the
//! opaque upstream credential captured at login and a cached set of resource
//! ids the principal is allowed to read.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Session Broker                         │
//! │    LoginOrchestrator │ SessionMiddleware │ AuthorizationGate │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 progress-common-vault                       │
//! │                 CredentialVault trait                       │
//! │  (store/retrieve/remove credential, authorized resources)   │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryVault  │            RedisVault                        │
//! │ (one process)│   (shared across instances, vault-redis)     │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::{collections::HashSet, time::Duration};
//! use progress_common_vault::{CredentialVault, MemoryVault, PrincipalId, ResourceId};
//!
//! #[tokio::main]
//! async fn main() {
//!     let vault = MemoryVault::new();
//!     let principal = PrincipalId::from("u1");
//!
//!     vault.store_credential(&principal, &"upstream-token".into(), Duration::from_secs(60)).await;
//!
//!     let owned: HashSet<ResourceId> = ["101", "102"].into_iter().map(ResourceId::from).collect();
//!     vault.store_authorized_resources(&principal, &owned, Duration::from_secs(3600)).await;
//!
//!     let cached = vault.retrieve_authorized_resources(&principal).await;
//!     assert!(cached.is_some_and(|set| set.contains("101")));
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Shared between instances |
//! |---------|----------|--------------------------|
//! | [`MemoryVault`] | Single instance, tests | No |
//! | `RedisVault` (in `progress-common-vault-redis`) | Production | Yes |
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the [`conformance`] suite and the `testutil` module with shared test
//!   helpers. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod backend;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::{CredentialVault, ResourceSet};
pub use error::{BoxError, ConfigError, VaultError, VaultResult};
pub use memory::{DEFAULT_SWEEP_INTERVAL, MemoryVault};
pub use types::{PrincipalId, ResourceId, UpstreamCredential, is_blank};
pub use zeroize::Zeroizing;
