//! # Progress Session Broker
//!
//! Session and authorization broker sitting between clients and the
//! upstream academic-records system.
//!
//! A client logs in once with its upstream username and password. The broker
//! keeps the upstream credential server-side and hands the client a pair of
//! signed session tokens instead. On every request it resolves the access
//! token back to the principal and its upstream credential, and checks that
//! the requested resource belongs to that principal.
//!
//! ## Components
//!
//! - [`LoginOrchestrator`]: login, refresh and logout
//! - [`SessionMiddleware`]: `Authorization` header to [`PrincipalContext`]
//! - [`AuthorizationGate`]: per-resource allow/deny against cached listings
//! - [`VaultBackend`]: in-memory or Redis credential vault
//! - [`Broker`]: all of the above wired from one [`BrokerConfig`]
//!
//! Token issuance and revocation live in `progress-common-authn`; the vault
//! abstraction lives in `progress-common-vault`.
//!
//! ## Request flow
//!
//! ```text
//! Authorization: Bearer <access token>
//!        │
//!        ▼
//! SessionMiddleware ── revoked? ── bad signature / expired? ── no credential?
//!        │                              (any: no context)
//!        ▼
//! PrincipalContext ──▶ AuthorizationGate ── cached set ──▶ Allow | Forbidden
//!                                         └─ miss: fetch listing, cache ──┘
//!                                            (unusable: Unavailable)
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Vault backend selection.
pub mod backend;
mod broker;
/// Broker configuration.
pub mod config;
/// Broker error taxonomy.
pub mod error;
/// Per-resource authorization.
pub mod gate;
/// Login, refresh and logout.
pub mod login;
/// Per-request session resolution.
pub mod middleware;
/// Shared test utilities.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
/// Upstream collaborator traits.
pub mod upstream;

pub use backend::VaultBackend;
pub use broker::Broker;
pub use config::{BrokerConfig, TokenConfig, VaultConfig};
pub use error::{BrokerError, Result, UpstreamFailureKind, UserAction};
pub use gate::{
    AuthorizationGate, DEFAULT_RESOURCE_CACHE_TTL, DEFAULT_UPSTREAM_TIMEOUT, Decision, DenyReason,
    parse_listing,
};
pub use login::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, LoginOrchestrator, TokenPair};
pub use middleware::{PrincipalContext, SessionMiddleware, bearer_token};
pub use upstream::{ResourceDirectory, UpstreamAuthenticator, UpstreamError, UpstreamIdentity};
