//! # Progress Common Authentication
//!
//! Session token types and utilities for the Progress session broker.
//!
//! This crate provides:
//! - **Token codec**: issuing and validating signed access and refresh tokens
//! - **Revocation registry**: early invalidation of tokens until their natural expiry
//! - **Algorithm validation**: security checks for JWT algorithms
//!
//! ## Features
//!
//! - Only EdDSA (Ed25519) is supported
//! - Symmetric algorithms (HS256, etc.) and `none` are explicitly rejected
//! - Signing key material is scrubbed from memory on drop
//!
//! ## Example
//!
//! ```
//! use chrono::TimeDelta;
//! use progress_common_authn::{
//!     InMemoryRevocationRegistry, RevocationRegistry, SigningKeyPair, TokenCodec, TokenType,
//! };
//! use progress_common_vault::PrincipalId;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = TokenCodec::new(SigningKeyPair::generate()?);
//! let registry = InMemoryRevocationRegistry::new();
//!
//! let token = codec.issue(&PrincipalId::from("u1"), TokenType::Access, TimeDelta::minutes(15))?;
//! let claims = codec.verify(&token)?;
//!
//! registry.revoke(&token, claims.expires_at()).await;
//! assert!(registry.is_revoked(&token).await);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Authentication error types.
pub mod error;
/// Session token issuance and validation.
pub mod jwt;
/// Early invalidation of session tokens.
pub mod revocation;
/// Shared test utilities.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
/// Algorithm validation.
pub mod validation;

// Re-export key types for convenience
pub use error::{AuthError, Result};
pub use jwt::{SessionClaims, SigningKeyPair, TokenCodec, TokenType};
pub use revocation::{
    DEFAULT_REVOCATION_SWEEP_INTERVAL, InMemoryRevocationRegistry, RevocationRegistry,
};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
