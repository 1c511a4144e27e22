//! Authentication error types.
//!
//! This module defines errors that can occur while issuing, decoding and
//! validating session tokens.

use thiserror::Error;

use crate::jwt::TokenType;

/// Session token errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Malformed token: cannot be decoded.
    #[error("Invalid token format: {0}")]
    InvalidTokenFormat(String),

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Algorithm not in allowed list.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Required claim is missing or empty.
    #[error("Missing claim: {0}")]
    MissingClaim(String),

    /// A well-formed token of the other kind was presented.
    #[error("Wrong token type: expected {expected}, got {actual}")]
    WrongTokenType {
        /// Kind the caller required.
        expected: TokenType,
        /// Kind carried by the token.
        actual: TokenType,
    },

    /// Signing key material could not be loaded.
    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),

    /// A token could not be produced.
    #[error("Token encoding failed: {0}")]
    TokenEncoding(String),
}

impl AuthError {
    /// Creates an [`AuthError::InvalidTokenFormat`] error.
    #[must_use]
    pub fn invalid_token_format(message: impl Into<String>) -> Self {
        Self::InvalidTokenFormat(message.into())
    }

    /// Creates an [`AuthError::TokenExpired`] error.
    #[must_use]
    pub fn token_expired() -> Self {
        Self::TokenExpired
    }

    /// Creates an [`AuthError::UnsupportedAlgorithm`] error.
    #[must_use]
    pub fn unsupported_algorithm(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm(message.into())
    }

    /// Creates an [`AuthError::MissingClaim`] error.
    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim(claim.into())
    }

    /// Creates an [`AuthError::WrongTokenType`] error.
    #[must_use]
    pub fn wrong_token_type(expected: TokenType, actual: TokenType) -> Self {
        Self::WrongTokenType { expected, actual }
    }

    /// Creates an [`AuthError::InvalidSigningKey`] error.
    #[must_use]
    pub fn invalid_signing_key(message: impl Into<String>) -> Self {
        Self::InvalidSigningKey(message.into())
    }

    /// Creates an [`AuthError::TokenEncoding`] error.
    #[must_use]
    pub fn token_encoding(message: impl Into<String>) -> Self {
        Self::TokenEncoding(message.into())
    }

    /// Returns `true` if the token was genuine but is past its expiry.
    ///
    /// Callers use this to tell "log in again" apart from "this token was
    /// never ours".
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken => {
                AuthError::InvalidTokenFormat("Invalid JWT structure".into())
            },
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAlgorithm => {
                AuthError::UnsupportedAlgorithm("Algorithm not supported".into())
            },
            ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
            ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                AuthError::InvalidSigningKey(err.to_string())
            },
            _ => AuthError::InvalidTokenFormat(format!("JWT error: {}", err)),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
