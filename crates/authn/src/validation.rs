//! JWT algorithm validation.
//!
//! This module checks the `alg` header of a presented session token before any
//! signature work is done.
//!
//! # Security
//!
//! - Strict algorithm checks to prevent algorithm substitution attacks
//! - Only EdDSA (Ed25519) is allowed
//! - Symmetric algorithms and "none" are always rejected
//!
//! The header is read from the raw token rather than through
//! [`jsonwebtoken::decode_header`], which cannot represent `"alg": "none"` and
//! would report it as a generic format error.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::error::AuthError;

/// Forbidden JWT algorithms that are never accepted for security reasons.
///
/// These algorithms are blocked because:
/// - `none`: No signature verification (trivially bypassable)
/// - `HS256`, `HS384`, `HS512`: Symmetric algorithms (shared secret vulnerability)
///
/// Only EdDSA (Ed25519) is currently supported.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms.
///
/// [`TokenCodec`](crate::TokenCodec) signs every session token with an
/// Ed25519 key, so EdDSA is the only algorithm it can verify. Per RFC 8725
/// Section 3.1, validators must reject algorithms they do not fully
/// implement.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["EdDSA"];

/// Validate JWT algorithm against security policies.
///
/// This function enforces strict algorithm security per RFC 8725:
/// - ALWAYS rejects symmetric algorithms (HS256, HS384, HS512)
/// - ALWAYS rejects "none" algorithm
/// - Only accepts EdDSA (Ed25519)
///
/// # Arguments
///
/// * `alg` - The algorithm from the JWT header
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if:
/// - Algorithm is symmetric (HS256, HS384, HS512)
/// - Algorithm is "none"
/// - Algorithm is not in [`ACCEPTED_ALGORITHMS`]
///
/// # Examples
///
/// ```
/// use progress_common_authn::validation::validate_algorithm;
///
/// // EdDSA is accepted
/// let result = validate_algorithm("EdDSA");
/// assert!(result.is_ok());
///
/// // RS256 is not currently supported
/// let result = validate_algorithm("RS256");
/// assert!(result.is_err());
///
/// // Symmetric algorithm rejected
/// let result = validate_algorithm("HS256");
/// assert!(result.is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    // Check against forbidden algorithms
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    // Check if in accepted list
    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not in accepted list (only EdDSA is supported)"
        )));
    }

    Ok(())
}

/// Reads the `alg` header of a compact JWT and applies [`validate_algorithm`].
///
/// # Errors
///
/// Returns [`AuthError::InvalidTokenFormat`] if the token does not have three
/// segments or the header is not base64url-encoded JSON with a string `alg`,
/// and [`AuthError::UnsupportedAlgorithm`] if the algorithm is not accepted.
///
/// # Examples
///
/// ```
/// use progress_common_authn::validation::validate_token_algorithm;
///
/// // {"alg":"none","typ":"JWT"}
/// let unsigned = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.e30.";
/// assert!(validate_token_algorithm(unsigned).is_err());
/// ```
pub fn validate_token_algorithm(token: &str) -> Result<(), AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::invalid_token_format("JWT must have 3 parts separated by dots"));
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|e| {
        AuthError::invalid_token_format(format!("Failed to decode JWT header: {e}"))
    })?;
    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        AuthError::invalid_token_format(format!("Failed to parse JWT header: {e}"))
    })?;
    let alg = header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| AuthError::invalid_token_format("JWT header missing 'alg' field"))?;

    validate_algorithm(alg)
}
