//! Shared test utilities for session token testing.
//!
//! This module provides helpers for building deterministic codecs, signing
//! arbitrary claims with a codec's key, and crafting raw JWT strings (for
//! attack testing). It is feature-gated behind `testutil` to prevent leaking
//! into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! progress-common-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use progress_common_authn::testutil::{craft_raw_jwt, test_codec};
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Header};
use zeroize::Zeroizing;

use crate::jwt::{SEED_LEN, SigningKeyPair, TokenCodec};

/// Seed used by [`test_keypair`]; every call yields the same key pair.
pub const FIXED_SEED: [u8; SEED_LEN] = [
    0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c, 0xc4,
    0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae, 0x7f, 0x60,
];

/// Returns the deterministic key pair built from [`FIXED_SEED`].
///
/// # Panics
///
/// Panics if the fixed seed is rejected (should not happen).
pub fn test_keypair() -> SigningKeyPair {
    SigningKeyPair::from_seed(&Zeroizing::new(FIXED_SEED)).expect("fixed seed is a valid key")
}

/// Returns the base64url form of [`FIXED_SEED`], as it would appear in configuration.
#[must_use]
pub fn fixed_seed_base64() -> String {
    URL_SAFE_NO_PAD.encode(FIXED_SEED)
}

/// Returns a codec signing with [`test_keypair`].
pub fn test_codec() -> TokenCodec {
    TokenCodec::new(test_keypair())
}

/// Signs arbitrary JSON claims with `keys` using EdDSA.
///
/// Useful for producing correctly-signed tokens whose claims the codec would
/// never issue (missing `type`, empty subject, unknown fields).
///
/// # Panics
///
/// Panics if JWT encoding fails (should not happen with valid inputs).
pub fn sign_raw_claims(keys: &SigningKeyPair, claims: &serde_json::Value) -> String {
    jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), claims, keys.encoding_key())
        .expect("Failed to encode test JWT")
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.`
/// with an empty signature. This is useful for testing rejection of
/// malformed or attack JWTs (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Asserts that a [`Result<T, AuthError>`] is an `Err` matching the given [`AuthError`] variant.
///
/// Works with any `AuthError` variant. On failure, prints the expected variant
/// and the actual result for debugging.
///
/// [`AuthError`]: crate::AuthError
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use progress_common_authn::assert_auth_error;
/// use progress_common_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::token_expired());
/// assert_auth_error!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            result,
        );
    }};
    ($result:expr, $variant:ident, $msg:expr) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            result,
        );
    }};
}
