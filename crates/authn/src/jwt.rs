//! Session token issuance and validation.
//!
//! Session tokens are compact JWTs signed with Ed25519 (EdDSA). Each token
//! carries exactly four claims:
//!
//! ```json
//! {
//!   "sub": "<principal id>",
//!   "type": "access",
//!   "iat": 1234567800,
//!   "exp": 1234568700
//! }
//! ```
//!
//! Signature and expiry are the sole authority for validity: the codec keeps
//! no record of issued tokens. Early invalidation is the job of the
//! [`RevocationRegistry`](crate::RevocationRegistry).
//!
//! # Example
//!
//! ```
//! use chrono::TimeDelta;
//! use progress_common_authn::{SigningKeyPair, TokenCodec, TokenType};
//! use progress_common_vault::PrincipalId;
//!
//! # fn main() -> Result<(), progress_common_authn::AuthError> {
//! let codec = TokenCodec::new(SigningKeyPair::generate()?);
//! let principal = PrincipalId::from("u1");
//!
//! let token = codec.issue(&principal, TokenType::Access, TimeDelta::minutes(15))?;
//! assert!(codec.validate(&token));
//! assert_eq!(codec.extract_subject(&token)?, principal);
//! assert_eq!(codec.extract_type(&token)?, TokenType::Access);
//!
//! let expired = codec.issue(&principal, TokenType::Access, TimeDelta::seconds(-1))?;
//! assert!(!codec.validate(&expired));
//! # Ok(())
//! # }
//! ```

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use ed25519_dalek::SigningKey;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode};
use progress_common_vault::PrincipalId;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{error::AuthError, validation::validate_token_algorithm};

/// PKCS#8 v1 prefix for an Ed25519 private key; the 32-byte seed follows.
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, // SEQUENCE, 46 bytes
    0x02, 0x01, 0x00, // INTEGER version 0
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
    0x04, 0x22, // OCTET STRING, 34 bytes
    0x04, 0x20, // OCTET STRING, 32 bytes (the actual key)
];

/// Length of an Ed25519 seed in bytes.
pub const SEED_LEN: usize = 32;

/// Kind of session token.
///
/// Access and refresh tokens have independent lifetimes. Consumers that
/// expect one kind must check the type; see [`TokenCodec::verify_typed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token presented on every request.
    Access,
    /// Long-lived token exchanged for a new access token.
    Refresh,
}

impl TokenType {
    /// Returns the wire name of the token type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by a session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the principal the session belongs to.
    pub sub: String,
    /// Token kind.
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
}

impl SessionClaims {
    /// Returns the subject as a [`PrincipalId`].
    #[must_use]
    pub fn principal(&self) -> PrincipalId {
        PrincipalId::from(self.sub.as_str())
    }

    /// Returns the natural expiry of the token.
    ///
    /// Falls back to the Unix epoch for an unrepresentable timestamp, which
    /// callers treat as already expired.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Returns `true` if the token is expired at `now` (no leeway).
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Ed25519 key pair used to sign and verify session tokens.
///
/// The private half is only kept as a [`jsonwebtoken::EncodingKey`]; the
/// seed and DER bytes used to build it are scrubbed on drop.
#[derive(Clone)]
pub struct SigningKeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    public_key: String,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair").field("public_key", &self.public_key).finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Builds a key pair from a 32-byte Ed25519 seed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSigningKey`] if the derived public key is
    /// rejected by the JWT library.
    pub fn from_seed(seed: &Zeroizing<[u8; SEED_LEN]>) -> Result<Self, AuthError> {
        let signing_key = SigningKey::from_bytes(seed);
        let public_key = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());

        let mut pkcs8_der = Zeroizing::new(Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + SEED_LEN));
        pkcs8_der.extend_from_slice(&ED25519_PKCS8_PREFIX);
        pkcs8_der.extend_from_slice(&seed[..]);

        let encoding = EncodingKey::from_ed_der(&pkcs8_der);
        let decoding = DecodingKey::from_ed_components(&public_key)
            .map_err(|e| AuthError::invalid_signing_key(e.to_string()))?;

        Ok(Self { encoding, decoding, public_key })
    }

    /// Builds a key pair from a base64url-encoded (unpadded) 32-byte seed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSigningKey`] if the value is not base64url
    /// or does not decode to exactly 32 bytes.
    pub fn from_base64_seed(encoded: &str) -> Result<Self, AuthError> {
        let bytes = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(encoded.trim())
                .map_err(|e| AuthError::invalid_signing_key(format!("seed is not base64url: {e}")))?,
        );
        let seed: [u8; SEED_LEN] = bytes.as_slice().try_into().map_err(|_| {
            AuthError::invalid_signing_key(format!(
                "seed must be {SEED_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Self::from_seed(&Zeroizing::new(seed))
    }

    /// Generates a fresh random key pair.
    ///
    /// Tokens signed with a generated key do not survive a restart.
    ///
    /// # Errors
    ///
    /// See [`from_seed`](Self::from_seed).
    pub fn generate() -> Result<Self, AuthError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_seed(&Zeroizing::new(signing_key.to_bytes()))
    }

    /// Returns the public key, base64url-encoded without padding.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    #[cfg(any(test, feature = "testutil"))]
    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }
}

/// Stateless signer and verifier of session tokens.
///
/// `TokenCodec` is cheap to clone and safe to share between tasks.
#[derive(Clone)]
pub struct TokenCodec {
    keys: SigningKeyPair,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").field("keys", &self.keys).finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec signing and verifying with `keys`.
    #[must_use]
    pub fn new(keys: SigningKeyPair) -> Self {
        let mut validation = Validation::new(Algorithm::EdDSA);
        // Expiry is checked against the wall clock without leeway in `verify`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self { keys, validation }
    }

    /// Returns the key pair used by this codec.
    #[must_use]
    pub fn keys(&self) -> &SigningKeyPair {
        &self.keys
    }

    /// Issues a signed token for `principal` that expires `ttl` from now.
    ///
    /// A negative `ttl` produces a token that is already expired.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenEncoding`] if the expiry is not representable
    /// or signing fails. Neither happens for a well-formed key and a TTL within
    /// a few thousand years.
    pub fn issue(
        &self,
        principal: &PrincipalId,
        token_type: TokenType,
        ttl: TimeDelta,
    ) -> Result<String, AuthError> {
        self.issue_at(principal, token_type, ttl, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    pub fn issue_at(
        &self,
        principal: &PrincipalId,
        token_type: TokenType,
        ttl: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::token_encoding("token expiry out of range"))?;

        let claims = SessionClaims {
            sub: principal.as_str().to_owned(),
            token_type,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &claims, &self.keys.encoding)
            .map_err(|e| AuthError::token_encoding(e.to_string()))
    }

    /// Verifies a token and returns its claims.
    ///
    /// Checks, in order: structure and algorithm, signature, claim shape,
    /// expiry against the wall clock.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidTokenFormat`] for empty or malformed input
    /// - [`AuthError::UnsupportedAlgorithm`] for any algorithm other than EdDSA
    /// - [`AuthError::InvalidSignature`] if the signature does not verify
    /// - [`AuthError::MissingClaim`] for an empty subject
    /// - [`AuthError::TokenExpired`] if `now >= exp`
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::invalid_token_format("token is empty"));
        }

        validate_token_algorithm(token)?;

        let claims = decode::<SessionClaims>(token, &self.keys.decoding, &self.validation)?.claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::missing_claim("sub"));
        }
        if claims.is_expired_at(now) {
            return Err(AuthError::token_expired());
        }

        Ok(claims)
    }

    /// Verifies a token and additionally requires it to be of `expected` kind.
    ///
    /// # Errors
    ///
    /// Everything [`verify`](Self::verify) returns, plus
    /// [`AuthError::WrongTokenType`].
    pub fn verify_typed(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<SessionClaims, AuthError> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(AuthError::wrong_token_type(expected, claims.token_type));
        }
        Ok(claims)
    }

    /// Returns `true` iff the token is well-formed, signed by this codec's key
    /// and not yet expired.
    ///
    /// Never fails: every problem, including empty or garbage input, yields
    /// `false`.
    #[must_use]
    pub fn validate(&self, token: &str) -> bool {
        match self.verify(token) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, token_prefix = %token_prefix(token), "token rejected");
                false
            },
        }
    }

    /// Returns the subject of a valid token.
    ///
    /// # Errors
    ///
    /// Returns the verification error for an invalid token.
    pub fn extract_subject(&self, token: &str) -> Result<PrincipalId, AuthError> {
        self.verify(token).map(|claims| claims.principal())
    }

    /// Returns the kind of a valid token.
    ///
    /// # Errors
    ///
    /// Returns the verification error for an invalid token.
    pub fn extract_type(&self, token: &str) -> Result<TokenType, AuthError> {
        self.verify(token).map(|claims| claims.token_type)
    }
}

/// First characters of a token, safe to log.
pub(crate) fn token_prefix(token: &str) -> &str {
    let end = token.char_indices().nth(8).map_or(token.len(), |(idx, _)| idx);
    &token[..end]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testutil::{FIXED_SEED, craft_raw_jwt, sign_raw_claims, test_codec};

    fn u1() -> PrincipalId {
        PrincipalId::from("U1")
    }

    #[test]
    fn test_issue_then_validate() {
        let codec = test_codec();
        let token = codec.issue(&u1(), TokenType::Access, TimeDelta::minutes(15)).unwrap();

        assert!(codec.validate(&token));
        assert_eq!(codec.extract_subject(&token).unwrap(), u1());
        assert_eq!(codec.extract_type(&token).unwrap(), TokenType::Access);
    }

    #[test]
    fn test_claims_shape() {
        let codec = test_codec();
        let now = Utc::now();
        let token = codec.issue_at(&u1(), TokenType::Refresh, TimeDelta::days(7), now).unwrap();

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "U1");
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, now.timestamp() + 7 * 24 * 3600);
    }

    #[test]
    fn test_type_claim_serialized_lowercase() {
        let claims = SessionClaims {
            sub: "U1".into(),
            token_type: TokenType::Access,
            iat: 0,
            exp: 1,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "access");
        assert!(json.get("token_type").is_none());
    }

    #[test]
    fn test_negative_ttl_is_immediately_invalid() {
        let codec = test_codec();
        let token = codec.issue(&u1(), TokenType::Access, TimeDelta::seconds(-1)).unwrap();

        assert!(!codec.validate(&token));
        assert!(codec.verify(&token).unwrap_err().is_expired());
        assert!(codec.extract_subject(&token).is_err());
    }

    #[test]
    fn test_zero_ttl_is_expired_without_leeway() {
        let codec = test_codec();
        let now = Utc::now();
        let token = codec.issue_at(&u1(), TokenType::Access, TimeDelta::zero(), now).unwrap();

        assert!(codec.verify_at(&token, now).unwrap_err().is_expired());
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = test_codec();
        let now = Utc::now();
        let token = codec.issue_at(&u1(), TokenType::Access, TimeDelta::seconds(60), now).unwrap();

        assert!(codec.verify_at(&token, now + TimeDelta::seconds(59)).is_ok());
        assert!(codec.verify_at(&token, now + TimeDelta::seconds(60)).is_err());
    }

    #[test]
    fn test_garbage_input_yields_false() {
        let codec = test_codec();
        for token in ["", "   ", "garbage", "a.b.c", "a.b", "....", "Bearer x"] {
            assert!(!codec.validate(token), "{token:?} must not validate");
            assert!(codec.extract_subject(token).is_err());
            assert!(codec.extract_type(token).is_err());
        }
    }

    #[test]
    fn test_token_from_other_key_rejected() {
        let ours = test_codec();
        let theirs = TokenCodec::new(SigningKeyPair::generate().unwrap());
        let token = theirs.issue(&u1(), TokenType::Access, TimeDelta::minutes(5)).unwrap();

        assert!(matches!(ours.verify(&token), Err(AuthError::InvalidSignature)));
        assert!(!ours.validate(&token));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = test_codec();
        let token = codec.issue(&u1(), TokenType::Access, TimeDelta::minutes(5)).unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&serde_json::json!({
                "sub": "U2", "type": "access", "iat": 0, "exp": i64::MAX / 2
            }))
            .unwrap(),
        );
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_payload;
        let forged = parts.join(".");

        assert!(matches!(codec.verify(&forged), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_alg_none_rejected() {
        let codec = test_codec();
        let token = craft_raw_jwt(
            &serde_json::json!({"alg": "none", "typ": "JWT"}),
            &serde_json::json!({"sub": "U1", "type": "access", "iat": 0, "exp": i64::MAX / 2}),
        );

        assert!(matches!(codec.verify(&token), Err(AuthError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_verify_typed_rejects_wrong_kind() {
        let codec = test_codec();
        let access = codec.issue(&u1(), TokenType::Access, TimeDelta::minutes(5)).unwrap();
        let refresh = codec.issue(&u1(), TokenType::Refresh, TimeDelta::days(1)).unwrap();

        assert!(codec.verify_typed(&access, TokenType::Access).is_ok());
        assert!(codec.verify_typed(&refresh, TokenType::Refresh).is_ok());
        assert!(matches!(
            codec.verify_typed(&access, TokenType::Refresh),
            Err(AuthError::WrongTokenType { expected: TokenType::Refresh, actual: TokenType::Access })
        ));
    }

    #[test]
    fn test_missing_type_claim_rejected() {
        let codec = test_codec();
        let token = sign_raw_claims(
            codec.keys(),
            &serde_json::json!({"sub": "U1", "iat": 0, "exp": i64::MAX / 2}),
        );

        assert!(matches!(codec.verify(&token), Err(AuthError::InvalidTokenFormat(_))));
    }

    #[test]
    fn test_empty_subject_rejected() {
        let codec = test_codec();
        let token = sign_raw_claims(
            codec.keys(),
            &serde_json::json!({"sub": "", "type": "access", "iat": 0, "exp": i64::MAX / 2}),
        );

        assert!(matches!(codec.verify(&token), Err(AuthError::MissingClaim(ref c)) if c == "sub"));
    }

    #[test]
    fn test_seed_roundtrip_is_stable() {
        let encoded = URL_SAFE_NO_PAD.encode(FIXED_SEED);
        let a = SigningKeyPair::from_base64_seed(&encoded).unwrap();
        let b = SigningKeyPair::from_seed(&Zeroizing::new(FIXED_SEED)).unwrap();
        assert_eq!(a.public_key(), b.public_key());

        // A token from one codec verifies under the other: same key material.
        let token = TokenCodec::new(a).issue(&u1(), TokenType::Access, TimeDelta::minutes(1)).unwrap();
        assert!(TokenCodec::new(b).validate(&token));
    }

    #[test]
    fn test_bad_seed_rejected() {
        assert!(matches!(
            SigningKeyPair::from_base64_seed("not base64!"),
            Err(AuthError::InvalidSigningKey(_))
        ));
        assert!(matches!(
            SigningKeyPair::from_base64_seed(&URL_SAFE_NO_PAD.encode([0u8; 16])),
            Err(AuthError::InvalidSigningKey(ref msg)) if msg.contains("32 bytes")
        ));
    }

    #[test]
    fn test_debug_does_not_leak_private_key() {
        let codec = test_codec();
        let rendered = format!("{codec:?}");
        assert!(rendered.contains(codec.keys().public_key()));
        assert!(!rendered.contains(&URL_SAFE_NO_PAD.encode(FIXED_SEED)));
    }

    #[test]
    fn test_token_prefix_is_short() {
        assert_eq!(token_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(token_prefix("abc"), "abc");
        assert_eq!(token_prefix(""), "");
    }

    proptest! {
        #[test]
        fn prop_subject_and_type_roundtrip(
            sub in "[A-Za-z0-9-]{1,40}",
            refresh in any::<bool>(),
            ttl_secs in 1i64..1_000_000,
        ) {
            let codec = test_codec();
            let token_type = if refresh { TokenType::Refresh } else { TokenType::Access };
            let principal = PrincipalId::from(sub.as_str());
            let token = codec.issue(&principal, token_type, TimeDelta::seconds(ttl_secs)).unwrap();

            prop_assert!(codec.validate(&token));
            prop_assert_eq!(codec.extract_subject(&token).unwrap(), principal);
            prop_assert_eq!(codec.extract_type(&token).unwrap(), token_type);
        }

        #[test]
        fn prop_arbitrary_strings_never_validate(input in ".{0,200}") {
            prop_assert!(!test_codec().validate(&input));
        }
    }
}
