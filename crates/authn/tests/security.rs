//! Security-focused session token tests.
//!
//! These tests verify the codec's resistance to common JWT attack vectors:
//! algorithm substitution, algorithm confusion, forged or re-signed claims,
//! type confusion between access and refresh tokens, expiry boundaries and
//! malformed structures. They also check that revocation is independent of
//! signature validity.
#![allow(clippy::expect_used, clippy::panic)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use progress_common_authn::{
    InMemoryRevocationRegistry, RevocationRegistry, SigningKeyPair, TokenCodec, TokenType,
    assert_auth_error,
    error::AuthError,
    testutil::{craft_raw_jwt, sign_raw_claims, test_codec, test_keypair},
};
use progress_common_vault::PrincipalId;
use serde_json::json;

fn alice() -> PrincipalId {
    PrincipalId::from("alice")
}

fn far_future() -> i64 {
    (Utc::now() + TimeDelta::days(365)).timestamp()
}

// ===========================================================================
// Algorithm substitution: "none"
// ===========================================================================

#[test]
fn test_algorithm_none_rejected() {
    let token = craft_raw_jwt(
        &json!({"alg": "none", "typ": "JWT"}),
        &json!({"sub": "alice", "type": "access", "iat": 0, "exp": far_future()}),
    );

    let codec = test_codec();
    assert_auth_error!(codec.verify(&token), UnsupportedAlgorithm);
    assert!(!codec.validate(&token));
}

#[test]
fn test_algorithm_none_with_valid_signature_segment_rejected() {
    // Splice the header of a "none" token onto a genuinely signed token.
    let codec = test_codec();
    let genuine = codec.issue(&alice(), TokenType::Access, TimeDelta::minutes(5)).expect("issue");
    let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let parts: Vec<&str> = genuine.split('.').collect();
    let spliced = format!("{none_header}.{}.{}", parts[1], parts[2]);

    assert_auth_error!(codec.verify(&spliced), UnsupportedAlgorithm);
}

// ===========================================================================
// Algorithm confusion: symmetric algorithms keyed with public material
// ===========================================================================

#[test]
fn test_algorithm_confusion_hs256_with_public_key_rejected() {
    // Classic confusion attack: HMAC-sign with the verifier's public key.
    let keys = test_keypair();
    let claims = json!({"sub": "alice", "type": "access", "iat": 0, "exp": far_future()});
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(keys.public_key().as_bytes()),
    )
    .expect("encode HS256");

    assert_auth_error!(TokenCodec::new(keys).verify(&forged), UnsupportedAlgorithm);
}

#[test]
fn test_algorithm_confusion_hs384_and_hs512_rejected() {
    let codec = test_codec();
    for alg in [Algorithm::HS384, Algorithm::HS512] {
        let forged = jsonwebtoken::encode(
            &Header::new(alg),
            &json!({"sub": "alice", "type": "access", "iat": 0, "exp": far_future()}),
            &EncodingKey::from_secret(b"guessable"),
        )
        .expect("encode");
        assert_auth_error!(codec.verify(&forged), UnsupportedAlgorithm, format!("{alg:?}"));
    }
}

#[test]
fn test_rs256_header_rejected_as_not_accepted() {
    let token = craft_raw_jwt(
        &json!({"alg": "RS256", "typ": "JWT"}),
        &json!({"sub": "alice", "type": "access", "iat": 0, "exp": far_future()}),
    );
    assert!(matches!(
        test_codec().verify(&token),
        Err(AuthError::UnsupportedAlgorithm(ref msg)) if msg.contains("not in accepted list")
    ));
}

// ===========================================================================
// Forged claims
// ===========================================================================

#[test]
fn test_token_signed_by_other_key_rejected() {
    let attacker = SigningKeyPair::generate().expect("generate");
    let forged = sign_raw_claims(
        &attacker,
        &json!({"sub": "alice", "type": "access", "iat": 0, "exp": far_future()}),
    );

    assert_auth_error!(test_codec().verify(&forged), InvalidSignature);
}

#[test]
fn test_subject_swap_breaks_signature() {
    let codec = test_codec();
    let token = codec.issue(&alice(), TokenType::Access, TimeDelta::minutes(5)).expect("issue");
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    let payload = URL_SAFE_NO_PAD.decode(&parts[1]).expect("payload b64");
    let mut claims: serde_json::Value = serde_json::from_slice(&payload).expect("payload json");
    claims["sub"] = json!("mallory");
    parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("json"));

    assert_auth_error!(codec.verify(&parts.join(".")), InvalidSignature);
}

#[test]
fn test_expiry_extension_breaks_signature() {
    let codec = test_codec();
    let token = codec.issue(&alice(), TokenType::Access, TimeDelta::seconds(-10)).expect("issue");
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    let payload = URL_SAFE_NO_PAD.decode(&parts[1]).expect("payload b64");
    let mut claims: serde_json::Value = serde_json::from_slice(&payload).expect("payload json");
    claims["exp"] = json!(far_future());
    parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("json"));

    assert_auth_error!(codec.verify(&parts.join(".")), InvalidSignature);
}

// ===========================================================================
// Type confusion
// ===========================================================================

#[test]
fn test_refresh_token_rejected_where_access_expected() {
    let codec = test_codec();
    let refresh = codec.issue(&alice(), TokenType::Refresh, TimeDelta::days(7)).expect("issue");

    assert!(codec.validate(&refresh), "a refresh token is still a valid token");
    assert_auth_error!(codec.verify_typed(&refresh, TokenType::Access), WrongTokenType);
}

#[test]
fn test_unknown_type_value_rejected() {
    let codec = test_codec();
    let token = sign_raw_claims(
        codec.keys(),
        &json!({"sub": "alice", "type": "admin", "iat": 0, "exp": far_future()}),
    );

    assert_auth_error!(codec.verify(&token), InvalidTokenFormat);
}

// ===========================================================================
// Expiry boundaries
// ===========================================================================

#[test]
fn test_token_expired_one_second_ago() {
    let codec = test_codec();
    let token = codec.issue(&alice(), TokenType::Access, TimeDelta::seconds(-1)).expect("issue");

    assert_auth_error!(codec.verify(&token), TokenExpired);
    assert!(!codec.validate(&token));
}

#[test]
fn test_token_valid_one_minute_from_now() {
    let codec = test_codec();
    let token = codec.issue(&alice(), TokenType::Access, TimeDelta::minutes(1)).expect("issue");

    assert!(codec.validate(&token));
}

#[test]
fn test_missing_exp_rejected() {
    let codec = test_codec();
    let token = sign_raw_claims(codec.keys(), &json!({"sub": "alice", "type": "access", "iat": 0}));

    assert!(matches!(
        codec.verify(&token),
        Err(AuthError::MissingClaim(_) | AuthError::InvalidTokenFormat(_))
    ));
}

// ===========================================================================
// Malformed structures
// ===========================================================================

#[test]
fn test_malformed_tokens_rejected_without_panic() {
    let codec = test_codec();
    let cases = [
        "",
        "single",
        "two.parts",
        "a.b.c.d",
        "!!!.###.$$$",
        "eyJhbGciOiJFZERTQSJ9.not-json.sig",
        "eyJhbGciOiJFZERTQSJ9.e30.",
    ];
    for token in cases {
        assert!(!codec.validate(token), "{token:?} must not validate");
        assert!(codec.verify(token).is_err(), "{token:?} must not verify");
    }
}

#[test]
fn test_empty_signature_rejected() {
    let codec = test_codec();
    let token = codec.issue(&alice(), TokenType::Access, TimeDelta::minutes(5)).expect("issue");
    let stripped = format!("{}.", token.rsplit_once('.').expect("three parts").0);

    assert!(!codec.validate(&stripped));
}

// ===========================================================================
// Revocation is independent of validity
// ===========================================================================

#[tokio::test]
async fn test_revoked_token_still_verifies_but_is_tracked() {
    let codec = test_codec();
    let registry = InMemoryRevocationRegistry::new();
    let token = codec.issue(&alice(), TokenType::Access, TimeDelta::minutes(15)).expect("issue");
    let claims = codec.verify(&token).expect("verify");

    registry.revoke(&token, claims.expires_at()).await;

    assert!(codec.validate(&token), "the codec keeps no state");
    assert!(registry.is_revoked(&token).await, "callers must consult the registry first");

    registry.sweep_at(claims.expires_at());
    assert!(!registry.is_revoked(&token).await, "entry is gone once the token expires");
}

#[tokio::test]
async fn test_revoking_one_token_does_not_affect_another() {
    let codec = test_codec();
    let registry = InMemoryRevocationRegistry::new();
    let first = codec.issue(&alice(), TokenType::Access, TimeDelta::minutes(15)).expect("issue");
    let second = codec.issue(&alice(), TokenType::Refresh, TimeDelta::days(7)).expect("issue");

    registry.revoke(&first, Utc::now() + TimeDelta::minutes(15)).await;

    assert!(registry.is_revoked(&first).await);
    assert!(!registry.is_revoked(&second).await);
}
