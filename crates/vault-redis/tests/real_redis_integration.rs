//! Integration tests for the Redis vault against a real server.
//!
//! These tests are skipped unless the `RUN_REDIS_INTEGRATION_TESTS`
//! environment variable is set.
//!
//! # Running the tests
//!
//! ```bash
//! docker run --rm -p 6379:6379 redis:7
//!
//! RUN_REDIS_INTEGRATION_TESTS=1 \
//! REDIS_URL=redis://127.0.0.1:6379 \
//! cargo test -p progress-common-vault-redis --test real_redis_integration
//! ```
//!
//! Every test connects with its own key prefix, so tests may run in parallel
//! against one server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{collections::HashSet, sync::Arc, time::Duration};

use progress_common_vault::{
    CredentialVault, PrincipalId, ResourceId, ResourceSet, UpstreamCredential, VaultError,
    conformance,
};
use progress_common_vault_redis::{
    RedisVault, RedisVaultConfig,
    testutil::{connect_test_vault, redis_url, should_run, unique_prefix},
};
use redis::AsyncCommands;

// ============================================================================
// Test Helpers
// ============================================================================

/// Raw connection for inspecting what the vault wrote.
async fn raw_connection() -> redis::aio::MultiplexedConnection {
    let client = redis::Client::open(redis_url()).expect("valid url");
    client.get_multiplexed_tokio_connection().await.expect("raw connection")
}

/// Connects a vault under a known prefix so tests can address its keys.
async fn vault_with_prefix(prefix: &str) -> RedisVault {
    let config = RedisVaultConfig::builder().url(redis_url()).key_prefix(prefix).build().unwrap();
    RedisVault::connect(config).await.expect("connect")
}

fn resources(ids: &[&str]) -> ResourceSet {
    ids.iter().copied().map(ResourceId::from).collect()
}

macro_rules! conformance_test {
    ($name:ident) => {
        #[tokio::test]
        async fn $name() {
            if !should_run() {
                return;
            }
            conformance::$name(&connect_test_vault().await).await;
        }
    };
}

// ============================================================================
// Conformance
// ============================================================================

conformance_test!(credential_missing_returns_none);
conformance_test!(credential_store_then_retrieve);
conformance_test!(credential_store_overwrites);
conformance_test!(credential_blank_input_ignored);
conformance_test!(credential_remove_missing_is_noop);
conformance_test!(credential_remove_drops_resources);
conformance_test!(resources_missing_returns_none);
conformance_test!(resources_store_then_retrieve);
conformance_test!(resources_empty_set_ignored);
conformance_test!(resources_store_replaces);
conformance_test!(resources_independent_of_credential);
conformance_test!(ttl_credential_expires);
conformance_test!(ttl_resources_expire);
conformance_test!(ttl_overwrite_resets_expiry);
conformance_test!(ttl_credential_and_resources_independent);

#[tokio::test]
async fn concurrent_stores_distinct_principals() {
    if !should_run() {
        return;
    }
    conformance::concurrent_stores_distinct_principals(Arc::new(connect_test_vault().await)).await;
}

#[tokio::test]
async fn concurrent_overwrites_leave_one_value() {
    if !should_run() {
        return;
    }
    conformance::concurrent_overwrites_leave_one_value(Arc::new(connect_test_vault().await)).await;
}

#[tokio::test]
async fn run_all() {
    if !should_run() {
        return;
    }
    conformance::run_all(Arc::new(connect_test_vault().await)).await;
}

// ============================================================================
// Key Layout and Native Expiry
// ============================================================================

#[tokio::test]
async fn test_credential_written_under_token_key_with_expiry() {
    if !should_run() {
        return;
    }
    let prefix = unique_prefix();
    let vault = vault_with_prefix(&prefix).await;
    let principal = PrincipalId::from("layout-user");

    vault
        .store_credential(&principal, &UpstreamCredential::new("ext-xyz"), Duration::from_secs(60))
        .await;

    let mut raw = raw_connection().await;
    let key = format!("{prefix}token:layout-user");
    let stored: Option<String> = raw.get(&key).await.unwrap();
    assert_eq!(stored.as_deref(), Some("ext-xyz"));

    let pttl: i64 = raw.pttl(&key).await.unwrap();
    assert!(pttl > 0 && pttl <= 60_000, "expected native expiry, got {pttl}");
}

#[tokio::test]
async fn test_resources_written_as_set_with_expiry() {
    if !should_run() {
        return;
    }
    let prefix = unique_prefix();
    let vault = vault_with_prefix(&prefix).await;
    let principal = PrincipalId::from("layout-user");

    vault
        .store_authorized_resources(&principal, &resources(&["101", "102"]), Duration::from_secs(60))
        .await;

    let mut raw = raw_connection().await;
    let key = format!("{prefix}cards:layout-user");
    let members: HashSet<String> = raw.smembers(&key).await.unwrap();
    assert_eq!(members, HashSet::from(["101".to_owned(), "102".to_owned()]));

    let pttl: i64 = raw.pttl(&key).await.unwrap();
    assert!(pttl > 0 && pttl <= 60_000, "expected native expiry, got {pttl}");
}

#[tokio::test]
async fn test_resource_store_replaces_instead_of_merging() {
    if !should_run() {
        return;
    }
    let vault = connect_test_vault().await;
    let principal = PrincipalId::from("replace-user");
    let ttl = Duration::from_secs(60);

    vault.store_authorized_resources(&principal, &resources(&["1", "2", "3"]), ttl).await;
    vault.store_authorized_resources(&principal, &resources(&["9"]), ttl).await;

    assert_eq!(vault.retrieve_authorized_resources(&principal).await, Some(resources(&["9"])));
}

#[tokio::test]
async fn test_zero_ttl_removes_previous_credential() {
    if !should_run() {
        return;
    }
    let vault = connect_test_vault().await;
    let principal = PrincipalId::from("zero-ttl-user");

    vault
        .store_credential(&principal, &UpstreamCredential::new("ext-1"), Duration::from_secs(60))
        .await;
    vault.store_credential(&principal, &UpstreamCredential::new("ext-2"), Duration::ZERO).await;

    assert!(!vault.credential_exists(&principal).await);
}

// ============================================================================
// Degradation
// ============================================================================

#[tokio::test]
async fn test_foreign_value_type_reads_as_miss() {
    if !should_run() {
        return;
    }
    let prefix = unique_prefix();
    let vault = vault_with_prefix(&prefix).await;
    let principal = PrincipalId::from("foreign-user");

    // A set where a string is expected makes GET fail with WRONGTYPE.
    let mut raw = raw_connection().await;
    let _: () = raw.sadd(format!("{prefix}token:foreign-user"), "x").await.unwrap();

    let err = vault.try_retrieve_credential(&principal).await.unwrap_err();
    assert!(!err.is_transient(), "expected a permanent error, got {err:?}");
    assert_eq!(vault.retrieve_credential(&principal).await, None);
}

#[tokio::test]
async fn test_clear_and_size_are_unsupported_noops() {
    if !should_run() {
        return;
    }
    let vault = connect_test_vault().await;
    let principal = PrincipalId::from("survivor");
    vault
        .store_credential(&principal, &UpstreamCredential::new("ext-1"), Duration::from_secs(60))
        .await;

    vault.clear().await;

    assert_eq!(vault.size().await, 0);
    assert!(vault.credential_exists(&principal).await);
}

#[tokio::test]
async fn test_ping() {
    if !should_run() {
        return;
    }
    let vault = connect_test_vault().await;
    vault.ping().await.expect("ping");
}

#[tokio::test]
async fn test_try_methods_report_success() {
    if !should_run() {
        return;
    }
    let vault = connect_test_vault().await;
    let principal = PrincipalId::from("try-user");

    vault
        .try_store_credential(&principal, &UpstreamCredential::new("ext-1"), Duration::from_secs(60))
        .await
        .expect("store");
    assert!(vault.try_credential_exists(&principal).await.expect("exists"));
    vault.try_remove_credential(&principal).await.expect("remove");
    let missing: Result<Option<UpstreamCredential>, VaultError> =
        vault.try_retrieve_credential(&principal).await;
    assert!(missing.expect("retrieve").is_none());
}
