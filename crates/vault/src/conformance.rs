//! Conformance test suite for [`CredentialVault`] implementations.
//!
//! This module provides a set of async test functions that validate whether a
//! [`CredentialVault`] implementation satisfies the trait contract. Every
//! backend, in-process or Redis-backed, runs the same suite.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each conformance function with a
//! fresh vault instance:
//!
//! ```no_run
//! use progress_common_vault::{MemoryVault, conformance};
//!
//! #[tokio::test]
//! async fn credential_missing_returns_none() {
//!     conformance::credential_missing_returns_none(&MemoryVault::new()).await;
//! }
//! ```
//!
//! Each function uses its own principal ids, so [`run_all`] can share one
//! vault across the whole suite.
//!
//! # Test Categories
//!
//! | Category | Functions | Contract aspect |
//! |----------|-----------|-----------------|
//! | Credential | 6 tests | store/retrieve/remove/exists semantics |
//! | Resources | 5 tests | authorized resource set caching |
//! | TTL | 4 tests | expiry of both kinds of entry |
//! | Concurrent | 2 tests | Thread-safety under parallel access |
//!
//! `clear` and `size` are administrative and allowed to be unsupported, so
//! they are not part of the shared contract.

use std::{sync::Arc, time::Duration};

use crate::{
    backend::{CredentialVault, ResourceSet},
    types::{PrincipalId, ResourceId, UpstreamCredential},
};

const LONG_TTL: Duration = Duration::from_secs(300);
const SHORT_TTL: Duration = Duration::from_millis(50);
const PAST_SHORT_TTL: Duration = Duration::from_millis(200);

fn principal(id: &str) -> PrincipalId {
    PrincipalId::from(format!("conformance-{id}"))
}

fn credential(value: &str) -> UpstreamCredential {
    UpstreamCredential::new(value)
}

fn resources(ids: &[&str]) -> ResourceSet {
    ids.iter().copied().map(ResourceId::from).collect()
}

// ============================================================================
// Credential: store/retrieve/remove/exists semantics (6 tests)
// ============================================================================

/// `retrieve_credential` for a principal that never logged in returns `None`.
pub async fn credential_missing_returns_none<V: CredentialVault>(vault: &V) {
    let p = principal("missing");
    assert!(vault.retrieve_credential(&p).await.is_none(), "missing credential should be None");
    assert!(!vault.credential_exists(&p).await, "missing credential should not exist");
}

/// `store_credential` then `retrieve_credential` returns the stored value.
pub async fn credential_store_then_retrieve<V: CredentialVault>(vault: &V) {
    let p = principal("roundtrip");
    vault.store_credential(&p, &credential("ext-abc"), LONG_TTL).await;

    let stored = vault.retrieve_credential(&p).await.expect("credential should be stored");
    assert_eq!(stored.expose(), "ext-abc");
    assert!(vault.credential_exists(&p).await);
}

/// A second `store_credential` replaces the first.
pub async fn credential_store_overwrites<V: CredentialVault>(vault: &V) {
    let p = principal("overwrite");
    vault.store_credential(&p, &credential("first"), LONG_TTL).await;
    vault.store_credential(&p, &credential("second"), LONG_TTL).await;

    let stored = vault.retrieve_credential(&p).await.expect("credential should be stored");
    assert_eq!(stored.expose(), "second", "latest login must win");
}

/// Blank principals and blank credentials are never stored.
pub async fn credential_blank_input_ignored<V: CredentialVault>(vault: &V) {
    let blank_principal = PrincipalId::from("   ");
    vault.store_credential(&blank_principal, &credential("ext"), LONG_TTL).await;
    assert!(vault.retrieve_credential(&blank_principal).await.is_none());

    let p = principal("blank-credential");
    vault.store_credential(&p, &credential(""), LONG_TTL).await;
    assert!(vault.retrieve_credential(&p).await.is_none(), "empty credential must be ignored");

    vault.store_credential(&p, &credential(" \t "), LONG_TTL).await;
    assert!(!vault.credential_exists(&p).await, "whitespace credential must be ignored");
}

/// `remove_credential` on a principal with nothing stored is a no-op.
pub async fn credential_remove_missing_is_noop<V: CredentialVault>(vault: &V) {
    let p = principal("remove-missing");
    vault.remove_credential(&p).await;
    assert!(!vault.credential_exists(&p).await);
}

/// `remove_credential` drops both the credential and the resource set.
pub async fn credential_remove_drops_resources<V: CredentialVault>(vault: &V) {
    let p = principal("remove");
    vault.store_credential(&p, &credential("ext"), LONG_TTL).await;
    vault.store_authorized_resources(&p, &resources(&["101"]), LONG_TTL).await;

    vault.remove_credential(&p).await;

    assert!(vault.retrieve_credential(&p).await.is_none(), "credential should be removed");
    assert!(
        vault.retrieve_authorized_resources(&p).await.is_none(),
        "resource set should be removed with the credential"
    );
}

// ============================================================================
// Resources: authorized resource set caching (5 tests)
// ============================================================================

/// `retrieve_authorized_resources` with nothing cached returns `None`.
pub async fn resources_missing_returns_none<V: CredentialVault>(vault: &V) {
    let p = principal("resources-missing");
    assert!(vault.retrieve_authorized_resources(&p).await.is_none());
}

/// A stored set is returned with exactly the stored members.
pub async fn resources_store_then_retrieve<V: CredentialVault>(vault: &V) {
    let p = principal("resources-roundtrip");
    let owned = resources(&["101", "102", "103"]);
    vault.store_authorized_resources(&p, &owned, LONG_TTL).await;

    let cached = vault.retrieve_authorized_resources(&p).await.expect("set should be cached");
    assert_eq!(cached, owned);
}

/// Storing an empty set leaves nothing cached.
pub async fn resources_empty_set_ignored<V: CredentialVault>(vault: &V) {
    let p = principal("resources-empty");
    vault.store_authorized_resources(&p, &ResourceSet::new(), LONG_TTL).await;
    assert!(
        vault.retrieve_authorized_resources(&p).await.is_none(),
        "empty set must not be cached"
    );
}

/// A later store replaces the earlier set rather than merging with it.
pub async fn resources_store_replaces<V: CredentialVault>(vault: &V) {
    let p = principal("resources-replace");
    vault.store_authorized_resources(&p, &resources(&["1", "2"]), LONG_TTL).await;
    vault.store_authorized_resources(&p, &resources(&["3"]), LONG_TTL).await;

    let cached = vault.retrieve_authorized_resources(&p).await.expect("set should be cached");
    assert_eq!(cached, resources(&["3"]));
}

/// Resource sets are independent of the credential entry.
pub async fn resources_independent_of_credential<V: CredentialVault>(vault: &V) {
    let p = principal("resources-independent");
    vault.store_authorized_resources(&p, &resources(&["9"]), LONG_TTL).await;

    assert!(!vault.credential_exists(&p).await, "caching resources must not create a credential");
    assert!(vault.retrieve_authorized_resources(&p).await.is_some());
}

// ============================================================================
// TTL: expiry of both kinds of entry (4 tests)
// ============================================================================

/// A credential is served before its TTL and not after.
pub async fn ttl_credential_expires<V: CredentialVault>(vault: &V) {
    let p = principal("ttl-credential");
    vault.store_credential(&p, &credential("ephemeral"), SHORT_TTL).await;
    assert!(vault.credential_exists(&p).await, "credential should exist before expiry");

    tokio::time::sleep(PAST_SHORT_TTL).await;

    assert!(vault.retrieve_credential(&p).await.is_none(), "credential should expire");
    assert!(!vault.credential_exists(&p).await);
}

/// A resource set is served before its TTL and not after.
pub async fn ttl_resources_expire<V: CredentialVault>(vault: &V) {
    let p = principal("ttl-resources");
    vault.store_authorized_resources(&p, &resources(&["1"]), SHORT_TTL).await;
    assert!(vault.retrieve_authorized_resources(&p).await.is_some());

    tokio::time::sleep(PAST_SHORT_TTL).await;

    assert!(vault.retrieve_authorized_resources(&p).await.is_none(), "resource set should expire");
}

/// Re-storing a credential restarts its TTL.
pub async fn ttl_overwrite_resets_expiry<V: CredentialVault>(vault: &V) {
    let p = principal("ttl-overwrite");
    vault.store_credential(&p, &credential("short"), SHORT_TTL).await;
    vault.store_credential(&p, &credential("long"), LONG_TTL).await;

    tokio::time::sleep(PAST_SHORT_TTL).await;

    let stored = vault.retrieve_credential(&p).await.expect("overwrite should carry new TTL");
    assert_eq!(stored.expose(), "long");
}

/// The credential and resource set expire independently.
pub async fn ttl_credential_and_resources_independent<V: CredentialVault>(vault: &V) {
    let p = principal("ttl-independent");
    vault.store_credential(&p, &credential("ext"), LONG_TTL).await;
    vault.store_authorized_resources(&p, &resources(&["1"]), SHORT_TTL).await;

    tokio::time::sleep(PAST_SHORT_TTL).await;

    assert!(vault.credential_exists(&p).await, "credential has its own TTL");
    assert!(vault.retrieve_authorized_resources(&p).await.is_none());
}

// ============================================================================
// Concurrent: thread-safety under parallel access (2 tests)
// ============================================================================

/// Parallel stores for distinct principals are all visible afterwards.
pub async fn concurrent_stores_distinct_principals<V: CredentialVault + 'static>(vault: Arc<V>) {
    let mut handles = Vec::new();
    for i in 0..16 {
        let vault = Arc::clone(&vault);
        handles.push(tokio::spawn(async move {
            let p = principal(&format!("concurrent-{i}"));
            vault.store_credential(&p, &credential(&format!("ext-{i}")), LONG_TTL).await;
        }));
    }
    for handle in handles {
        handle.await.expect("task should not panic");
    }

    for i in 0..16 {
        let p = principal(&format!("concurrent-{i}"));
        let stored = vault.retrieve_credential(&p).await.expect("credential should be stored");
        assert_eq!(stored.expose(), format!("ext-{i}"));
    }
}

/// Concurrent overwrites of one principal leave exactly one of the written values.
pub async fn concurrent_overwrites_leave_one_value<V: CredentialVault + 'static>(vault: Arc<V>) {
    let p = principal("concurrent-overwrite");
    let mut handles = Vec::new();
    for i in 0..16 {
        let vault = Arc::clone(&vault);
        let p = p.clone();
        handles.push(tokio::spawn(async move {
            vault.store_credential(&p, &credential(&format!("login-{i}")), LONG_TTL).await;
        }));
    }
    for handle in handles {
        handle.await.expect("task should not panic");
    }

    let stored = vault.retrieve_credential(&p).await.expect("one value should survive");
    let written: Vec<String> = (0..16).map(|i| format!("login-{i}")).collect();
    assert!(written.iter().any(|v| v == stored.expose()), "unexpected value {stored:?}");
}

// ============================================================================
// Run all
// ============================================================================

/// Runs every conformance check against one vault instance.
pub async fn run_all<V: CredentialVault + 'static>(vault: Arc<V>) {
    credential_missing_returns_none(vault.as_ref()).await;
    credential_store_then_retrieve(vault.as_ref()).await;
    credential_store_overwrites(vault.as_ref()).await;
    credential_blank_input_ignored(vault.as_ref()).await;
    credential_remove_missing_is_noop(vault.as_ref()).await;
    credential_remove_drops_resources(vault.as_ref()).await;

    resources_missing_returns_none(vault.as_ref()).await;
    resources_store_then_retrieve(vault.as_ref()).await;
    resources_empty_set_ignored(vault.as_ref()).await;
    resources_store_replaces(vault.as_ref()).await;
    resources_independent_of_credential(vault.as_ref()).await;

    ttl_credential_expires(vault.as_ref()).await;
    ttl_resources_expire(vault.as_ref()).await;
    ttl_overwrite_resets_expiry(vault.as_ref()).await;
    ttl_credential_and_resources_independent(vault.as_ref()).await;

    concurrent_stores_distinct_principals(Arc::clone(&vault)).await;
    concurrent_overwrites_leave_one_value(vault).await;
}
