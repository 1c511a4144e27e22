//! Shared test utilities for credential vault testing.
//!
//! This module provides helpers for creating test vaults, generating
//! principal and resource ids, and asserting on [`VaultResult`] values. It is
//! feature-gated behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! progress-common-vault = { path = "../vault", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use progress_common_vault::testutil::{make_principal, make_resources, populated_vault};
//! ```

use std::time::Duration;

use crate::{
    CredentialVault,
    backend::ResourceSet,
    error::VaultResult,
    memory::MemoryVault,
    types::{PrincipalId, ResourceId, UpstreamCredential},
};

/// Create a deterministic principal id from a prefix and index.
///
/// Produces ids like `"prefix-000042"` (zero-padded to 6 digits).
#[must_use]
pub fn make_principal(prefix: &str, idx: usize) -> PrincipalId {
    PrincipalId::from(format!("{prefix}-{idx:06}"))
}

/// Create an upstream credential tagged with a task id and sequence number.
///
/// Produces values like `"ext-task3-042"`. Useful for concurrent tests where
/// you need to identify which task wrote which value.
#[must_use]
pub fn make_credential(task: usize, seq: usize) -> UpstreamCredential {
    UpstreamCredential::new(format!("ext-task{task}-{seq:03}"))
}

/// Create a resource set of `count` ids, `"{prefix}{0..count}"`.
#[must_use]
pub fn make_resources(prefix: &str, count: usize) -> ResourceSet {
    (0..count).map(|i| ResourceId::from(format!("{prefix}{i}"))).collect()
}

/// Create a [`MemoryVault`] holding credentials for `count` principals.
///
/// Principals are formatted as [`make_principal`]`(prefix, i)` with
/// credential `"ext-{i}"` and the given TTL.
pub async fn populated_vault(prefix: &str, count: usize, ttl: Duration) -> MemoryVault {
    let vault = MemoryVault::new();
    for i in 0..count {
        let credential = UpstreamCredential::new(format!("ext-{i}"));
        vault.store_credential(&make_principal(prefix, i), &credential, ttl).await;
    }
    vault
}

/// Assert that a [`VaultResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use progress_common_vault::{VaultResult, assert_vault_ok};
///
/// let result: VaultResult<i32> = Ok(42);
/// let value = assert_vault_ok!(result);
/// assert_eq!(value, 42);
/// ```
#[macro_export]
macro_rules! assert_vault_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got VaultError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got VaultError: {e:?}", $msg),
        }
    };
}

/// Assert that a [`VaultResult`] is a transient error (connection or timeout).
#[macro_export]
macro_rules! assert_transient {
    ($result:expr) => {
        assert!(
            matches!(&$result, Err(e) if e.is_transient()),
            "expected transient VaultError, got: {:?}",
            $result,
        );
    };
}

/// Helper to verify that a result is a `Timeout` error.
pub fn is_timeout<T>(result: &VaultResult<T>) -> bool {
    matches!(result, Err(crate::VaultError::Timeout))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::VaultError;

    #[test]
    fn test_make_principal_format() {
        assert_eq!(make_principal("user", 42).as_str(), "user-000042");
    }

    #[test]
    fn test_make_credential_format() {
        assert_eq!(make_credential(3, 42).expose(), "ext-task3-042");
    }

    #[test]
    fn test_make_resources() {
        let set = make_resources("card-", 3);
        assert_eq!(set.len(), 3);
        assert!(set.contains("card-0"));
        assert!(set.contains("card-2"));
        assert!(make_resources("x", 0).is_empty());
    }

    #[tokio::test]
    async fn test_populated_vault() {
        let vault = populated_vault("user", 5, Duration::from_secs(60)).await;
        assert_eq!(vault.size().await, 5);
        let stored = vault.retrieve_credential(&make_principal("user", 3)).await.expect("stored");
        assert_eq!(stored.expose(), "ext-3");
    }

    #[test]
    fn test_assert_vault_ok_macro() {
        let result: VaultResult<i32> = Ok(42);
        assert_eq!(assert_vault_ok!(result), 42);
    }

    #[test]
    fn test_assert_transient_macro() {
        let result: VaultResult<()> = Err(VaultError::connection("refused"));
        assert_transient!(result);
    }

    #[test]
    fn test_is_timeout() {
        assert!(is_timeout::<()>(&Err(VaultError::Timeout)));
        assert!(!is_timeout::<()>(&Ok(())));
    }
}
