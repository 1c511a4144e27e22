//! Shared test utilities for the session broker.
//!
//! Feature-gated behind `testutil`. Provides scriptable upstream
//! collaborators that count their calls, and a broker wired to them.
//!
//! ```
//! use progress_common_broker::testutil::{MockDirectory, listing};
//!
//! let directory = MockDirectory::new().with_listing("U1", listing(&["R1", "R2"]));
//! assert_eq!(directory.fetches(), 0);
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use progress_common_authn::testutil::fixed_seed_base64;
use progress_common_vault::{PrincipalId, UpstreamCredential};
use serde_json::{Value, json};

use crate::{
    broker::Broker,
    config::{BrokerConfig, TokenConfig},
    upstream::{ResourceDirectory, UpstreamAuthenticator, UpstreamError, UpstreamIdentity},
};

/// Failure a mock collaborator should report instead of answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Report [`UpstreamError::Unreachable`].
    Unreachable,
    /// Report [`UpstreamError::InvalidResponse`].
    InvalidResponse,
}

impl MockFailure {
    fn to_error(self) -> UpstreamError {
        match self {
            Self::Unreachable => UpstreamError::unreachable("mock upstream is down"),
            Self::InvalidResponse => UpstreamError::invalid_response("mock upstream sent garbage"),
        }
    }
}

/// Builds a listing in the upstream's shape from string ids.
pub fn listing(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| json!({ "id": id, "title": format!("card {id}") })).collect())
}

// ============================================================================
// Authenticator
// ============================================================================

/// Scriptable [`UpstreamAuthenticator`].
///
/// Unknown usernames and wrong passwords are [`UpstreamError::Rejected`].
#[derive(Default)]
pub struct MockAuthenticator {
    users: HashMap<String, (String, UpstreamIdentity)>,
    failure: RwLock<Option<MockFailure>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockAuthenticator {
    /// Creates an authenticator with no users.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user and the identity the upstream returns for them.
    #[must_use]
    pub fn with_user(
        mut self,
        username: &str,
        password: &str,
        principal: &str,
        credential: &str,
    ) -> Self {
        let identity = UpstreamIdentity::new(principal, UpstreamCredential::new(credential));
        self.users.insert(username.to_owned(), (password.to_owned(), identity));
        self
    }

    /// Delays every answer by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every subsequent call fail, or answer again with `None`.
    pub fn set_failure(&self, failure: Option<MockFailure>) {
        *self.failure.write() = failure;
    }

    /// Number of calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamAuthenticator for MockAuthenticator {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UpstreamIdentity, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = *self.failure.read();
        if let Some(failure) = failure {
            return Err(failure.to_error());
        }
        match self.users.get(username) {
            Some((expected, identity)) if expected == password => Ok(identity.clone()),
            _ => Err(UpstreamError::Rejected),
        }
    }
}

// ============================================================================
// Directory
// ============================================================================

/// Scriptable [`ResourceDirectory`] that counts fetches.
///
/// Principals without a listing get an empty array.
#[derive(Default)]
pub struct MockDirectory {
    listings: RwLock<HashMap<PrincipalId, Value>>,
    failure: RwLock<Option<MockFailure>>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl MockDirectory {
    /// Creates a directory with no listings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listing returned for `principal`.
    #[must_use]
    pub fn with_listing(self, principal: &str, listing: Value) -> Self {
        self.set_listing(principal, listing);
        self
    }

    /// Delays every answer by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replaces the listing returned for `principal`.
    pub fn set_listing(&self, principal: &str, listing: Value) {
        self.listings.write().insert(PrincipalId::from(principal), listing);
    }

    /// Makes every subsequent fetch fail, or answer again with `None`.
    pub fn set_failure(&self, failure: Option<MockFailure>) {
        *self.failure.write() = failure;
    }

    /// Number of fetches so far.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceDirectory for MockDirectory {
    async fn fetch_listing(
        &self,
        principal: &PrincipalId,
        _credential: &UpstreamCredential,
    ) -> Result<Value, UpstreamError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = *self.failure.read();
        if let Some(failure) = failure {
            return Err(failure.to_error());
        }
        Ok(self.listings.read().get(principal).cloned().unwrap_or_else(|| json!([])))
    }
}

// ============================================================================
// Broker
// ============================================================================

/// A valid config with the fixed test signing key and an in-memory vault.
///
/// # Panics
///
/// Panics if the fixed test seed is rejected.
pub fn test_config() -> BrokerConfig {
    let tokens = TokenConfig::builder()
        .signing_seed(fixed_seed_base64())
        .build()
        .expect("valid token config");
    BrokerConfig::builder().tokens(tokens).build().expect("valid broker config")
}

/// A broker over [`test_config`] and the given mocks.
///
/// # Panics
///
/// Panics if the broker fails to start.
pub async fn test_broker(
    authenticator: Arc<MockAuthenticator>,
    directory: Arc<MockDirectory>,
) -> Broker {
    Broker::from_config(test_config(), authenticator, directory)
        .await
        .expect("test broker starts")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_shape() {
        let value = listing(&["R1"]);
        assert_eq!(value[0]["id"], "R1");
        assert!(value.as_array().is_some());
    }

    #[tokio::test]
    async fn test_mock_authenticator() {
        let auth = MockAuthenticator::new().with_user("alice", "pw", "U1", "ext-1");

        assert_eq!(auth.authenticate("alice", "pw").await.unwrap().principal.as_str(), "U1");
        assert!(matches!(auth.authenticate("alice", "nope").await, Err(UpstreamError::Rejected)));
        assert!(matches!(auth.authenticate("bob", "pw").await, Err(UpstreamError::Rejected)));

        auth.set_failure(Some(MockFailure::Unreachable));
        assert!(matches!(
            auth.authenticate("alice", "pw").await,
            Err(UpstreamError::Unreachable { .. })
        ));
        assert_eq!(auth.calls(), 4);
    }

    #[tokio::test]
    async fn test_mock_directory_counts_fetches() {
        let directory = MockDirectory::new().with_listing("U1", listing(&["R1"]));
        let credential = UpstreamCredential::new("ext-1");

        let value = directory.fetch_listing(&PrincipalId::from("U1"), &credential).await.unwrap();
        assert_eq!(value, listing(&["R1"]));
        let empty = directory.fetch_listing(&PrincipalId::from("U2"), &credential).await.unwrap();
        assert_eq!(empty, json!([]));
        assert_eq!(directory.fetches(), 2);
    }

    #[tokio::test]
    async fn test_test_broker_starts() {
        let broker =
            test_broker(Arc::new(MockAuthenticator::new()), Arc::new(MockDirectory::new())).await;
        assert_eq!(broker.vault().name(), "memory");
        broker.shutdown().await;
    }
}
