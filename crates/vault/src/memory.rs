//! In-process credential vault.
//!
//! This module provides [`MemoryVault`], an in-memory implementation of
//! [`CredentialVault`] for single-instance deployments and tests.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Lazy expiry**: A read that finds an expired entry evicts it
//! - **Background sweep**: An optional task removes expired entries for principals that stopped
//!   making requests, bounding memory
//! - **Simulated time**: Expiry uses [`tokio::time::Instant`], so tests can drive it with
//!   `tokio::time::pause` and `tokio::time::advance`
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use progress_common_vault::{CredentialVault, MemoryVault, PrincipalId, UpstreamCredential};
//!
//! #[tokio::main]
//! async fn main() {
//!     let vault = MemoryVault::new().with_sweep_interval(Duration::from_secs(300));
//!     let principal = PrincipalId::from("u1");
//!
//!     vault.store_credential(&principal, &UpstreamCredential::new("up"), Duration::from_secs(60)).await;
//!     assert!(vault.credential_exists(&principal).await);
//!
//!     vault.shutdown();
//! }
//! ```
//!
//! # Limitations
//!
//! - Entries are not shared between processes; use the Redis backend when the broker runs on
//!   more than one instance
//! - All data is lost when the process exits

use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::{select, sync::watch, time::Instant};

use crate::{
    backend::{CredentialVault, ResourceSet},
    types::{PrincipalId, UpstreamCredential},
};

/// Default interval between background sweeps (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Upper bound applied when `now + ttl` is not representable.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A stored value and the instant after which it is no longer served.
#[derive(Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + MAX_TTL);
        Self { value, expires_at }
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

type ExpiringMap<T> = RwLock<HashMap<PrincipalId, Expiring<T>>>;

#[derive(Default)]
struct Inner {
    credentials: ExpiringMap<UpstreamCredential>,
    resources: ExpiringMap<ResourceSet>,
}

impl Inner {
    /// Removes every expired entry from both maps, returning how many
    /// credential and resource-set entries were dropped.
    fn sweep(&self) -> (usize, usize) {
        let now = Instant::now();
        (retain_live(&self.credentials, now), retain_live(&self.resources, now))
    }
}

fn retain_live<T>(map: &ExpiringMap<T>, now: Instant) -> usize {
    let mut guard = map.write();
    let before = guard.len();
    guard.retain(|_, entry| !entry.is_expired_at(now));
    before - guard.len()
}

/// Reads a live value, evicting the entry if it has expired.
///
/// The eviction re-checks expiry under the write lock so a fresh value
/// stored between the two lock acquisitions is never removed.
fn read_live<T: Clone>(map: &ExpiringMap<T>, principal: &PrincipalId) -> Option<T> {
    let now = Instant::now();
    {
        let guard = map.read();
        match guard.get(principal) {
            None => return None,
            Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
            Some(_) => {},
        }
    }

    let mut guard = map.write();
    if guard.get(principal).is_some_and(|entry| entry.is_expired_at(now)) {
        guard.remove(principal);
        tracing::debug!(principal = %principal, "evicted expired vault entry on read");
    }
    None
}

/// Holds the shutdown signal sender. When dropped, the watch channel
/// closes and the sweep task exits.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        // Best-effort signal; the receiver may already be gone.
        let _ = self.shutdown_tx.send(());
    }
}

/// In-memory credential vault.
///
/// # Cloning
///
/// `MemoryVault` is cheaply cloneable via [`Arc`]. All clones share the same
/// underlying maps.
///
/// # Shutdown
///
/// The background sweep task (started by
/// [`with_sweep_interval`](Self::with_sweep_interval)) stops when all clones
/// of the vault are dropped or when [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct MemoryVault {
    inner: Arc<Inner>,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl std::fmt::Debug for MemoryVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVault")
            .field("credentials", &self.inner.credentials.read().len())
            .field("resource_sets", &self.inner.resources.read().len())
            .finish()
    }
}

impl MemoryVault {
    /// Creates an empty vault without a background sweeper.
    ///
    /// Expired entries are still never served; they are evicted lazily on
    /// read. Call [`with_sweep_interval`](Self::with_sweep_interval) to also
    /// reclaim entries nobody reads again.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(());
        Self {
            inner: Arc::new(Inner::default()),
            shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }),
        }
    }

    /// Spawns the background sweep task, running every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_sweep_interval(self, interval: Duration) -> Self {
        let inner = Arc::clone(&self.inner);
        let shutdown_rx = self.shutdown_guard.shutdown_tx.subscribe();
        tokio::spawn(sweep_loop(inner, interval, shutdown_rx));
        tracing::info!(interval_secs = interval.as_secs(), "memory vault sweeper started");
        self
    }

    /// Removes all expired entries now, returning the number of credential
    /// entries removed.
    pub fn sweep_expired(&self) -> usize {
        let (credentials, resource_sets) = self.inner.sweep();
        if credentials + resource_sets > 0 {
            tracing::info!(credentials, resource_sets, "swept expired vault entries");
        }
        credentials
    }

    /// Signals the background sweep task to stop.
    ///
    /// Optional: the task also stops when every clone is dropped. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown_guard.shutdown_tx.send(());
    }

    /// Number of entries physically held, expired or not.
    ///
    /// Test hook for asserting sweep behaviour; not part of the vault contract.
    #[doc(hidden)]
    #[must_use]
    pub fn raw_len(&self) -> (usize, usize) {
        (self.inner.credentials.read().len(), self.inner.resources.read().len())
    }
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task removing expired entries every `interval` until shutdown.
async fn sweep_loop(inner: Arc<Inner>, interval: Duration, mut shutdown_rx: watch::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; start with a full interval wait.
    ticker.tick().await;

    loop {
        select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => {
                tracing::info!("memory vault sweeper shutting down");
                return;
            }
        }

        let (credentials, resource_sets) = inner.sweep();
        if credentials + resource_sets > 0 {
            tracing::info!(
                credentials,
                resource_sets,
                remaining = inner.credentials.read().len(),
                "swept expired vault entries"
            );
        }
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    #[tracing::instrument(name = "store_credential", skip_all, fields(principal = %principal))]
    async fn store_credential(
        &self,
        principal: &PrincipalId,
        credential: &UpstreamCredential,
        ttl: Duration,
    ) {
        if principal.is_blank() {
            tracing::warn!("refusing to store credential for blank principal");
            return;
        }
        if credential.is_blank() {
            tracing::warn!("refusing to store blank credential");
            return;
        }

        let entry = Expiring::new(credential.clone(), ttl);
        self.inner.credentials.write().insert(principal.clone(), entry);
        tracing::debug!(ttl_secs = ttl.as_secs(), "stored upstream credential");
    }

    #[tracing::instrument(name = "retrieve_credential", skip_all, fields(principal = %principal))]
    async fn retrieve_credential(&self, principal: &PrincipalId) -> Option<UpstreamCredential> {
        if principal.is_blank() {
            return None;
        }
        read_live(&self.inner.credentials, principal)
    }

    #[tracing::instrument(name = "remove_credential", skip_all, fields(principal = %principal))]
    async fn remove_credential(&self, principal: &PrincipalId) {
        let had_credential = self.inner.credentials.write().remove(principal).is_some();
        let had_resources = self.inner.resources.write().remove(principal).is_some();
        if had_credential || had_resources {
            tracing::debug!("removed upstream credential and resource set");
        }
    }

    #[tracing::instrument(name = "credential_exists", skip_all, fields(principal = %principal))]
    async fn credential_exists(&self, principal: &PrincipalId) -> bool {
        if principal.is_blank() {
            return false;
        }
        read_live(&self.inner.credentials, principal).is_some()
    }

    #[tracing::instrument(
        name = "store_authorized_resources",
        skip_all,
        fields(principal = %principal, count = resources.len())
    )]
    async fn store_authorized_resources(
        &self,
        principal: &PrincipalId,
        resources: &ResourceSet,
        ttl: Duration,
    ) {
        if principal.is_blank() || resources.is_empty() {
            tracing::debug!("ignoring empty authorized resource set");
            return;
        }

        let entry = Expiring::new(resources.clone(), ttl);
        self.inner.resources.write().insert(principal.clone(), entry);
        tracing::debug!("cached authorized resources");
    }

    #[tracing::instrument(
        name = "retrieve_authorized_resources",
        skip_all,
        fields(principal = %principal)
    )]
    async fn retrieve_authorized_resources(&self, principal: &PrincipalId) -> Option<ResourceSet> {
        if principal.is_blank() {
            return None;
        }
        read_live(&self.inner.resources, principal).filter(|set| !set.is_empty())
    }

    async fn clear(&self) {
        self.inner.credentials.write().clear();
        self.inner.resources.write().clear();
        tracing::info!("cleared all entries from memory vault");
    }

    async fn size(&self) -> usize {
        let now = Instant::now();
        self.inner.credentials.read().values().filter(|entry| !entry.is_expired_at(now)).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::ResourceId;

    fn principal(id: &str) -> PrincipalId {
        PrincipalId::from(id)
    }

    fn resources(ids: &[&str]) -> ResourceSet {
        ids.iter().copied().map(ResourceId::from).collect()
    }

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let vault = MemoryVault::new();
        let u1 = principal("u1");

        vault.store_credential(&u1, &"ext-1".into(), Duration::from_secs(60)).await;

        let credential = vault.retrieve_credential(&u1).await.expect("credential stored");
        assert_eq!(credential.expose(), "ext-1");
        assert!(vault.credential_exists(&u1).await);
        assert_eq!(vault.size().await, 1);
    }

    #[tokio::test]
    async fn test_store_overwrites_previous_login() {
        let vault = MemoryVault::new();
        let u1 = principal("u1");

        vault.store_credential(&u1, &"first".into(), Duration::from_secs(60)).await;
        vault.store_credential(&u1, &"second".into(), Duration::from_secs(60)).await;

        let credential = vault.retrieve_credential(&u1).await.expect("credential stored");
        assert_eq!(credential.expose(), "second");
        assert_eq!(vault.size().await, 1);
    }

    #[tokio::test]
    async fn test_blank_inputs_are_not_stored() {
        let vault = MemoryVault::new();

        vault.store_credential(&principal(" "), &"ext".into(), Duration::from_secs(60)).await;
        vault.store_credential(&principal("u1"), &"".into(), Duration::from_secs(60)).await;
        vault.store_credential(&principal("u2"), &"   ".into(), Duration::from_secs(60)).await;

        assert_eq!(vault.raw_len(), (0, 0));
        assert!(vault.retrieve_credential(&principal("u1")).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_expiry_evicts_on_read() {
        let vault = MemoryVault::new();
        let u1 = principal("u1");

        vault.store_credential(&u1, &"ext".into(), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(vault.raw_len().0, 1, "entry is still physically present before the read");
        assert!(vault.retrieve_credential(&u1).await.is_none());
        assert_eq!(vault.raw_len().0, 0, "read must evict the stale entry");
        assert!(!vault.credential_exists(&u1).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exists_evicts_expired_entry() {
        let vault = MemoryVault::new();
        let u1 = principal("u1");

        vault.store_credential(&u1, &"ext".into(), Duration::from_secs(5)).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(!vault.credential_exists(&u1).await);
        assert_eq!(vault.raw_len().0, 0);
    }

    #[tokio::test]
    async fn test_empty_resource_set_is_ignored() {
        let vault = MemoryVault::new();
        let u1 = principal("u1");

        vault.store_authorized_resources(&u1, &ResourceSet::new(), Duration::from_secs(60)).await;

        assert!(vault.retrieve_authorized_resources(&u1).await.is_none());
        assert_eq!(vault.raw_len().1, 0);
    }

    #[tokio::test]
    async fn test_remove_clears_credential_and_resources() {
        let vault = MemoryVault::new();
        let u1 = principal("u1");

        vault.store_credential(&u1, &"ext".into(), Duration::from_secs(60)).await;
        vault.store_authorized_resources(&u1, &resources(&["r1"]), Duration::from_secs(60)).await;
        vault.remove_credential(&u1).await;

        assert!(vault.retrieve_credential(&u1).await.is_none());
        assert!(vault.retrieve_authorized_resources(&u1).await.is_none());
        assert_eq!(vault.raw_len(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired_entries() {
        let vault = MemoryVault::new();

        vault.store_credential(&principal("short"), &"a".into(), Duration::from_secs(5)).await;
        vault.store_credential(&principal("long"), &"b".into(), Duration::from_secs(500)).await;
        vault
            .store_authorized_resources(&principal("short"), &resources(&["r"]), Duration::from_secs(5))
            .await;

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(vault.sweep_expired(), 1);
        assert_eq!(vault.raw_len(), (1, 0));
        assert!(vault.credential_exists(&principal("long")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_reclaims_unread_entries() {
        let vault = MemoryVault::new().with_sweep_interval(Duration::from_secs(300));

        vault.store_credential(&principal("idle"), &"a".into(), Duration::from_secs(60)).await;

        // Two full intervals; the sweeper must have run at least once past expiry.
        tokio::time::sleep(Duration::from_secs(601)).await;

        assert_eq!(vault.raw_len().0, 0, "sweeper should remove entries nobody reads");
        vault.shutdown();
    }

    #[tokio::test]
    async fn test_clone_shares_data() {
        let vault = MemoryVault::new();
        let clone = vault.clone();

        vault.store_credential(&principal("u1"), &"ext".into(), Duration::from_secs(60)).await;

        assert!(clone.credential_exists(&principal("u1")).await);
    }

    #[tokio::test]
    async fn test_clear_empties_both_maps() {
        let vault = MemoryVault::new();

        vault.store_credential(&principal("u1"), &"ext".into(), Duration::from_secs(60)).await;
        vault
            .store_authorized_resources(&principal("u1"), &resources(&["r1"]), Duration::from_secs(60))
            .await;
        vault.clear().await;

        assert_eq!(vault.size().await, 0);
        assert_eq!(vault.raw_len(), (0, 0));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let vault = MemoryVault::new().with_sweep_interval(Duration::from_millis(10));
        vault.shutdown();
        vault.shutdown();
    }
}
