//! Early invalidation of session tokens.
//!
//! Session tokens are self-validating, so logging out cannot "delete" one.
//! Instead the raw token is recorded here until its natural expiry; every
//! request checks membership before trusting the signature.
//!
//! # Usage
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//! use chrono::{TimeDelta, Utc};
//! use progress_common_authn::{InMemoryRevocationRegistry, RevocationRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(InMemoryRevocationRegistry::new())
//!         .with_sweep_interval(Duration::from_secs(300));
//!
//!     registry.revoke("eyJ...", Utc::now() + TimeDelta::minutes(15)).await;
//!     assert!(registry.is_revoked("eyJ...").await);
//!
//!     registry.shutdown().await;
//! }
//! ```
//!
//! # Design
//!
//! - **Per-entry expiry**: each entry lives until the token itself would have expired; after that
//!   the signature check rejects the token on its own.
//! - **No capacity bound**: evicting an entry early would silently un-revoke a live token, so
//!   memory is bounded by the sweep instead.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::jwt::token_prefix;

/// Default interval between background sweeps (5 minutes).
pub const DEFAULT_REVOCATION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Tracks tokens that must be rejected before their natural expiry.
#[async_trait]
pub trait RevocationRegistry: Send + Sync {
    /// Records `token` as revoked until `natural_expiry`.
    ///
    /// Idempotent; revoking again overwrites the stored expiry. Blank tokens
    /// are ignored with a warning.
    async fn revoke(&self, token: &str, natural_expiry: DateTime<Utc>);

    /// Returns `true` if `token` has been revoked and not yet swept.
    async fn is_revoked(&self, token: &str) -> bool;

    /// Forgets a revocation. Returns `true` if an entry was removed.
    async fn remove(&self, token: &str) -> bool;

    /// Number of tracked entries.
    async fn len(&self) -> usize;

    /// Returns `true` if no entries are tracked.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every entry.
    async fn clear(&self);
}

type Entries = Arc<RwLock<HashMap<String, DateTime<Utc>>>>;

/// In-process [`RevocationRegistry`] backed by a `parking_lot` map.
///
/// # Thread Safety
///
/// `InMemoryRevocationRegistry` is `Send + Sync` and safe for concurrent use
/// from multiple async tasks. Sweeps take the write lock once and remove
/// expired entries with `retain`, so they are safe under concurrent
/// `revoke`/`is_revoked`.
///
/// # Shutdown
///
/// The background sweep task stops when [`shutdown`](Self::shutdown) is called
/// or when the registry is dropped (via `CancellationToken`).
pub struct InMemoryRevocationRegistry {
    entries: Entries,
    cancel_token: CancellationToken,
    /// Wrapped in `Mutex` so `shutdown()` can take ownership via `&self`.
    sweep_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for InMemoryRevocationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRevocationRegistry")
            .field("entries", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryRevocationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRevocationRegistry {
    /// Creates an empty registry without a background sweeper.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            cancel_token: CancellationToken::new(),
            sweep_handle: Mutex::new(None),
        }
    }

    /// Starts the background sweep task, running every `interval`.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    #[must_use]
    pub fn with_sweep_interval(self: Arc<Self>, interval: Duration) -> Arc<Self> {
        let entries = Arc::clone(&self.entries);
        let token = self.cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; consume it so we start
            // with a full interval wait.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("revocation sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweep_entries(&entries, Utc::now());
                    }
                }
            }
        });

        tracing::info!(interval_secs = interval.as_secs(), "revocation sweeper started");
        *self.sweep_handle.lock() = Some(handle);
        self
    }

    /// Removes every entry whose natural expiry has passed.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Removes every entry whose natural expiry is at or before `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        sweep_entries(&self.entries, now)
    }

    /// Stops the background sweep task and waits for it to finish.
    ///
    /// Idempotent. Entries are kept.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        // Take the handle so we can await it without holding the lock.
        let handle = self.sweep_handle.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::warn!(error = %err, "revocation sweep task panicked");
        }
    }

    /// Returns the cancellation token controlling the sweep task.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for InMemoryRevocationRegistry {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

fn sweep_entries(entries: &RwLock<HashMap<String, DateTime<Utc>>>, now: DateTime<Utc>) -> usize {
    let (removed, remaining) = {
        let mut map = entries.write();
        let before = map.len();
        map.retain(|_, expiry| *expiry > now);
        (before - map.len(), map.len())
    };
    if removed > 0 {
        tracing::info!(removed, remaining, "swept expired revocations");
    }
    removed
}

#[async_trait]
impl RevocationRegistry for InMemoryRevocationRegistry {
    async fn revoke(&self, token: &str, natural_expiry: DateTime<Utc>) {
        if token.trim().is_empty() {
            tracing::warn!("refusing to revoke blank token");
            return;
        }
        self.entries.write().insert(token.to_owned(), natural_expiry);
        tracing::debug!(
            token_prefix = %token_prefix(token),
            expires_at = %natural_expiry,
            "token revoked"
        );
    }

    async fn is_revoked(&self, token: &str) -> bool {
        self.entries.read().contains_key(token)
    }

    async fn remove(&self, token: &str) -> bool {
        self.entries.write().remove(token).is_some()
    }

    async fn len(&self) -> usize {
        self.entries.read().len()
    }

    async fn clear(&self) {
        let removed = {
            let mut map = self.entries.write();
            let count = map.len();
            map.clear();
            count
        };
        tracing::info!(removed, "cleared revocation registry");
    }
}
