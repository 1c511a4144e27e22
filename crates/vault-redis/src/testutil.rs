//! Shared test utilities for Redis vault testing.
//!
//! Feature-gated behind `testutil`. Tests that need a live server should
//! check [`should_run`] first and give every vault its own
//! [`unique_prefix`] so runs never see each other's keys.
//!
//! ```no_run
//! // Requires the `testutil` feature and a running Redis server.
//! use progress_common_vault_redis::testutil::{connect_test_vault, should_run};
//!
//! # #[tokio::main]
//! # async fn main() {
//! if should_run() {
//!     let vault = connect_test_vault().await;
//! }
//! # }
//! ```

use std::{
    env,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use crate::{backend::RedisVault, config::RedisVaultConfig};

/// Environment variable that enables tests against a real server.
pub const RUN_ENV: &str = "RUN_REDIS_INTEGRATION_TESTS";

/// Environment variable holding the server URL.
pub const URL_ENV: &str = "REDIS_URL";

static PREFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns `true` if real-server tests should run.
pub fn should_run() -> bool {
    env::var(RUN_ENV).is_ok()
}

/// The server URL from the environment, or a local default.
pub fn redis_url() -> String {
    env::var(URL_ENV).unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned())
}

/// A key prefix no other test in this or a concurrent run uses.
pub fn unique_prefix() -> String {
    let n = PREFIX_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("progress-test:{}:{n}:", std::process::id())
}

/// A validated config for the server in [`redis_url`] with a fresh prefix.
///
/// # Panics
///
/// Panics if the URL from the environment is not a valid Redis URL.
pub fn test_config() -> RedisVaultConfig {
    RedisVaultConfig::builder()
        .url(redis_url())
        .key_prefix(unique_prefix())
        .command_timeout(Duration::from_secs(2))
        .build()
        .expect("valid redis test config")
}

/// Connects a vault with a fresh prefix.
///
/// # Panics
///
/// Panics if the server cannot be reached.
pub async fn connect_test_vault() -> RedisVault {
    RedisVault::connect(test_config()).await.expect("connect to test redis")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_prefix_is_unique() {
        let a = unique_prefix();
        let b = unique_prefix();
        assert_ne!(a, b);
        assert!(a.ends_with(':'));
    }

    #[test]
    fn test_config_uses_fresh_prefix() {
        let a = test_config();
        let b = test_config();
        assert_ne!(a.key_prefix(), b.key_prefix());
        assert_eq!(a.url(), redis_url());
    }
}
