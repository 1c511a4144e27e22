//! The assembled broker.

use std::sync::Arc;

use progress_common_authn::{InMemoryRevocationRegistry, RevocationRegistry, TokenCodec};

use crate::{
    backend::VaultBackend,
    config::BrokerConfig,
    error::BrokerError,
    gate::AuthorizationGate,
    login::LoginOrchestrator,
    middleware::SessionMiddleware,
    upstream::{ResourceDirectory, UpstreamAuthenticator},
};

/// All broker services wired together from one [`BrokerConfig`].
///
/// The token codec, revocation registry and credential vault are shared by
/// the middleware, the gate and the login orchestrator. Background sweepers
/// run until [`shutdown`](Self::shutdown) is called or the broker is dropped.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use progress_common_broker::{
///     Broker, BrokerConfig, ResourceDirectory, UpstreamAuthenticator,
/// };
///
/// # async fn example(
/// #     authenticator: Arc<dyn UpstreamAuthenticator>,
/// #     directory: Arc<dyn ResourceDirectory>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// let broker = Broker::from_config(BrokerConfig::default(), authenticator, directory).await?;
///
/// let pair = broker.login().login("alice", "secret").await?;
/// let header = format!("Bearer {}", pair.access_token);
/// if let Some(ctx) = broker.middleware().authenticate(Some(&header)).await {
///     broker.gate().require(&ctx, &"R1".into()).await?;
/// }
///
/// broker.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Broker {
    codec: Arc<TokenCodec>,
    registry: Arc<InMemoryRevocationRegistry>,
    vault: Arc<VaultBackend>,
    middleware: SessionMiddleware<VaultBackend>,
    gate: AuthorizationGate<VaultBackend>,
    login: LoginOrchestrator<VaultBackend>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("vault", &self.vault.name())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Broker {
    /// Validates `config` and starts every service.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::Config`] for an invalid configuration
    /// - [`BrokerError::BackendUnavailable`] if the vault cannot be reached
    /// - [`BrokerError::Internal`] if no signing key can be produced
    #[tracing::instrument(skip_all)]
    pub async fn from_config(
        config: BrokerConfig,
        authenticator: Arc<dyn UpstreamAuthenticator>,
        directory: Arc<dyn ResourceDirectory>,
    ) -> Result<Self, BrokerError> {
        config.validate()?;

        let keys = config.tokens.signing_keys()?;
        let codec = Arc::new(TokenCodec::new(keys));
        let registry = Arc::new(InMemoryRevocationRegistry::new())
            .with_sweep_interval(config.revocation_sweep_interval);
        let vault = match VaultBackend::from_config(&config.vault).await {
            Ok(vault) => Arc::new(vault),
            Err(err) => {
                registry.shutdown().await;
                return Err(err);
            },
        };
        let dyn_registry = Arc::clone(&registry) as Arc<dyn RevocationRegistry>;

        let middleware = SessionMiddleware::new(
            Arc::clone(&codec),
            Arc::clone(&dyn_registry),
            Arc::clone(&vault),
        );
        let gate = AuthorizationGate::new(Arc::clone(&vault), directory)
            .with_cache_ttl(config.resource_cache_ttl)
            .with_upstream_timeout(config.upstream_timeout);
        let login = LoginOrchestrator::new(
            Arc::clone(&codec),
            dyn_registry,
            Arc::clone(&vault),
            authenticator,
        )
        .with_ttls(config.tokens.access_ttl, config.tokens.refresh_ttl)
        .with_upstream_timeout(config.upstream_timeout);

        tracing::info!(vault = vault.name(), "session broker started");
        Ok(Self { codec, registry, vault, middleware, gate, login })
    }

    /// The token codec.
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// The revocation registry.
    #[must_use]
    pub fn registry(&self) -> &InMemoryRevocationRegistry {
        &self.registry
    }

    /// The credential vault.
    #[must_use]
    pub fn vault(&self) -> &VaultBackend {
        &self.vault
    }

    /// Request session resolution.
    #[must_use]
    pub fn middleware(&self) -> &SessionMiddleware<VaultBackend> {
        &self.middleware
    }

    /// Per-resource authorization.
    #[must_use]
    pub fn gate(&self) -> &AuthorizationGate<VaultBackend> {
        &self.gate
    }

    /// Login, refresh and logout.
    #[must_use]
    pub fn login(&self) -> &LoginOrchestrator<VaultBackend> {
        &self.login
    }

    /// Stops the background sweepers and waits for the revocation sweeper to
    /// exit. Idempotent.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
        self.vault.shutdown();
        tracing::info!("session broker stopped");
    }
}
