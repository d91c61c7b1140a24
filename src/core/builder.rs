//! Builder for constructing ApolloClient instances.

use crate::core::{AppConfig, ApolloClient};
use crate::error::Result;
use crate::notify::ChangeDispatcher;
use crate::sources::{BackupStore, ConfigFileFormat, ContentParser, FileBackup, FormatParsers};
use crate::store::{ConfigRepository, MemoryStoreFactory, StoreFactory};
use crate::sync::{SyncEngine, SyncOptions, protocol};
use crate::transport::{FirstAvailable, LoadBalance, RequestSigner, Transport, TransportOptions};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::SyncMetrics;

/// Builder for constructing an [`ApolloClient`].
///
/// Every pluggable collaborator has a default: in-memory stores, the
/// first-available load-balancing policy, unsigned requests, JSON backup
/// files and YAML content parsing.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_client::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<()> {
/// let app = AppConfig::new("order-service", "http://config:8080")
///     .with_namespaces("application,db.yaml");
///
/// let client = ApolloClient::builder(app)
///     .with_load_balance(Arc::new(RoundRobin::new()))
///     .with_sync_interval(Duration::from_secs(5))
///     .build()?;
/// client.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct ApolloClientBuilder {
    app: AppConfig,
    store_factory: Arc<dyn StoreFactory>,
    balancer: Arc<dyn LoadBalance>,
    signer: Option<Arc<dyn RequestSigner>>,
    backup: Arc<dyn BackupStore>,
    parsers: FormatParsers,
    transport_options: TransportOptions,
    sync_options: SyncOptions,
    client_ip: Option<String>,
    #[cfg(feature = "metrics")]
    metrics: Option<SyncMetrics>,
}

impl ApolloClientBuilder {
    /// Create a builder for `app` with default collaborators.
    pub fn new(app: AppConfig) -> Self {
        Self {
            app,
            store_factory: Arc::new(MemoryStoreFactory),
            balancer: Arc::new(FirstAvailable),
            signer: None,
            backup: Arc::new(FileBackup),
            parsers: FormatParsers::default(),
            transport_options: TransportOptions::default(),
            sync_options: SyncOptions::default(),
            client_ip: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Create each namespace's key/value store with `factory`.
    pub fn with_store_factory(mut self, factory: Arc<dyn StoreFactory>) -> Self {
        self.store_factory = factory;
        self
    }

    /// Choose among known servers with `balancer` during failover.
    pub fn with_load_balance(mut self, balancer: Arc<dyn LoadBalance>) -> Self {
        self.balancer = balancer;
        self
    }

    /// Sign every request with `signer`.
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Persist and load backups with `backup`.
    pub fn with_backup_store(mut self, backup: Arc<dyn BackupStore>) -> Self {
        self.backup = backup;
        self
    }

    /// Parse namespaces of `format` with `parser`.
    pub fn with_parser(mut self, format: ConfigFileFormat, parser: Arc<dyn ContentParser>) -> Self {
        self.parsers = self.parsers.with_parser(format, parser);
        self
    }

    /// Replace the transport tunables.
    pub fn with_transport_options(mut self, options: TransportOptions) -> Self {
        self.transport_options = options;
        self
    }

    /// Replace the sync loop timing.
    pub fn with_sync_options(mut self, options: SyncOptions) -> Self {
        self.sync_options = options;
        self
    }

    /// Pause `interval` between sync cycles.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_options.interval = interval;
        self
    }

    /// Report `ip` to the config service instead of the detected address.
    ///
    /// Without an override the address of the outbound route is detected
    /// once in [`build`](Self::build).
    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    /// Record sync metrics with `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(SyncMetrics::new(meter));
        self
    }

    /// Build the client. Nothing is fetched until [`ApolloClient::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the application configuration is invalid or the
    /// HTTP client cannot be created.
    pub fn build(self) -> Result<ApolloClient> {
        self.app.validate()?;

        let mut transport = Transport::builder()
            .with_options(self.transport_options)
            .with_load_balance(self.balancer);
        if let Some(signer) = self.signer {
            transport = transport.with_signer(signer);
        }
        let transport = Arc::new(transport.build()?);

        let app = Arc::new(self.app);
        let repository = Arc::new(ConfigRepository::new(app.namespaces(), self.store_factory));
        let dispatcher = ChangeDispatcher::new();
        repository.add_change_listener(Arc::new(dispatcher.clone()));

        let mut engine = SyncEngine::new(
            Arc::clone(&app),
            transport,
            Arc::clone(&repository),
            self.backup,
            Arc::new(self.parsers),
            self.sync_options,
        );
        if let Some(ip) = self.client_ip.or_else(protocol::local_ip) {
            engine = engine.with_client_ip(ip);
        }
        #[cfg(feature = "metrics")]
        if let Some(metrics) = self.metrics {
            engine = engine.with_metrics(metrics);
        }

        Ok(ApolloClient::new(app, repository, dispatcher, Arc::new(engine)))
    }
}
