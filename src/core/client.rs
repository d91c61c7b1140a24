//! The client handle applications hold.

use crate::core::{AppConfig, ApolloClientBuilder, DEFAULT_NAMESPACE};
use crate::error::{ConfigError, Result};
use crate::notify::{ChangeDispatcher, EventListener};
use crate::store::{ChangeListener, ConfigRepository, NamespaceConfig, ReadMode};
use crate::sync::SyncEngine;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A running connection to the config service.
///
/// Reads go to local namespace caches and never touch the network. The sync
/// loop started by [`start`](Self::start) keeps the caches current and
/// reports changes to registered listeners.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_client::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<()> {
/// let client = ApolloClient::builder(AppConfig::new("order-service", "http://config:8080"))
///     .build()?;
/// client.start().await?;
///
/// client.add_listener(
///     Arc::new(|event: &KeyEvent| println!("{} is now {:?}", event.key, event.value)),
///     &[r"^db\."],
/// )?;
///
/// let timeout = client.get_int("http.timeout", 30);
/// # Ok(())
/// # }
/// ```
pub struct ApolloClient {
    app: Arc<AppConfig>,
    repository: Arc<ConfigRepository>,
    dispatcher: ChangeDispatcher,
    engine: Arc<SyncEngine>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ApolloClient {
    /// Create a new builder for `app`.
    pub fn builder(app: AppConfig) -> ApolloClientBuilder {
        ApolloClientBuilder::new(app)
    }

    pub(crate) fn new(
        app: Arc<AppConfig>,
        repository: Arc<ConfigRepository>,
        dispatcher: ChangeDispatcher,
        engine: Arc<SyncEngine>,
    ) -> Self {
        Self {
            app,
            repository,
            dispatcher,
            engine,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Load every namespace once, then start the background sync loop.
    ///
    /// Calling `start` on a running client does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Stopped`] after [`stop`](Self::stop), or
    /// [`ConfigError::Load`] when `must_start` is set and a namespace could
    /// not be loaded.
    pub async fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ConfigError::Stopped);
        }
        if self.is_running() {
            return Ok(());
        }

        if let Err(e) = self.engine.refresh_servers().await {
            debug!(error = %e, "initial server discovery failed");
        }
        self.engine.load_initial().await?;

        let mut task = self.task.lock();
        if task.is_none() {
            let engine = Arc::clone(&self.engine);
            let cancel = self.cancel.clone();
            *task = Some(tokio::spawn(async move { engine.run(cancel).await }));
            info!(app_id = %self.app.app_id, cluster = %self.app.cluster, "apollo client started");
        }
        Ok(())
    }

    /// Signal the sync loop to stop after its current cycle.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop the sync loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Whether the sync loop is running.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .task
                .lock()
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    /// The application identity this client syncs for.
    pub fn app_config(&self) -> &AppConfig {
        &self.app
    }

    /// Cache of `name`, if it is subscribed.
    pub fn namespace(&self, name: &str) -> Option<Arc<NamespaceConfig>> {
        self.repository.namespace(name)
    }

    /// Cache of the `application` namespace.
    pub fn default_namespace(&self) -> Arc<NamespaceConfig> {
        self.repository.namespace_or_create(DEFAULT_NAMESPACE)
    }

    /// Value of `key` in the `application` namespace.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.default_namespace().get(key, ReadMode::Immediate)
    }

    /// String value of `key` in the `application` namespace.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.default_namespace()
            .get_string(key, default, ReadMode::Immediate)
    }

    /// Integer value of `key` in the `application` namespace.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.default_namespace()
            .get_int(key, default, ReadMode::Immediate)
    }

    /// Boolean value of `key` in the `application` namespace.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.default_namespace()
            .get_bool(key, default, ReadMode::Immediate)
    }

    /// Deliver changes of keys matching any of `patterns` to `listener`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if a pattern does not compile;
    /// nothing is registered in that case.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>, patterns: &[&str]) -> Result<()> {
        self.dispatcher.register(listener, patterns)
    }

    /// Stop delivering changes for `patterns` to `listener`.
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>, patterns: &[&str]) {
        self.dispatcher.unregister(listener, patterns);
    }

    /// Receive every change event of every namespace.
    pub fn add_change_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.repository.add_change_listener(listener);
    }

    /// Remove a listener added with [`add_change_listener`](Self::add_change_listener).
    pub fn remove_change_listener(&self, listener: &Arc<dyn ChangeListener>) {
        self.repository.remove_change_listener(listener);
    }

    /// The pattern dispatcher.
    pub fn dispatcher(&self) -> &ChangeDispatcher {
        &self.dispatcher
    }

    /// The namespace repository.
    pub fn repository(&self) -> &Arc<ConfigRepository> {
        &self.repository
    }

    /// The sync engine.
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }
}

impl Drop for ApolloClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ApolloClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApolloClient")
            .field("app_id", &self.app.app_id)
            .field("cluster", &self.app.cluster)
            .field("namespaces", &self.repository.namespace_names())
            .finish()
    }
}
