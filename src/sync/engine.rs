//! The sync loop: long-poll for changes, fetch changed namespaces, apply
//! them to the repository and keep local backups current.

use super::protocol::{
    ConfigSnapshot, config_uri, decode_notifications, decode_services, decode_snapshot,
    notifications_uri, services_uri,
};
use crate::core::{AppConfig, DEFAULT_NOTIFICATION_ID, Notification, NotificationMap, ReleaseKeyMap};
use crate::error::{ConfigError, Result};
use crate::sources::{BackupStore, FormatParsers};
use crate::store::ConfigRepository;
use crate::transport::{ConnectConfig, Outcome, ServerInfo, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::SyncMetrics;

/// Pause between two sync cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(2);

/// How long the server may hold a notification request open.
pub const DEFAULT_LONG_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How often the list of config servers is rediscovered.
pub const DEFAULT_SERVER_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Timing of the sync loop.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Pause between cycles
    pub interval: Duration,
    /// Timeout of the long-poll request, and of config fetches unless
    /// [`AppConfig::sync_server_timeout`] overrides it
    pub long_poll_timeout: Duration,
    /// Interval between server discovery calls
    pub server_refresh_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            long_poll_timeout: DEFAULT_LONG_POLL_TIMEOUT,
            server_refresh_interval: DEFAULT_SERVER_REFRESH_INTERVAL,
        }
    }
}

/// Keeps a [`ConfigRepository`] in sync with the config service.
///
/// Each cycle sends one long-poll request carrying the last-seen notification
/// ID of every namespace. Namespaces the server reports as changed are
/// fetched and applied; their notification ID advances only when the fetch
/// succeeds. If the long-poll itself fails, namespaces are served from their
/// backup files instead.
pub struct SyncEngine {
    app: Arc<AppConfig>,
    transport: Arc<Transport>,
    repository: Arc<ConfigRepository>,
    backup: Arc<dyn BackupStore>,
    parsers: Arc<FormatParsers>,
    notifications: NotificationMap,
    release_keys: ReleaseKeyMap,
    options: SyncOptions,
    client_ip: String,
    #[cfg(feature = "metrics")]
    metrics: Option<SyncMetrics>,
}

impl SyncEngine {
    /// Create an engine for the namespaces subscribed by `app`.
    ///
    /// No client address is reported until one is set with
    /// [`with_client_ip`](Self::with_client_ip).
    pub fn new(
        app: Arc<AppConfig>,
        transport: Arc<Transport>,
        repository: Arc<ConfigRepository>,
        backup: Arc<dyn BackupStore>,
        parsers: Arc<FormatParsers>,
        options: SyncOptions,
    ) -> Self {
        Self {
            notifications: NotificationMap::new(app.namespaces()),
            release_keys: ReleaseKeyMap::new(),
            client_ip: String::new(),
            app,
            transport,
            repository,
            backup,
            parsers,
            options,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Report `ip` as this client's address.
    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }

    /// Record sync metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Last-seen notification IDs.
    pub fn notifications(&self) -> &NotificationMap {
        &self.notifications
    }

    /// Last-seen release keys.
    pub fn release_keys(&self) -> &ReleaseKeyMap {
        &self.release_keys
    }

    /// The repository snapshots are applied to.
    pub fn repository(&self) -> &Arc<ConfigRepository> {
        &self.repository
    }

    /// Active timing options.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Address reported to the config service.
    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    /// Run sync cycles every [`SyncOptions::interval`] until `cancel` fires.
    ///
    /// A cycle already in flight is allowed to finish; cancellation is
    /// observed between cycles.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(app_id = %self.app.app_id, "sync engine started");
        let mut next_refresh = Instant::now() + self.options.server_refresh_interval;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.options.interval) => {}
            }

            if Instant::now() >= next_refresh {
                if let Err(e) = self.refresh_servers().await {
                    debug!(error = %e, "server discovery failed");
                }
                next_refresh = Instant::now() + self.options.server_refresh_interval;
            }

            let applied = self.sync_once().await;
            if !applied.is_empty() {
                debug!(count = applied.len(), "sync cycle applied snapshots");
            }
        }

        info!(app_id = %self.app.app_id, "sync engine stopped");
    }

    /// Run one sync cycle and return the snapshots it applied.
    pub async fn sync_once(&self) -> Vec<ConfigSnapshot> {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(SyncMetrics::start_long_poll);

        let polled = self.long_poll().await;

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_long_poll(timer);
        }

        let changed = match polled {
            Ok(Outcome::NotModified) => {
                debug!("no namespace changed");
                return Vec::new();
            }
            Ok(Outcome::Body(changed)) => changed,
            Err(e) => {
                warn!(error = %e, "notification request failed, loading backups");
                self.record_failure("notify");
                return self.apply_backups().await;
            }
        };

        let mut applied = Vec::new();
        for notification in changed {
            let namespace = notification.namespace_name.as_str();
            match self.fetch_namespace(namespace).await {
                Ok(Some(snapshot)) => {
                    self.notifications
                        .update(namespace, notification.notification_id);
                    self.apply(namespace, &snapshot, true);
                    applied.push(snapshot);
                }
                Ok(None) => {
                    debug!(namespace, "config not modified");
                    self.notifications
                        .update(namespace, notification.notification_id);
                }
                Err(e) => {
                    warn!(namespace, error = %e, "fetch config failed");
                    self.record_failure("fetch");
                }
            }
        }
        applied
    }

    /// Fetch and apply every subscribed namespace once, falling back to
    /// backups for namespaces that cannot be fetched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if [`AppConfig::must_start`] is set and
    /// a namespace could be loaded from neither source.
    pub async fn load_initial(&self) -> Result<()> {
        let mut missing = Vec::new();

        for namespace in self.app.namespaces() {
            match self.fetch_namespace(&namespace).await {
                Ok(Some(snapshot)) => {
                    self.apply(&namespace, &snapshot, true);
                    continue;
                }
                Ok(None) => debug!(namespace = %namespace, "initial fetch not modified"),
                Err(e) => {
                    warn!(
                        namespace = %namespace,
                        error = %e,
                        "initial fetch failed, trying backup"
                    );
                    self.record_failure("fetch");
                }
            }

            if !self.apply_backup(&namespace).await {
                missing.push(namespace);
            }
        }

        if missing.is_empty() {
            return Ok(());
        }
        if self.app.must_start {
            error!(namespaces = ?missing, "required namespaces could not be loaded");
            return Err(ConfigError::Load(format!(
                "namespaces could not be loaded: {}",
                missing.join(", ")
            )));
        }
        warn!(namespaces = ?missing, "namespaces start without configuration");
        Ok(())
    }

    /// Fetch the current snapshot of `namespace`.
    ///
    /// Returns `Ok(None)` when the server reports the cached release as
    /// current.
    pub async fn fetch_namespace(&self, namespace: &str) -> Result<Option<ConfigSnapshot>> {
        let release_key = self.release_keys.get(namespace).unwrap_or_default();
        let connect = ConnectConfig {
            uri: config_uri(&self.app, namespace, &release_key, &self.client_ip)?,
            app_id: self.app.app_id.clone(),
            secret: self.app.secret.clone(),
            timeout: Some(
                self.app
                    .sync_timeout()
                    .unwrap_or(self.options.long_poll_timeout),
            ),
            retry: true,
        };

        let parsers = &self.parsers;
        let decode = |body: &[u8]| -> Result<ConfigSnapshot> {
            let mut snapshot = decode_snapshot(body)?;
            snapshot.configurations =
                parsers.expand(namespace, std::mem::take(&mut snapshot.configurations))?;
            Ok(snapshot)
        };

        let outcome = self
            .transport
            .request_with_failover(&self.app.host(), &connect, &decode)
            .await?;

        Ok(outcome.into_body().map(|mut snapshot| {
            if snapshot.namespace_name.is_empty() {
                snapshot.namespace_name = namespace.to_string();
            }
            if snapshot.app_id.is_empty() {
                snapshot.app_id = self.app.app_id.clone();
            }
            snapshot
        }))
    }

    /// Replace the transport's known servers with the discovered ones.
    ///
    /// Discovery talks to the primary address directly so a failing
    /// discovery endpoint never marks the primary down.
    pub async fn refresh_servers(&self) -> Result<usize> {
        let host = self.app.host();
        let connect = ConnectConfig {
            uri: services_uri(&self.app, &self.client_ip)?,
            app_id: self.app.app_id.clone(),
            secret: self.app.secret.clone(),
            timeout: None,
            retry: false,
        };

        let url = format!("{}{}", host, connect.uri);
        let servers: Vec<ServerInfo> = match self
            .transport
            .request_once(&url, &connect, &decode_services)
            .await?
        {
            Outcome::Body(servers) => servers,
            Outcome::NotModified => return Ok(0),
        };

        let count = servers.len();
        if count > 0 {
            self.transport.pool().set_servers(&host, servers);
        }
        info!(count, "config servers refreshed");
        Ok(count)
    }

    async fn long_poll(&self) -> Result<Outcome<Vec<Notification>>> {
        let connect = ConnectConfig {
            uri: notifications_uri(&self.app, &self.notifications.notifications())?,
            app_id: self.app.app_id.clone(),
            secret: self.app.secret.clone(),
            timeout: Some(self.options.long_poll_timeout),
            retry: false,
        };
        self.transport
            .request_with_failover(&self.app.host(), &connect, &decode_notifications)
            .await
    }

    async fn apply_backups(&self) -> Vec<ConfigSnapshot> {
        let mut applied = Vec::new();
        for namespace in self.app.namespaces() {
            if let Some(snapshot) = self.load_backup(&namespace).await {
                let current = self.release_keys.get(&namespace);
                let initialized = self
                    .repository
                    .namespace(&namespace)
                    .is_some_and(|n| n.is_initialized());
                if initialized && current.as_deref() == Some(snapshot.release_key.as_str()) {
                    continue;
                }
                self.apply(&namespace, &snapshot, false);
                applied.push(snapshot);
            }
        }
        applied
    }

    async fn apply_backup(&self, namespace: &str) -> bool {
        match self.load_backup(namespace).await {
            Some(snapshot) => {
                self.apply(namespace, &snapshot, false);
                true
            }
            None => false,
        }
    }

    async fn load_backup(&self, namespace: &str) -> Option<ConfigSnapshot> {
        let loaded = self
            .backup
            .load(&self.app.backup_config_path, &self.app.app_id, namespace)
            .await;

        match loaded {
            Ok(Some(snapshot)) => {
                info!(namespace, release_key = %snapshot.release_key, "loaded config from backup");
                self.record_backup_fallback(namespace);
                Some(snapshot)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(namespace, error = %e, "load backup failed");
                None
            }
        }
    }

    fn apply(&self, namespace: &str, snapshot: &ConfigSnapshot, persist: bool) {
        self.release_keys
            .set(namespace, snapshot.release_key.clone());
        let notification_id = self
            .notifications
            .get(namespace)
            .unwrap_or(DEFAULT_NOTIFICATION_ID);
        self.repository
            .apply(namespace, &snapshot.configurations, notification_id);
        self.record_applied(namespace);

        if persist && self.app.is_backup_config {
            let backup = Arc::clone(&self.backup);
            let dir = self.app.backup_config_path.clone();
            let snapshot = snapshot.clone();
            tokio::spawn(async move {
                if let Err(e) = backup.write(&snapshot, &dir).await {
                    warn!(namespace = %snapshot.namespace_name, error = %e, "write backup failed");
                }
            });
        }
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn record_failure(&self, stage: &'static str) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(stage);
        }
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn record_backup_fallback(&self, namespace: &str) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_backup_fallback(namespace);
        }
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn record_applied(&self, namespace: &str) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_applied(namespace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChangeDispatcher, KeyEvent};
    use crate::sources::FileBackup;
    use crate::store::{ChangeKind, MemoryStoreFactory, ReadMode};
    use crate::transport::TransportOptions;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    const CLOSED: &str = "http://127.0.0.1:1";

    fn engine(host: &str, backup_dir: &Path, namespaces: &str, must_start: bool) -> SyncEngine {
        let options = SyncOptions {
            interval: Duration::from_millis(10),
            long_poll_timeout: Duration::from_secs(2),
            server_refresh_interval: Duration::from_secs(300),
        };
        engine_with_options(host, backup_dir, namespaces, must_start, options)
    }

    fn engine_with_options(
        host: &str,
        backup_dir: &Path,
        namespaces: &str,
        must_start: bool,
        options: SyncOptions,
    ) -> SyncEngine {
        let app = Arc::new(
            AppConfig::new("svc", host)
                .with_namespaces(namespaces)
                .with_backup(true, backup_dir)
                .with_must_start(must_start),
        );
        let transport = Transport::builder()
            .with_options(TransportOptions {
                connect_timeout: Duration::from_secs(1),
                max_retries: 2,
                retry_interval: Duration::from_millis(1),
                down_window: Duration::from_secs(30),
            })
            .build()
            .unwrap();
        let repository = ConfigRepository::new(app.namespaces(), Arc::new(MemoryStoreFactory));

        SyncEngine::new(
            app,
            Arc::new(transport),
            Arc::new(repository),
            Arc::new(FileBackup),
            Arc::new(FormatParsers::default()),
            options,
        )
        .with_client_ip("10.0.0.1")
    }

    fn snapshot_body(
        namespace: &str,
        release_key: &str,
        configurations: serde_json::Value,
    ) -> String {
        json!({
            "appId": "svc",
            "cluster": "default",
            "namespaceName": namespace,
            "releaseKey": release_key,
            "configurations": configurations,
        })
        .to_string()
    }

    fn write_backup(dir: &Path, namespace: &str, configurations: serde_json::Value) {
        std::fs::write(
            FileBackup::file_path(dir, "svc", namespace),
            snapshot_body(namespace, "backup-rk", configurations),
        )
        .unwrap();
    }

    async fn wait_for_file(path: &Path) -> bool {
        for _ in 0..100 {
            if path.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_not_modified_fetches_nothing() {
        let mut server = Server::new_async().await;
        let poll = server
            .mock("GET", "/notifications/v2")
            .match_query(Matcher::Any)
            .with_status(304)
            .expect(1)
            .create_async()
            .await;
        let fetch = server
            .mock("GET", Matcher::Regex("^/configs/".to_string()))
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let engine = engine(&server.url(), dir.path(), "application", false);

        assert!(engine.sync_once().await.is_empty());
        assert_eq!(engine.notifications().get("application"), Some(DEFAULT_NOTIFICATION_ID));
        assert!(!engine.repository().namespace("application").unwrap().is_initialized());
        poll.assert_async().await;
        fetch.assert_async().await;
    }

    #[tokio::test]
    async fn test_changed_namespace_applied() {
        let mut server = Server::new_async().await;
        let _poll = server
            .mock("GET", "/notifications/v2")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"namespaceName":"application","notificationId":5}]"#)
            .create_async()
            .await;
        let fetch = server
            .mock("GET", "/configs/svc/default/application")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ip".to_string(), "10.0.0.1".to_string()),
                Matcher::UrlEncoded("releaseKey".to_string(), String::new()),
            ]))
            .with_status(200)
            .with_body(snapshot_body("application", "rk-5", json!({"timeout": "30"})))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let engine = engine(&server.url(), dir.path(), "application", false);

        let applied = engine.sync_once().await;
        assert_eq!(applied.len(), 1);
        assert_eq!(engine.notifications().get("application"), Some(5));
        assert_eq!(engine.release_keys().get("application").as_deref(), Some("rk-5"));

        let namespace = engine.repository().namespace("application").unwrap();
        assert!(namespace.is_initialized());
        assert_eq!(namespace.get_int("timeout", 0, ReadMode::Immediate), 30);

        let backup = FileBackup::file_path(dir.path(), "svc", "application");
        assert!(wait_for_file(&backup).await);
        fetch.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_notification_id() {
        let mut server = Server::new_async().await;
        let _poll = server
            .mock("GET", "/notifications/v2")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"namespaceName":"application","notificationId":9}]"#)
            .create_async()
            .await;
        let _fetch = server
            .mock("GET", "/configs/svc/default/application")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let engine = engine(&server.url(), dir.path(), "application", false);

        assert!(engine.sync_once().await.is_empty());
        assert_eq!(engine.notifications().get("application"), Some(DEFAULT_NOTIFICATION_ID));
    }

    #[tokio::test]
    async fn test_unmodified_fetch_advances_notification_id() {
        let mut server = Server::new_async().await;
        let _poll = server
            .mock("GET", "/notifications/v2")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"namespaceName":"application","notificationId":7}]"#)
            .create_async()
            .await;
        let fetch = server
            .mock("GET", "/configs/svc/default/application")
            .match_query(Matcher::Any)
            .with_status(304)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let engine = engine(&server.url(), dir.path(), "application", false);

        assert!(engine.sync_once().await.is_empty());
        assert_eq!(engine.notifications().get("application"), Some(7));
        assert!(engine.release_keys().get("application").is_none());

        let namespace = engine.repository().namespace("application").unwrap();
        assert!(!namespace.is_initialized());
        assert!(namespace.keys().is_empty());
        assert!(!FileBackup::file_path(dir.path(), "svc", "application").exists());
        fetch.assert_async().await;
    }

    #[tokio::test]
    async fn test_notify_failure_loads_backup_and_dispatches() {
        let dir = TempDir::new().unwrap();
        write_backup(dir.path(), "application", json!({"db.host": "10.0.0.5"}));

        let engine = engine(CLOSED, dir.path(), "application", false);
        let dispatcher = ChangeDispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .register(
                Arc::new(move |event: &KeyEvent| {
                    let _ = tx.send(event.clone());
                }),
                &[r"^db\..*"],
            )
            .unwrap();
        engine.repository().add_change_listener(Arc::new(dispatcher));

        let applied = engine.sync_once().await;
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].release_key, "backup-rk");

        let namespace = engine.repository().namespace("application").unwrap();
        assert_eq!(namespace.get_string("db.host", "", ReadMode::Immediate), "10.0.0.5");

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.key, "db.host");
        assert_eq!(event.kind, ChangeKind::Added);

        // The same backup is not re-applied on the next failing cycle.
        assert!(engine.sync_once().await.is_empty());
    }

    #[tokio::test]
    async fn test_yaml_namespace_expanded() {
        let mut server = Server::new_async().await;
        let _poll = server
            .mock("GET", "/notifications/v2")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"namespaceName":"db.yaml","notificationId":2}]"#)
            .create_async()
            .await;
        let _fetch = server
            .mock("GET", "/configs/svc/default/db.yaml")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(snapshot_body(
                "db.yaml",
                "rk-2",
                json!({"content": "pool:\n  size: 8\n"}),
            ))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let engine = engine(&server.url(), dir.path(), "db.yaml", false);
        engine.sync_once().await;

        let namespace = engine.repository().namespace("db.yaml").unwrap();
        assert_eq!(namespace.get_int("pool.size", 0, ReadMode::Immediate), 8);
    }

    #[tokio::test]
    async fn test_initial_load_with_backup_fallback() {
        let mut server = Server::new_async().await;
        let _app = server
            .mock("GET", "/configs/svc/default/application")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(snapshot_body("application", "rk-1", json!({"a": "1"})))
            .create_async()
            .await;
        let _redis = server
            .mock("GET", "/configs/svc/default/redis")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        write_backup(dir.path(), "redis", json!({"ttl": "60"}));

        let engine = engine(&server.url(), dir.path(), "application,redis", true);
        engine.load_initial().await.unwrap();

        let redis = engine.repository().namespace("redis").unwrap();
        assert_eq!(redis.get_int("ttl", 0, ReadMode::Immediate), 60);
        assert!(engine.repository().namespace("application").unwrap().is_initialized());
    }

    #[tokio::test]
    async fn test_must_start_fails_without_any_source() {
        let dir = TempDir::new().unwrap();

        let strict = engine(CLOSED, dir.path(), "application", true);
        assert!(matches!(strict.load_initial().await, Err(ConfigError::Load(_))));

        let lenient = engine(CLOSED, dir.path(), "application", false);
        assert!(lenient.load_initial().await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_servers() {
        let mut server = Server::new_async().await;
        let _services = server
            .mock("GET", "/services/config")
            .match_query(Matcher::UrlEncoded("appId".to_string(), "svc".to_string()))
            .with_status(200)
            .with_body(r#"[{"appName":"APOLLO-CONFIGSERVICE","instanceId":"n1","homepageUrl":"http://10.0.0.2:8080/"}]"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let engine = engine(&server.url(), dir.path(), "application", false);

        assert_eq!(engine.refresh_servers().await.unwrap(), 1);
        let host = format!("{}/", server.url());
        let servers = engine.transport.pool().servers(&host);
        assert_eq!(servers[0].homepage_url, "http://10.0.0.2:8080/");
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let mut server = Server::new_async().await;
        let poll = server
            .mock("GET", "/notifications/v2")
            .match_query(Matcher::Any)
            .with_status(304)
            .expect_at_least(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let engine = Arc::new(engine(&server.url(), dir.path(), "application", false));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let engine = Arc::clone(&engine);
            let cancel = cancel.clone();
            async move { engine.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        poll.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_refreshes_servers_periodically() {
        let mut server = Server::new_async().await;
        let services = server
            .mock("GET", "/services/config")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .expect_at_least(2)
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/notifications/v2")
            .match_query(Matcher::Any)
            .with_status(304)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let options = SyncOptions {
            interval: Duration::from_millis(10),
            long_poll_timeout: Duration::from_secs(2),
            server_refresh_interval: Duration::from_millis(30),
        };
        let engine = Arc::new(engine_with_options(
            &server.url(),
            dir.path(),
            "application",
            false,
            options,
        ));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let engine = Arc::clone(&engine);
            let cancel = cancel.clone();
            async move { engine.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(400)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        services.assert_async().await;
    }
}
