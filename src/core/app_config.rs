//! Application identity and subscription settings.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Namespace subscribed when none is configured.
pub const DEFAULT_NAMESPACE: &str = "application";

/// Cluster used when none is configured.
pub const DEFAULT_CLUSTER: &str = "default";

/// Identity of the application and what it subscribes to.
///
/// Usually loaded with [`AppConfigLoader`](crate::core::AppConfigLoader)
/// from a file and `APOLLO_*` environment variables.
///
/// # Examples
///
/// ```rust
/// use apollo_client::core::AppConfig;
///
/// let config = AppConfig::new("order-service", "http://config.local:8080")
///     .with_namespaces("application,db.yaml");
///
/// assert_eq!(config.host(), "http://config.local:8080/");
/// assert_eq!(config.namespaces(), vec!["application", "db.yaml"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application ID
    pub app_id: String,
    /// Cluster name
    #[serde(default = "default_cluster")]
    pub cluster: String,
    /// Namespaces separated by commas or whitespace
    #[serde(default = "default_namespace")]
    pub namespace_name: String,
    /// Config-service address
    pub ip: String,
    /// Secret passed to the request signer
    #[serde(default)]
    pub secret: Option<String>,
    /// Grey-release label
    #[serde(default)]
    pub label: String,
    /// Whether applied snapshots are written to backup files
    #[serde(default = "default_true")]
    pub is_backup_config: bool,
    /// Directory holding backup files
    #[serde(default = "default_backup_path")]
    pub backup_config_path: PathBuf,
    /// Timeout in seconds for config fetches
    #[serde(default)]
    pub sync_server_timeout: Option<u64>,
    /// Fail start-up if a namespace cannot be loaded from anywhere
    #[serde(default)]
    pub must_start: bool,
}

impl AppConfig {
    /// Create a configuration with defaults for everything but the identity.
    pub fn new(app_id: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            cluster: default_cluster(),
            namespace_name: default_namespace(),
            ip: ip.into(),
            secret: None,
            label: String::new(),
            is_backup_config: true,
            backup_config_path: default_backup_path(),
            sync_server_timeout: None,
            must_start: false,
        }
    }

    /// Set the cluster.
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Set the subscribed namespaces as a delimited list.
    pub fn with_namespaces(mut self, namespaces: impl Into<String>) -> Self {
        self.namespace_name = namespaces.into();
        self
    }

    /// Set the signing secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set the grey-release label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Enable or disable backups and set their directory.
    pub fn with_backup(mut self, enabled: bool, path: impl Into<PathBuf>) -> Self {
        self.is_backup_config = enabled;
        self.backup_config_path = path.into();
        self
    }

    /// Override the config-fetch timeout.
    pub fn with_sync_server_timeout(mut self, timeout: Duration) -> Self {
        self.sync_server_timeout = Some(timeout.as_secs());
        self
    }

    /// Require every namespace to load during start-up.
    pub fn with_must_start(mut self, must_start: bool) -> Self {
        self.must_start = must_start;
        self
    }

    /// Check that the identity is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the app ID, address or namespace list
    /// is empty.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::Load("app_id must not be empty".to_string()));
        }
        if self.ip.trim().is_empty() {
            return Err(ConfigError::Load("ip must not be empty".to_string()));
        }
        if self.namespaces().is_empty() {
            return Err(ConfigError::Load("at least one namespace is required".to_string()));
        }
        Ok(())
    }

    /// Config-service address, always ending in `/`.
    pub fn host(&self) -> String {
        let ip = self.ip.trim();
        if ip.ends_with('/') {
            ip.to_string()
        } else {
            format!("{}/", ip)
        }
    }

    /// Subscribed namespaces, in configuration order and without duplicates.
    pub fn namespaces(&self) -> Vec<String> {
        split_namespaces(&self.namespace_name)
    }

    /// Config-fetch timeout override.
    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_server_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Split a delimited namespace list on commas and whitespace.
///
/// Empty entries and duplicates are dropped.
pub fn split_namespaces(list: &str) -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    for namespace in list.split(|c: char| c == ',' || c.is_whitespace()) {
        if namespace.is_empty() || namespaces.iter().any(|n| n == namespace) {
            continue;
        }
        namespaces.push(namespace.to_string());
    }
    namespaces
}

fn default_cluster() -> String {
    DEFAULT_CLUSTER.to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_backup_path() -> PathBuf {
    PathBuf::from(".")
}
