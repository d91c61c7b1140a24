//! Known config servers and their down-node bookkeeping.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default time a failing server is skipped for.
pub const DEFAULT_DOWN_WINDOW: Duration = Duration::from_secs(30);

/// A config server instance as reported by service discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Service name
    #[serde(default)]
    pub app_name: String,
    /// Instance identifier
    #[serde(default)]
    pub instance_id: String,
    /// Base URL requests are sent to
    pub homepage_url: String,
    /// Whether the server is inside its down window
    #[serde(skip)]
    pub is_down: bool,
}

impl ServerInfo {
    /// Describe a server by URL only.
    pub fn new(homepage_url: impl Into<String>) -> Self {
        Self {
            app_name: String::new(),
            instance_id: String::new(),
            homepage_url: homepage_url.into(),
            is_down: false,
        }
    }
}

#[derive(Default)]
struct PoolEntry {
    servers: Vec<ServerInfo>,
    down_until: HashMap<String, Instant>,
    primary_retry_at: Option<Instant>,
}

/// Per config-service record of alternate servers and which ones are down.
///
/// Entries are keyed by the logical config-service address and created
/// lazily, either when servers are discovered or when a node first fails.
/// Each client owns its own pool, so independent clients never share state.
pub struct ServerPool {
    entries: Mutex<HashMap<String, PoolEntry>>,
    down_window: Duration,
}

impl ServerPool {
    /// Create an empty pool that marks failing nodes down for `down_window`.
    pub fn new(down_window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            down_window,
        }
    }

    /// How long a failing node is skipped.
    pub fn down_window(&self) -> Duration {
        self.down_window
    }

    /// Replace the known servers for `config_service`.
    ///
    /// Servers that are still listed keep their down status.
    pub fn set_servers(&self, config_service: &str, servers: Vec<ServerInfo>) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(config_service.to_string()).or_default();
        entry
            .down_until
            .retain(|url, _| servers.iter().any(|s| &s.homepage_url == url));
        entry.servers = servers;
    }

    /// Known servers for `config_service`, with `is_down` evaluated now.
    pub fn servers(&self, config_service: &str) -> Vec<ServerInfo> {
        let now = Instant::now();
        let entries = self.entries.lock();
        let Some(entry) = entries.get(config_service) else {
            return Vec::new();
        };
        entry
            .servers
            .iter()
            .map(|server| {
                let mut server = server.clone();
                server.is_down = entry
                    .down_until
                    .get(&server.homepage_url)
                    .is_some_and(|until| *until > now);
                server
            })
            .collect()
    }

    /// Whether the primary address is cooling down and alternates must be used.
    pub fn should_failover(&self, config_service: &str) -> bool {
        let entries = self.entries.lock();
        entries
            .get(config_service)
            .filter(|entry| !entry.servers.is_empty())
            .and_then(|entry| entry.primary_retry_at)
            .is_some_and(|retry_at| retry_at > Instant::now())
    }

    /// Mark `host` down for the down window.
    ///
    /// Every known server whose URL contains `host` is marked down. When
    /// `host` is the config-service address itself, the primary is also
    /// skipped until the window elapses.
    pub fn set_down_node(&self, config_service: &str, host: &str) {
        if host.is_empty() {
            return;
        }

        let until = Instant::now() + self.down_window;
        let mut entries = self.entries.lock();
        let entry = entries.entry(config_service.to_string()).or_default();

        if entry.servers.is_empty() {
            entry.servers.push(ServerInfo::new(host));
        }
        if host == config_service {
            entry.primary_retry_at = Some(until);
        }

        for server in &entry.servers {
            if server.homepage_url.contains(host) {
                debug!(server = %server.homepage_url, "marking config server down");
                entry.down_until.insert(server.homepage_url.clone(), until);
            }
        }
    }
}

impl Default for ServerPool {
    fn default() -> Self {
        Self::new(DEFAULT_DOWN_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: &str = "http://config.local:8080/";

    #[test]
    fn test_unknown_service_connects_directly() {
        let pool = ServerPool::default();
        assert!(!pool.should_failover(PRIMARY));
        assert!(pool.servers(PRIMARY).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_cool_down() {
        let pool = ServerPool::new(Duration::from_secs(30));
        pool.set_down_node(PRIMARY, PRIMARY);

        assert!(pool.should_failover(PRIMARY));
        assert!(pool.servers(PRIMARY)[0].is_down);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(pool.should_failover(PRIMARY));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!pool.should_failover(PRIMARY));
        assert!(!pool.servers(PRIMARY)[0].is_down);
    }

    #[test]
    fn test_down_node_substring_match() {
        let pool = ServerPool::default();
        pool.set_servers(
            PRIMARY,
            vec![
                ServerInfo::new("http://10.0.0.1:8080/"),
                ServerInfo::new("http://10.0.0.2:8080/"),
            ],
        );

        pool.set_down_node(PRIMARY, "10.0.0.1");

        let servers = pool.servers(PRIMARY);
        assert!(servers[0].is_down);
        assert!(!servers[1].is_down);
        // Only failures of the primary itself trigger failover
        assert!(!pool.should_failover(PRIMARY));
    }

    #[test]
    fn test_set_servers_keeps_down_status() {
        let pool = ServerPool::default();
        pool.set_servers(PRIMARY, vec![ServerInfo::new("http://a/")]);
        pool.set_down_node(PRIMARY, "http://a/");

        pool.set_servers(
            PRIMARY,
            vec![ServerInfo::new("http://a/"), ServerInfo::new("http://b/")],
        );

        let servers = pool.servers(PRIMARY);
        assert!(servers[0].is_down);
        assert!(!servers[1].is_down);
    }

    #[test]
    fn test_empty_host_ignored() {
        let pool = ServerPool::default();
        pool.set_down_node(PRIMARY, "");
        assert!(pool.servers(PRIMARY).is_empty());
    }

    #[test]
    fn test_server_info_json() {
        let servers: Vec<ServerInfo> = serde_json::from_str(
            r#"[{"appName":"APOLLO-CONFIGSERVICE","instanceId":"node-1","homepageUrl":"http://10.0.0.1:8080/"}]"#,
        )
        .unwrap();
        assert_eq!(servers[0].instance_id, "node-1");
        assert!(!servers[0].is_down);
    }
}
