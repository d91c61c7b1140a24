//! Config-service wire format: request URIs and response bodies.

use crate::core::{AppConfig, Notification};
use crate::error::{ConfigError, Result};
use crate::transport::ServerInfo;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::UdpSocket;

const URI_BASE: &str = "http://apollo.invalid/";

/// A namespace's configuration as returned by the config service and as
/// stored in backup files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    /// Application ID
    #[serde(default)]
    pub app_id: String,
    /// Cluster the snapshot was released to
    #[serde(default)]
    pub cluster: String,
    /// Namespace name
    #[serde(default)]
    pub namespace_name: String,
    /// Server-assigned version of this snapshot
    #[serde(default)]
    pub release_key: String,
    /// Keys and values
    #[serde(default)]
    pub configurations: HashMap<String, Value>,
}

/// `notifications/v2?appId=..&cluster=..&notifications=[..]`
pub fn notifications_uri(app: &AppConfig, notifications: &[Notification]) -> Result<String> {
    let notifications = serde_json::to_string(notifications)?;
    build_uri(
        &["notifications", "v2"],
        &[
            ("appId", app.app_id.as_str()),
            ("cluster", app.cluster.as_str()),
            ("notifications", notifications.as_str()),
        ],
    )
}

/// `configs/{appId}/{cluster}/{namespace}?releaseKey=..&ip=..&label=..`
pub fn config_uri(
    app: &AppConfig,
    namespace: &str,
    release_key: &str,
    client_ip: &str,
) -> Result<String> {
    build_uri(
        &["configs", &app.app_id, &app.cluster, namespace],
        &[
            ("releaseKey", release_key),
            ("ip", client_ip),
            ("label", app.label.as_str()),
        ],
    )
}

/// `services/config?appId=..&ip=..`
pub fn services_uri(app: &AppConfig, client_ip: &str) -> Result<String> {
    build_uri(
        &["services", "config"],
        &[("appId", app.app_id.as_str()), ("ip", client_ip)],
    )
}

fn build_uri(segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(URI_BASE).map_err(|e| ConfigError::Other(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ConfigError::Other("base URL cannot hold a path".to_string()))?
        .clear()
        .extend(segments);
    url.query_pairs_mut().extend_pairs(query);
    Ok(url.as_str().trim_start_matches(URI_BASE).to_string())
}

/// Decode a long-poll response. An empty body means no namespace changed.
pub fn decode_notifications(body: &[u8]) -> Result<Vec<Notification>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(body)?)
}

/// Decode a config fetch response.
pub fn decode_snapshot(body: &[u8]) -> Result<ConfigSnapshot> {
    Ok(serde_json::from_slice(body)?)
}

/// Decode a server discovery response.
pub fn decode_services(body: &[u8]) -> Result<Vec<ServerInfo>> {
    Ok(serde_json::from_slice(body)?)
}

/// Best-effort address of the interface used for outbound traffic.
///
/// No packet is sent; connecting a UDP socket only selects a route.
pub fn local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}
