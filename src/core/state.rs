//! Last-seen notification IDs and release keys per namespace.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Notification ID of a namespace that has never been synced.
pub const DEFAULT_NOTIFICATION_ID: i64 = -1;

/// A namespace paired with a notification ID, as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Namespace name
    pub namespace_name: String,
    /// Notification ID
    pub notification_id: i64,
}

/// Last-seen notification ID of every subscribed namespace.
#[derive(Debug, Default)]
pub struct NotificationMap {
    ids: RwLock<HashMap<String, i64>>,
}

impl NotificationMap {
    /// Start every namespace at [`DEFAULT_NOTIFICATION_ID`].
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = namespaces
            .into_iter()
            .map(|namespace| (namespace.into(), DEFAULT_NOTIFICATION_ID))
            .collect();
        Self {
            ids: RwLock::new(ids),
        }
    }

    /// Last-seen ID of `namespace`.
    pub fn get(&self, namespace: &str) -> Option<i64> {
        self.ids.read().get(namespace).copied()
    }

    /// Record a new ID. Empty namespace names are ignored.
    pub fn update(&self, namespace: &str, notification_id: i64) {
        if namespace.is_empty() {
            return;
        }
        self.ids.write().insert(namespace.to_string(), notification_id);
    }

    /// Number of tracked namespaces.
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Whether no namespace is tracked.
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Every tracked namespace, sorted by name.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = self
            .ids
            .read()
            .iter()
            .map(|(namespace, id)| Notification {
                namespace_name: namespace.clone(),
                notification_id: *id,
            })
            .collect();
        notifications.sort_by(|a, b| a.namespace_name.cmp(&b.namespace_name));
        notifications
    }
}

/// Last-seen release key of every synced namespace.
#[derive(Debug, Default)]
pub struct ReleaseKeyMap {
    keys: RwLock<HashMap<String, String>>,
}

impl ReleaseKeyMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Release key of `namespace`, if it has been synced.
    pub fn get(&self, namespace: &str) -> Option<String> {
        self.keys.read().get(namespace).cloned()
    }

    /// Record the release key of `namespace`.
    pub fn set(&self, namespace: &str, release_key: impl Into<String>) {
        self.keys.write().insert(namespace.to_string(), release_key.into());
    }
}
