//! Registry of subscribed namespaces and their change listeners.

use super::change::{ChangeEvent, ChangeListener, FullChangeEvent};
use super::kv::StoreFactory;
use super::namespace::NamespaceConfig;
use crate::notify::spawn_listener;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Holds one [`NamespaceConfig`] per namespace and fans applied updates out
/// to registered [`ChangeListener`]s.
pub struct ConfigRepository {
    namespaces: RwLock<HashMap<String, Arc<NamespaceConfig>>>,
    factory: Arc<dyn StoreFactory>,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl ConfigRepository {
    /// Create uninitialized entries for every namespace in `namespaces`.
    pub fn new<I, S>(namespaces: I, factory: Arc<dyn StoreFactory>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        for namespace in namespaces {
            let namespace = namespace.into();
            map.entry(namespace.clone())
                .or_insert_with(|| Arc::new(NamespaceConfig::new(namespace, factory.as_ref())));
        }

        Self {
            namespaces: RwLock::new(map),
            factory,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Look up a namespace.
    pub fn namespace(&self, name: &str) -> Option<Arc<NamespaceConfig>> {
        if name.is_empty() {
            return None;
        }
        self.namespaces.read().get(name).cloned()
    }

    /// Look up a namespace, creating an uninitialized entry if it is unknown.
    pub fn namespace_or_create(&self, name: &str) -> Arc<NamespaceConfig> {
        if let Some(existing) = self.namespace(name) {
            return existing;
        }
        let mut namespaces = self.namespaces.write();
        Arc::clone(
            namespaces
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(NamespaceConfig::new(name, self.factory.as_ref()))),
        )
    }

    /// Names of every known namespace.
    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.read().keys().cloned().collect()
    }

    /// Register a listener for every namespace.
    pub fn add_change_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove a previously registered listener. Unknown listeners are ignored.
    pub fn remove_change_listener(&self, listener: &Arc<dyn ChangeListener>) {
        self.listeners
            .write()
            .retain(|existing| !same_listener(existing, listener));
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Apply a snapshot to `namespace` and notify listeners.
    ///
    /// Every listener receives a [`FullChangeEvent`]; a [`ChangeEvent`] is
    /// sent, and returned, only when at least one key changed.
    pub fn apply(
        &self,
        namespace: &str,
        configurations: &HashMap<String, Value>,
        notification_id: i64,
    ) -> Option<Arc<ChangeEvent>> {
        let config = self.namespace_or_create(namespace);
        let changes = config.update(configurations);

        let listeners = self.listeners.read().clone();

        let full = Arc::new(FullChangeEvent {
            namespace: namespace.to_string(),
            notification_id,
            configurations: configurations.clone(),
        });
        for listener in &listeners {
            let listener = Arc::clone(listener);
            let event = Arc::clone(&full);
            spawn_listener(move || listener.on_full_refresh(event));
        }

        if changes.is_empty() {
            debug!(namespace, "snapshot applied without changes");
            return None;
        }

        let event = Arc::new(ChangeEvent {
            namespace: namespace.to_string(),
            notification_id,
            changes,
        });
        debug!(namespace, changed = event.changes.len(), "pushing change event");
        for listener in listeners {
            let event = Arc::clone(&event);
            spawn_listener(move || listener.on_change(event));
        }
        Some(event)
    }
}

fn same_listener(a: &Arc<dyn ChangeListener>, b: &Arc<dyn ChangeListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
