//! Pattern-based routing of key changes to listeners.

use super::spawn_listener;
use crate::error::{ConfigError, Result};
use crate::store::{ChangeEvent, ChangeKind, ChangeListener, ConfigChange, FullChangeEvent};
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A change to a single key, as delivered to an [`EventListener`].
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    /// Namespace the key belongs to
    pub namespace: String,
    /// The changed key
    pub key: String,
    /// Kind of change
    pub kind: ChangeKind,
    /// New value, or the removed value for deletions
    pub value: Option<Value>,
}

impl KeyEvent {
    fn new(namespace: &str, key: &str, change: &ConfigChange) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            kind: change.kind(),
            value: change.current_value().cloned(),
        }
    }
}

/// Receiver of per-key change events.
///
/// Implemented for any `Fn(&KeyEvent)` closure.
pub trait EventListener: Send + Sync {
    /// Called once per matching (pattern, key) pair.
    fn on_event(&self, event: &KeyEvent);

    /// Called with the complete key set of a refreshed namespace.
    fn on_full_refresh(&self, _event: &FullChangeEvent) {}
}

impl<F> EventListener for F
where
    F: Fn(&KeyEvent) + Send + Sync,
{
    fn on_event(&self, event: &KeyEvent) {
        self(event)
    }
}

struct Registration {
    regex: Regex,
    listeners: Vec<Arc<dyn EventListener>>,
}

/// Routes change events to listeners whose key pattern matches.
///
/// Patterns are regular expressions searched anywhere in the key, so `db`
/// matches `mydb.host` while `^db\.` only matches keys starting with `db.`.
/// Every (pattern, listener) match is delivered on its own task with no
/// ordering guarantee.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_client::notify::{ChangeDispatcher, KeyEvent};
/// use std::sync::Arc;
///
/// # fn example() -> apollo_client::error::Result<()> {
/// let dispatcher = ChangeDispatcher::new();
/// dispatcher.register(
///     Arc::new(|event: &KeyEvent| println!("{} changed", event.key)),
///     &[r"^db\."],
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ChangeDispatcher {
    registrations: Arc<RwLock<HashMap<String, Registration>>>,
}

impl ChangeDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under each of `patterns`.
    ///
    /// Registering the same listener twice under one pattern is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if any pattern fails to
    /// compile; in that case nothing is registered.
    pub fn register(&self, listener: Arc<dyn EventListener>, patterns: &[&str]) -> Result<()> {
        info!(?patterns, "registering change listener");

        let compiled = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map(|regex| (pattern.to_string(), regex))
                    .map_err(|e| ConfigError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut registrations = self.registrations.write();
        for (pattern, regex) in compiled {
            let registration = registrations.entry(pattern).or_insert_with(|| Registration {
                regex,
                listeners: Vec::new(),
            });
            if registration
                .listeners
                .iter()
                .any(|existing| same_listener(existing, &listener))
            {
                debug!(pattern = registration.regex.as_str(), "listener already registered");
                continue;
            }
            registration.listeners.push(Arc::clone(&listener));
        }
        Ok(())
    }

    /// Remove `listener` from each of `patterns`.
    ///
    /// Patterns or listeners that were never registered are ignored.
    pub fn unregister(&self, listener: &Arc<dyn EventListener>, patterns: &[&str]) {
        let mut registrations = self.registrations.write();
        for pattern in patterns {
            let Some(registration) = registrations.get_mut(*pattern) else {
                continue;
            };
            registration
                .listeners
                .retain(|existing| !same_listener(existing, listener));
            if registration.listeners.is_empty() {
                registrations.remove(*pattern);
            }
        }
    }

    /// Number of listeners registered under `pattern`.
    pub fn listener_count(&self, pattern: &str) -> usize {
        self.registrations
            .read()
            .get(pattern)
            .map_or(0, |registration| registration.listeners.len())
    }

    /// Deliver every key of `event` to the listeners whose pattern matches it.
    pub fn dispatch(&self, event: &ChangeEvent) {
        info!(namespace = %event.namespace, "dispatching change event");

        let mut deliveries = Vec::new();
        {
            let registrations = self.registrations.read();
            for (key, change) in &event.changes {
                for (pattern, registration) in registrations.iter() {
                    if !registration.regex.is_match(key) {
                        continue;
                    }
                    let key_event = Arc::new(KeyEvent::new(&event.namespace, key, change));
                    for listener in &registration.listeners {
                        debug!(pattern = %pattern, key = %key, "event generated");
                        deliveries.push((Arc::clone(listener), Arc::clone(&key_event)));
                    }
                }
            }
        }

        for (listener, key_event) in deliveries {
            spawn_listener(move || listener.on_event(&key_event));
        }
    }

    /// Forward a full refresh once to every distinct registered listener.
    ///
    /// No pattern matching is done; listeners receive the whole key set.
    pub fn dispatch_full_refresh(&self, event: Arc<FullChangeEvent>) {
        let mut targets: Vec<Arc<dyn EventListener>> = Vec::new();
        for registration in self.registrations.read().values() {
            for listener in &registration.listeners {
                if !targets.iter().any(|seen| same_listener(seen, listener)) {
                    targets.push(Arc::clone(listener));
                }
            }
        }

        for listener in targets {
            let event = Arc::clone(&event);
            spawn_listener(move || listener.on_full_refresh(&event));
        }
    }
}

impl ChangeListener for ChangeDispatcher {
    fn on_change(&self, event: Arc<ChangeEvent>) {
        self.dispatch(&event);
    }

    fn on_full_refresh(&self, event: Arc<FullChangeEvent>) {
        self.dispatch_full_refresh(event);
    }
}

fn same_listener(a: &Arc<dyn EventListener>, b: &Arc<dyn EventListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
