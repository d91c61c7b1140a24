//! Local cache of a single namespace.

use super::change::ConfigChange;
use super::gate::InitGate;
use super::kv::{KeyValueStore, StoreFactory};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

/// How a read behaves before the namespace has been loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Return nothing straight away if the namespace is not loaded yet.
    #[default]
    Immediate,
    /// Block the calling thread until the first successful load.
    WaitForInit,
}

/// The locally cached configuration of one namespace.
///
/// Reads are served from the underlying [`KeyValueStore`]. Until the first
/// non-empty snapshot is applied the namespace is "not initialized": reads in
/// [`ReadMode::Immediate`] come back empty while [`ReadMode::WaitForInit`]
/// reads wait for the load.
///
/// # Examples
///
/// ```rust
/// use apollo_client::store::{MemoryStoreFactory, NamespaceConfig, ReadMode};
/// use serde_json::json;
/// use std::collections::HashMap;
///
/// let config = NamespaceConfig::new("application", &MemoryStoreFactory);
/// assert_eq!(config.get_int("port", 80, ReadMode::Immediate), 80);
///
/// config.update(&HashMap::from([("port".to_string(), json!("8080"))]));
/// assert_eq!(config.get_int("port", 80, ReadMode::Immediate), 8080);
/// ```
pub struct NamespaceConfig {
    namespace: String,
    store: Box<dyn KeyValueStore>,
    gate: InitGate,
    /// Serialises updates so each diff is computed against a stable base
    write_lock: Mutex<()>,
}

impl NamespaceConfig {
    /// Create an uninitialized namespace with a fresh store from `factory`.
    pub fn new(namespace: impl Into<String>, factory: &dyn StoreFactory) -> Self {
        Self {
            namespace: namespace.into(),
            store: factory.create(),
            gate: InitGate::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Namespace name.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether the first successful load has happened.
    pub fn is_initialized(&self) -> bool {
        self.gate.is_open()
    }

    /// Wait asynchronously for the first successful load.
    pub async fn wait_ready(&self) {
        self.gate.wait().await;
    }

    /// Read a raw value.
    ///
    /// In [`ReadMode::WaitForInit`] this blocks the current thread without a
    /// bound; async callers should use [`get_ready`](Self::get_ready).
    pub fn get(&self, key: &str, mode: ReadMode) -> Option<Value> {
        if !self.is_initialized() {
            match mode {
                ReadMode::Immediate => {
                    debug!(namespace = %self.namespace, key, "namespace not initialized yet");
                    return None;
                }
                ReadMode::WaitForInit => self.gate.wait_blocking(),
            }
        }
        self.store.get(key)
    }

    /// Read a raw value, waiting asynchronously for the first load.
    pub async fn get_ready(&self, key: &str) -> Option<Value> {
        self.gate.wait().await;
        self.store.get(key)
    }

    /// Read a value as a string.
    ///
    /// Numbers and booleans are rendered as text.
    pub fn get_string(&self, key: &str, default: &str, mode: ReadMode) -> String {
        match self.get(key, mode) {
            Some(Value::String(s)) => s,
            Some(value @ (Value::Number(_) | Value::Bool(_))) => value.to_string(),
            Some(other) => {
                debug!(key, value = %other, "value is not a string");
                default.to_string()
            }
            None => default.to_string(),
        }
    }

    /// Read a value as an integer, parsing strings.
    pub fn get_int(&self, key: &str, default: i64, mode: ReadMode) -> i64 {
        match self.get(key, mode) {
            Some(value) => value_to_int(&value).unwrap_or_else(|| {
                debug!(key, value = %value, "failed to convert value to int");
                default
            }),
            None => default,
        }
    }

    /// Read a value as a float, parsing strings.
    pub fn get_float(&self, key: &str, default: f64, mode: ReadMode) -> f64 {
        let parsed = match self.get(key, mode) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
            None => return default,
        };
        parsed.unwrap_or_else(|| {
            debug!(key, "failed to convert value to float");
            default
        })
    }

    /// Read a value as a boolean, parsing strings such as `"true"` or `"0"`.
    pub fn get_bool(&self, key: &str, default: bool, mode: ReadMode) -> bool {
        let parsed = match self.get(key, mode) {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::String(s)) => parse_bool(&s),
            Some(_) => None,
            None => return default,
        };
        parsed.unwrap_or_else(|| {
            debug!(key, "failed to convert value to bool");
            default
        })
    }

    /// Read a list of strings.
    ///
    /// Native arrays are returned as-is; strings are split on `separator`.
    pub fn get_string_list(
        &self,
        key: &str,
        separator: &str,
        default: Vec<String>,
        mode: ReadMode,
    ) -> Vec<String> {
        match self.get(key, mode) {
            Some(Value::Array(items)) => items.iter().map(render).collect(),
            Some(Value::String(s)) => s.split(separator).map(str::to_string).collect(),
            Some(other) => {
                debug!(key, value = %other, "value is not a list");
                default
            }
            None => default,
        }
    }

    /// Read a list of integers.
    ///
    /// Any element that fails to convert makes the whole read fall back to
    /// `default`.
    pub fn get_int_list(
        &self,
        key: &str,
        separator: &str,
        default: Vec<i64>,
        mode: ReadMode,
    ) -> Vec<i64> {
        let parsed: Option<Vec<i64>> = match self.get(key, mode) {
            Some(Value::Array(items)) => items.iter().map(value_to_int).collect(),
            Some(Value::String(s)) => s.split(separator).map(|p| p.trim().parse().ok()).collect(),
            Some(_) => None,
            None => return default,
        };
        parsed.unwrap_or_else(|| {
            debug!(key, "failed to convert value to int list");
            default
        })
    }

    /// All keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.store.entry_count());
        self.store.for_each(&mut |key, _| {
            keys.push(key.to_string());
            true
        });
        keys
    }

    /// Copy of every stored entry.
    pub fn entries(&self) -> HashMap<String, Value> {
        self.store.to_map()
    }

    /// Render the namespace as `key=value` lines, in no particular order.
    pub fn content(&self) -> String {
        let mut out = String::new();
        self.store.for_each(&mut |key, value| {
            let _ = writeln!(out, "{}={}", key, render(value));
            true
        });
        out
    }

    /// Replace the namespace contents with `configurations` and return the diff.
    ///
    /// The first update that leaves the namespace non-empty (or empties a
    /// non-empty one) opens the init gate. An empty snapshot against an empty
    /// store changes nothing and leaves an uninitialized namespace waiting.
    pub fn update(&self, configurations: &HashMap<String, Value>) -> HashMap<String, ConfigChange> {
        let _guard = self.write_lock.lock();

        let current = self.store.to_map();
        if configurations.is_empty() && current.is_empty() {
            if !self.is_initialized() {
                warn!(
                    namespace = %self.namespace,
                    "received empty configuration, namespace stays uninitialized"
                );
            }
            return HashMap::new();
        }

        let changes = diff(&current, configurations);
        self.store.replace_all(configurations.clone());

        if self.gate.open() {
            info!(
                namespace = %self.namespace,
                keys = configurations.len(),
                "namespace initialized"
            );
        }
        changes
    }
}

impl std::fmt::Debug for NamespaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceConfig")
            .field("namespace", &self.namespace)
            .field("initialized", &self.is_initialized())
            .field("entries", &self.store.entry_count())
            .finish()
    }
}

/// Classify every key of `current` and `next`.
///
/// Keys only in `next` are added, keys in both with unequal values are
/// modified, keys only in `current` are deleted. Equal keys are omitted.
pub fn diff(
    current: &HashMap<String, Value>,
    next: &HashMap<String, Value>,
) -> HashMap<String, ConfigChange> {
    let mut changes = HashMap::new();

    for (key, value) in next {
        match current.get(key) {
            None => {
                changes.insert(key.clone(), ConfigChange::added(value.clone()));
            }
            Some(old) if old != value => {
                changes.insert(key.clone(), ConfigChange::modified(old.clone(), value.clone()));
            }
            Some(_) => {}
        }
    }

    for (key, old) in current {
        if !next.contains_key(key) {
            changes.insert(key.clone(), ConfigChange::deleted(old.clone()));
        }
    }

    changes
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
