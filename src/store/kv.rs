//! Key-value container contract backing each namespace.

use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Associative container a namespace stores its values in.
///
/// Implementations must tolerate concurrent readers and writers without any
/// external locking; [`NamespaceConfig`](crate::store::NamespaceConfig) only
/// serialises its own writers.
pub trait KeyValueStore: Send + Sync {
    /// Insert or overwrite a value.
    fn set(&self, key: &str, value: Value);

    /// Look up a value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Remove a key. Returns `true` if it was present.
    fn delete(&self, key: &str) -> bool;

    /// Number of stored entries.
    fn entry_count(&self) -> usize;

    /// Visit every entry until the visitor returns `false`.
    fn for_each(&self, visit: &mut dyn FnMut(&str, &Value) -> bool);

    /// Remove every entry.
    fn clear(&self);

    /// Make the store hold exactly `entries`.
    ///
    /// The default applies the change key by key, so concurrent readers may
    /// observe a mix of old and new entries. Stores that can swap their
    /// contents in one step should override this.
    fn replace_all(&self, entries: HashMap<String, Value>) {
        let mut stale = Vec::new();
        self.for_each(&mut |key, _| {
            if !entries.contains_key(key) {
                stale.push(key.to_string());
            }
            true
        });
        for key in stale {
            self.delete(&key);
        }
        for (key, value) in entries {
            self.set(&key, value);
        }
    }

    /// Copy every entry out of the store.
    fn to_map(&self) -> HashMap<String, Value> {
        let mut map = HashMap::with_capacity(self.entry_count());
        self.for_each(&mut |key, value| {
            map.insert(key.to_string(), value.clone());
            true
        });
        map
    }
}

/// Creates one [`KeyValueStore`] per subscribed namespace.
pub trait StoreFactory: Send + Sync {
    /// Build an empty store.
    fn create(&self) -> Box<dyn KeyValueStore>;
}

/// Lock-free in-memory store.
///
/// Every write publishes a fresh map through `arc-swap`, so readers never
/// block and [`replace_all`](KeyValueStore::replace_all) is a single atomic
/// pointer swap.
#[derive(Default)]
pub struct MemoryStore {
    entries: ArcSwap<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents as a shared snapshot.
    pub fn snapshot(&self) -> Arc<HashMap<String, Value>> {
        self.entries.load_full()
    }
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: Value) {
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.to_string(), value.clone());
            next
        });
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.entries.load().get(key).cloned()
    }

    fn delete(&self, key: &str) -> bool {
        let previous = self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(key);
            next
        });
        previous.contains_key(key)
    }

    fn entry_count(&self) -> usize {
        self.entries.load().len()
    }

    fn for_each(&self, visit: &mut dyn FnMut(&str, &Value) -> bool) {
        let snapshot = self.entries.load_full();
        for (key, value) in snapshot.iter() {
            if !visit(key, value) {
                break;
            }
        }
    }

    fn clear(&self) {
        self.entries.store(Arc::new(HashMap::new()));
    }

    fn replace_all(&self, entries: HashMap<String, Value>) {
        self.entries.store(Arc::new(entries));
    }

    fn to_map(&self) -> HashMap<String, Value> {
        HashMap::clone(&self.entries.load())
    }
}

/// Factory for [`MemoryStore`], the default store.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStoreFactory;

impl StoreFactory for MemoryStoreFactory {
    fn create(&self) -> Box<dyn KeyValueStore> {
        Box::new(MemoryStore::new())
    }
}
