//! Local configuration storage: per-namespace caches, diffs and change events.

mod change;
mod gate;
mod kv;
mod namespace;
mod repository;

pub use change::{ChangeEvent, ChangeKind, ChangeListener, ConfigChange, FullChangeEvent};
pub use gate::InitGate;
pub use kv::{KeyValueStore, MemoryStore, MemoryStoreFactory, StoreFactory};
pub use namespace::{NamespaceConfig, ReadMode, diff};
pub use repository::ConfigRepository;
