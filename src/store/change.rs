//! Change model produced when a namespace is updated.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// How a single key changed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Key is new in the snapshot.
    Added,
    /// Key exists in both with different values.
    Modified,
    /// Key disappeared from the snapshot.
    Deleted,
}

/// Change to one key.
///
/// Built only through the constructors, which keep `old_value`/`new_value`
/// consistent with the kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    old_value: Option<Value>,
    new_value: Option<Value>,
    kind: ChangeKind,
}

impl ConfigChange {
    /// A key that did not exist before.
    pub fn added(new_value: Value) -> Self {
        Self {
            old_value: None,
            new_value: Some(new_value),
            kind: ChangeKind::Added,
        }
    }

    /// A key whose value changed.
    pub fn modified(old_value: Value, new_value: Value) -> Self {
        Self {
            old_value: Some(old_value),
            new_value: Some(new_value),
            kind: ChangeKind::Modified,
        }
    }

    /// A key that was removed.
    pub fn deleted(old_value: Value) -> Self {
        Self {
            old_value: Some(old_value),
            new_value: None,
            kind: ChangeKind::Deleted,
        }
    }

    /// The kind of change.
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Value before the change (`None` for [`ChangeKind::Added`]).
    pub fn old_value(&self) -> Option<&Value> {
        self.old_value.as_ref()
    }

    /// Value after the change (`None` for [`ChangeKind::Deleted`]).
    pub fn new_value(&self) -> Option<&Value> {
        self.new_value.as_ref()
    }

    /// The value most relevant to the change: the new value, or the old one
    /// for deletions.
    pub fn current_value(&self) -> Option<&Value> {
        match self.kind {
            ChangeKind::Added | ChangeKind::Modified => self.new_value.as_ref(),
            ChangeKind::Deleted => self.old_value.as_ref(),
        }
    }
}

/// Per-key diff of one namespace after a sync.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Namespace the changes belong to
    pub namespace: String,
    /// Notification ID observed when the changes were applied
    pub notification_id: i64,
    /// Changed keys
    pub changes: HashMap<String, ConfigChange>,
}

/// Complete key set of a namespace after a sync.
#[derive(Debug, Clone, PartialEq)]
pub struct FullChangeEvent {
    /// Namespace that was refreshed
    pub namespace: String,
    /// Notification ID observed when the snapshot was applied
    pub notification_id: i64,
    /// Every key and value now held for the namespace
    pub configurations: HashMap<String, Value>,
}

/// Observer of namespace updates.
///
/// Registered on a [`ConfigRepository`](crate::store::ConfigRepository); each
/// call runs on its own task, so implementations may block briefly but should
/// not assume any ordering between events.
pub trait ChangeListener: Send + Sync {
    /// Called with the diff when at least one key changed.
    fn on_change(&self, event: Arc<ChangeEvent>);

    /// Called with the complete key set after every applied snapshot.
    fn on_full_refresh(&self, _event: Arc<FullChangeEvent>) {}
}
