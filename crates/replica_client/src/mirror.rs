//! Client-side mirrors of server replicas.

use replica_codec::{Path, PathKey, Value};
use replica_core::{
    Document, Maid, MaidKey, ReplicaId, ReplicaResult, ReplicaToken, ReplicaWriter, Signal, WriteLib,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Old and new value of a `set` at a listened path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEvent {
    /// Value after the change.
    pub new: Value,
    /// Value before the change (null if absent).
    pub old: Value,
}

/// Structured description of a mirrored mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A single value was replaced.
    Set {
        /// Changed path.
        path: Path,
        /// New value.
        new: Value,
        /// Previous value.
        old: Value,
    },
    /// Several keys below one path were set.
    SetValues {
        /// Container path.
        path: Path,
        /// Keys and new values.
        ///
        /// Keys arrive in canonical order with duplicates collapsed, which
        /// may differ from the order the server passed them in.
        values: Vec<(PathKey, Value)>,
    },
    /// A sequence element was inserted.
    TableInsert {
        /// Sequence path.
        path: Path,
        /// Inserted value.
        value: Value,
        /// Insertion index.
        index: usize,
    },
    /// A sequence element was removed.
    TableRemove {
        /// Sequence path.
        path: Path,
        /// Removed index.
        index: usize,
        /// Removed value.
        removed: Value,
    },
}

/// Snapshot handed to class-level creation listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaCreated {
    /// New replica.
    pub id: ReplicaId,
    /// Parent replica.
    pub parent: Option<ReplicaId>,
    /// Creation tags.
    pub tags: Value,
    /// Initial data.
    pub data: Value,
}

/// Listener lists owned by one mirror.
#[derive(Default)]
pub(crate) struct MirrorListeners {
    pub set: BTreeMap<Path, Signal<SetEvent>>,
    pub change: Signal<ChangeEvent>,
    pub write: HashMap<String, Signal<Vec<Value>>>,
    pub client_events: Signal<Vec<Value>>,
}

impl MirrorListeners {
    fn fire_set(&self, path: &Path, new: &Value, old: &Value) {
        if let Some(signal) = self.set.get(path) {
            signal.fire(&SetEvent {
                new: new.clone(),
                old: old.clone(),
            });
        }
    }

    fn fire_change(&self, event: impl FnOnce() -> ChangeEvent) {
        if self.change.listener_count() > 0 {
            self.change.fire(&event());
        }
    }

    pub(crate) fn clear(&self) {
        for signal in self.set.values() {
            signal.clear();
        }
        self.change.clear();
        for signal in self.write.values() {
            signal.clear();
        }
        self.client_events.clear();
    }
}

/// A read-only mirror of a server replica.
pub struct MirrorReplica {
    pub(crate) id: ReplicaId,
    pub(crate) token: ReplicaToken,
    pub(crate) tags: Value,
    pub(crate) document: Document,
    pub(crate) parent: Option<ReplicaId>,
    pub(crate) children: BTreeSet<ReplicaId>,
    pub(crate) write_lib: Option<Arc<WriteLib>>,
    pub(crate) listeners: MirrorListeners,
    pub(crate) maid: Maid,
    pub(crate) maid_key: MaidKey,
}

impl MirrorReplica {
    /// Replica ID.
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    /// Class token.
    pub fn token(&self) -> &ReplicaToken {
        &self.token
    }

    /// Creation tags.
    pub fn tags(&self) -> &Value {
        &self.tags
    }

    /// Mirrored data.
    pub fn data(&self) -> &Value {
        self.document.root()
    }

    /// Reads the value at `path`.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.document.get(path)
    }

    /// Parent replica.
    pub fn parent(&self) -> Option<ReplicaId> {
        self.parent
    }

    /// Child replicas.
    pub fn children(&self) -> &BTreeSet<ReplicaId> {
        &self.children
    }

    /// Mutator registry.
    pub fn write_lib(&self) -> Option<&Arc<WriteLib>> {
        self.write_lib.as_ref()
    }

    /// Resource registry, released when the mirror is destroyed.
    pub fn maid(&self) -> &Maid {
        &self.maid
    }

    /// Debug description without data.
    pub fn identify(&self) -> String {
        replica_core::identify(self.id, &self.token, &self.tags)
    }

    pub(crate) fn writer(&mut self) -> MirrorWriter<'_> {
        MirrorWriter {
            id: self.id,
            tags: &self.tags,
            document: &mut self.document,
            listeners: &self.listeners,
        }
    }
}

/// Applies mutations to a mirror and notifies its listeners.
pub(crate) struct MirrorWriter<'a> {
    id: ReplicaId,
    tags: &'a Value,
    document: &'a mut Document,
    listeners: &'a MirrorListeners,
}

impl ReplicaWriter for MirrorWriter<'_> {
    fn id(&self) -> ReplicaId {
        self.id
    }

    fn data(&self) -> &Value {
        self.document.root()
    }

    fn tags(&self) -> &Value {
        self.tags
    }

    fn set(&mut self, path: &Path, value: Value) -> ReplicaResult<()> {
        let old = self.document.set(path, value.clone())?;
        self.listeners.fire_set(path, &value, &old);
        self.listeners.fire_change(|| ChangeEvent::Set {
            path: path.clone(),
            new: value,
            old,
        });
        Ok(())
    }

    fn set_values(&mut self, path: &Path, values: &[(PathKey, Value)]) -> ReplicaResult<()> {
        let old = self.document.set_values(path, values)?;
        for ((key, new), old) in values.iter().zip(&old) {
            self.listeners.fire_set(&path.child(key.clone()), new, old);
        }
        self.listeners.fire_change(|| ChangeEvent::SetValues {
            path: path.clone(),
            values: values.to_vec(),
        });
        Ok(())
    }

    fn table_insert(
        &mut self,
        path: &Path,
        value: Value,
        index: Option<usize>,
    ) -> ReplicaResult<usize> {
        let index = self.document.table_insert(path, value.clone(), index)?;
        self.listeners.fire_change(|| ChangeEvent::TableInsert {
            path: path.clone(),
            value,
            index,
        });
        Ok(index)
    }

    fn table_remove(&mut self, path: &Path, index: usize) -> ReplicaResult<Value> {
        let removed = self.document.table_remove(path, index)?;
        self.listeners.fire_change(|| ChangeEvent::TableRemove {
            path: path.clone(),
            index,
            removed: removed.clone(),
        });
        Ok(removed)
    }
}
