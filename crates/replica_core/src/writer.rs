//! The mutation seam shared by server replicas and client mirrors.

use crate::document::Document;
use crate::error::ReplicaResult;
use replica_codec::{Path, PathKey, Value};
use replica_protocol::ReplicaId;

/// Mutation access to a replica, as seen by mutator functions.
///
/// The server implements this over its authoritative document; clients
/// implement it over their mirror so that replaying a `Write` runs the very
/// same function body.
pub trait ReplicaWriter {
    /// Replica identifier.
    fn id(&self) -> ReplicaId;

    /// Current document root.
    fn data(&self) -> &Value;

    /// Creation tags.
    fn tags(&self) -> &Value;

    /// Replaces the value at `path`.
    fn set(&mut self, path: &Path, value: Value) -> ReplicaResult<()>;

    /// Sets several keys below `path`.
    fn set_values(&mut self, path: &Path, values: &[(PathKey, Value)]) -> ReplicaResult<()>;

    /// Inserts into the sequence at `path`, returning the resulting index.
    fn table_insert(
        &mut self,
        path: &Path,
        value: Value,
        index: Option<usize>,
    ) -> ReplicaResult<usize>;

    /// Removes from the sequence at `path`, returning the removed element.
    fn table_remove(&mut self, path: &Path, index: usize) -> ReplicaResult<Value>;

    /// Reads the value at `path`.
    fn get(&self, path: &Path) -> Option<&Value> {
        let mut current = self.data();
        for key in path.keys() {
            current = match current {
                Value::Array(items) => items.get(key.as_index()?)?,
                other => other.get_key(&key.to_value())?,
            };
        }
        Some(current)
    }
}

/// A writer that applies mutations straight to a document.
pub struct DocumentWriter<'a> {
    id: ReplicaId,
    tags: &'a Value,
    document: &'a mut Document,
}

impl<'a> DocumentWriter<'a> {
    /// Creates a writer over `document`.
    pub fn new(id: ReplicaId, tags: &'a Value, document: &'a mut Document) -> Self {
        Self { id, tags, document }
    }
}

impl ReplicaWriter for DocumentWriter<'_> {
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
        self.document.set(path, value).map(drop)
    }

    fn set_values(&mut self, path: &Path, values: &[(PathKey, Value)]) -> ReplicaResult<()> {
        self.document.set_values(path, values).map(drop)
    }

    fn table_insert(
        &mut self,
        path: &Path,
        value: Value,
        index: Option<usize>,
    ) -> ReplicaResult<usize> {
        self.document.table_insert(path, value, index)
    }

    fn table_remove(&mut self, path: &Path, index: usize) -> ReplicaResult<Value> {
        self.document.table_remove(path, index)
    }
}
