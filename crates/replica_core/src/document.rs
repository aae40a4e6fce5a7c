//! Replica documents and the mutation primitives.
//!
//! A [`Document`] is the data tree owned by a replica. It can only be changed
//! through [`Document::set`], [`Document::set_values`],
//! [`Document::table_insert`] and [`Document::table_remove`]. Each primitive
//! validates its target before touching anything, so a failed call leaves the
//! document unchanged.
//!
//! Sequence indices are 0-based.

use crate::error::{ReplicaError, ReplicaResult};
use replica_codec::{Path, PathKey, Value};

/// Structured data owned by a replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Value,
}

impl Document {
    /// Wraps a value as a document. A null root becomes an empty map.
    pub fn new(root: Value) -> Self {
        let root = if root.is_null() {
            Value::empty_map()
        } else {
            root
        };
        Self { root }
    }

    /// The document root.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Consumes the document, returning its root.
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Reads the value at `path`.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        let mut current = &self.root;
        for key in path.keys() {
            current = child(current, key)?;
        }
        Some(current)
    }

    /// Replaces the value at `path`, returning the previous value.
    ///
    /// Setting `Null` on a map key removes the key. On a sequence the index
    /// must address an existing element or the slot just past the end.
    /// Setting the root path replaces the whole document, which must stay a
    /// container.
    pub fn set(&mut self, path: &Path, value: Value) -> ReplicaResult<Value> {
        let Some((last, parent)) = path.split_last() else {
            if !value.is_container() {
                return Err(ReplicaError::invalid_path(
                    path,
                    format!("document root cannot be {}", value.kind()),
                ));
            }
            return Ok(std::mem::replace(&mut self.root, value));
        };
        let container = navigate_mut(&mut self.root, parent, path)?;
        check_slot(container, last, 0, path)?;
        Ok(write_slot(container, last, value))
    }

    /// Sets several keys inside the container at `path`.
    ///
    /// Every key is validated before any is written; the previous values are
    /// returned in the same order as `values`.
    pub fn set_values(
        &mut self,
        path: &Path,
        values: &[(PathKey, Value)],
    ) -> ReplicaResult<Vec<Value>> {
        let container = navigate_mut(&mut self.root, path.keys(), path)?;
        if !container.is_container() {
            return Err(ReplicaError::invalid_path(
                path,
                format!("expected map or sequence, found {}", container.kind()),
            ));
        }

        let mut appended = 0;
        for (key, _) in values {
            if check_slot(container, key, appended, path)? {
                appended += 1;
            }
        }

        Ok(values
            .iter()
            .map(|(key, value)| write_slot(container, key, value.clone()))
            .collect())
    }

    /// Inserts `value` into the sequence at `path`, returning its index.
    ///
    /// `None` appends.
    pub fn table_insert(
        &mut self,
        path: &Path,
        value: Value,
        index: Option<usize>,
    ) -> ReplicaResult<usize> {
        let sequence = sequence_mut(&mut self.root, path)?;
        let len = sequence.len();
        let index = index.unwrap_or(len);
        if index > len {
            return Err(ReplicaError::IndexOutOfRange {
                path: path.to_string(),
                index,
                len,
            });
        }
        sequence.insert(index, value);
        Ok(index)
    }

    /// Removes and returns the element at `index` of the sequence at `path`.
    pub fn table_remove(&mut self, path: &Path, index: usize) -> ReplicaResult<Value> {
        let sequence = sequence_mut(&mut self.root, path)?;
        let len = sequence.len();
        if index >= len {
            return Err(ReplicaError::IndexOutOfRange {
                path: path.to_string(),
                index,
                len,
            });
        }
        Ok(sequence.remove(index))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Value::empty_map())
    }
}

impl From<Value> for Document {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

fn child<'a>(container: &'a Value, key: &PathKey) -> Option<&'a Value> {
    match container {
        Value::Map(_) => container.get_key(&key.to_value()),
        Value::Array(items) => key.as_index().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(container: &'a mut Value, key: &PathKey) -> Option<&'a mut Value> {
    match container {
        Value::Array(items) => key.as_index().and_then(move |i| items.get_mut(i)),
        other => other.get_key_mut(&key.to_value()),
    }
}

fn navigate_mut<'a>(
    root: &'a mut Value,
    keys: &[PathKey],
    full: &Path,
) -> ReplicaResult<&'a mut Value> {
    let mut current = root;
    for (depth, key) in keys.iter().enumerate() {
        if !current.is_container() {
            return Err(ReplicaError::invalid_path(
                full,
                format!(
                    "segment {depth} traverses a {} value, not a container",
                    current.kind()
                ),
            ));
        }
        current = child_mut(current, key).ok_or_else(|| {
            ReplicaError::invalid_path(full, format!("segment {depth} ({key}) does not exist"))
        })?;
    }
    Ok(current)
}

fn sequence_mut<'a>(root: &'a mut Value, path: &Path) -> ReplicaResult<&'a mut Vec<Value>> {
    let target = navigate_mut(root, path.keys(), path)?;
    let kind = target.kind();
    target
        .as_array_mut()
        .ok_or_else(|| ReplicaError::invalid_path(path, format!("expected sequence, found {kind}")))
}

/// Validates that `key` can be written in `container`.
///
/// `pending_appends` accounts for earlier keys of the same batch that extend
/// a sequence. Returns true when the write appends.
fn check_slot(
    container: &Value,
    key: &PathKey,
    pending_appends: usize,
    path: &Path,
) -> ReplicaResult<bool> {
    match container {
        Value::Map(_) => Ok(false),
        Value::Array(items) => {
            let len = items.len() + pending_appends;
            let index = key.as_index().ok_or_else(|| {
                ReplicaError::invalid_path(path, format!("key {key} cannot index a sequence"))
            })?;
            if index > len {
                return Err(ReplicaError::IndexOutOfRange {
                    path: path.to_string(),
                    index,
                    len,
                });
            }
            Ok(index == len)
        }
        other => Err(ReplicaError::invalid_path(
            path,
            format!("cannot set a key inside a {} value", other.kind()),
        )),
    }
}

/// Writes a validated slot, returning the previous value (null if none).
fn write_slot(container: &mut Value, key: &PathKey, value: Value) -> Value {
    match container {
        Value::Array(items) => match key.as_index() {
            Some(i) if i < items.len() => std::mem::replace(&mut items[i], value),
            _ => {
                items.push(value);
                Value::Null
            }
        },
        _ => {
            let key = key.to_value();
            let previous = if value.is_null() {
                container.map_remove(&key)
            } else {
                container.map_insert(key, value)
            };
            previous.unwrap_or(Value::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Document {
        Document::new(Value::map(vec![
            (Value::from("hp"), Value::Integer(100)),
            (
                Value::from("inventory"),
                Value::Array(vec![Value::from("sword"), Value::from("shield")]),
            ),
            (
                Value::from("stats"),
                Value::map(vec![(Value::from("level"), Value::Integer(3))]),
            ),
        ]))
    }

    #[test]
    fn set_replaces_and_returns_previous() {
        let mut doc = player();
        let old = doc.set(&Path::from(["hp"]), Value::Integer(50)).unwrap();
        assert_eq!(old, Value::Integer(100));
        assert_eq!(doc.get(&Path::from(["hp"])), Some(&Value::Integer(50)));
    }

    #[test]
    fn set_null_removes_key() {
        let mut doc = player();
        doc.set(&Path::from(["stats", "level"]), Value::Null).unwrap();
        assert_eq!(doc.get(&Path::from(["stats"])), Some(&Value::empty_map()));
        assert!(doc.get(&Path::from(["stats", "level"])).is_none());
    }

    #[test]
    fn set_creates_new_key() {
        let mut doc = player();
        let old = doc.set(&Path::from(["coins"]), Value::Integer(7)).unwrap();
        assert!(old.is_null());
        assert_eq!(doc.get(&Path::from(["coins"])), Some(&Value::Integer(7)));
    }

    #[test]
    fn set_through_missing_segment_fails() {
        let mut doc = player();
        let before = doc.clone();
        let err = doc
            .set(&Path::from(["missing", "x"]), Value::Integer(1))
            .unwrap_err();
        assert!(matches!(err, ReplicaError::InvalidPath { .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut doc = player();
        let err = doc
            .set(&Path::from(["hp", "x"]), Value::Integer(1))
            .unwrap_err();
        assert!(matches!(err, ReplicaError::InvalidPath { .. }));
    }

    #[test]
    fn set_on_sequence_replaces_or_appends() {
        let mut doc = player();
        let inv = Path::from(["inventory"]);
        doc.set(&inv.child(0usize), Value::from("axe")).unwrap();
        doc.set(&inv.child(2usize), Value::from("bow")).unwrap();
        assert_eq!(
            doc.get(&inv),
            Some(&Value::Array(vec![
                Value::from("axe"),
                Value::from("shield"),
                Value::from("bow"),
            ]))
        );
        let err = doc.set(&inv.child(9usize), Value::Null).unwrap_err();
        assert!(matches!(err, ReplicaError::IndexOutOfRange { index: 9, .. }));
    }

    #[test]
    fn set_root_requires_container() {
        let mut doc = player();
        assert!(doc.set(&Path::root(), Value::Integer(1)).is_err());
        doc.set(&Path::root(), Value::empty_map()).unwrap();
        assert_eq!(doc.root(), &Value::empty_map());
    }

    #[test]
    fn set_values_is_all_or_nothing() {
        let mut doc = player();
        let before = doc.clone();
        let err = doc
            .set_values(
                &Path::from(["inventory"]),
                &[
                    (PathKey::Index(0), Value::from("axe")),
                    (PathKey::Key("oops".into()), Value::Integer(1)),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, ReplicaError::InvalidPath { .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn set_values_on_map() {
        let mut doc = player();
        let old = doc
            .set_values(
                &Path::root(),
                &[
                    (PathKey::Key("hp".into()), Value::Integer(1)),
                    (PathKey::Key("mana".into()), Value::Integer(9)),
                ],
            )
            .unwrap();
        assert_eq!(old, vec![Value::Integer(100), Value::Null]);
        assert_eq!(doc.get(&Path::from(["mana"])), Some(&Value::Integer(9)));
    }

    #[test]
    fn set_values_appends_in_order() {
        let mut doc = player();
        doc.set_values(
            &Path::from(["inventory"]),
            &[
                (PathKey::Index(2), Value::from("bow")),
                (PathKey::Index(3), Value::from("arrow")),
            ],
        )
        .unwrap();
        assert_eq!(
            doc.get(&Path::from(["inventory"])).and_then(Value::len),
            Some(4)
        );
    }

    #[test]
    fn table_insert_defaults_to_append() {
        let mut doc = player();
        let inv = Path::from(["inventory"]);
        assert_eq!(doc.table_insert(&inv, Value::from("bow"), None).unwrap(), 2);
        assert_eq!(
            doc.table_insert(&inv, Value::from("helm"), Some(0)).unwrap(),
            0
        );
        assert_eq!(
            doc.get(&inv.child(0usize)),
            Some(&Value::from("helm"))
        );
    }

    #[test]
    fn table_insert_rejects_non_sequence() {
        let mut doc = player();
        let err = doc
            .table_insert(&Path::from(["stats"]), Value::Integer(1), None)
            .unwrap_err();
        assert!(matches!(err, ReplicaError::InvalidPath { .. }));
        let err = doc
            .table_insert(&Path::from(["inventory"]), Value::Integer(1), Some(3))
            .unwrap_err();
        assert!(matches!(err, ReplicaError::IndexOutOfRange { len: 2, .. }));
    }

    #[test]
    fn table_remove_returns_element() {
        let mut doc = player();
        let inv = Path::from(["inventory"]);
        assert_eq!(doc.table_remove(&inv, 0).unwrap(), Value::from("sword"));
        let err = doc.table_remove(&inv, 1).unwrap_err();
        assert!(matches!(
            err,
            ReplicaError::IndexOutOfRange {
                index: 1,
                len: 1,
                ..
            }
        ));
    }

    #[test]
    fn insert_then_remove_is_identity() {
        let mut doc = player();
        let before = doc.clone();
        let inv = Path::from(["inventory"]);
        let index = doc.table_insert(&inv, Value::Integer(5), Some(1)).unwrap();
        doc.table_remove(&inv, index).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn null_root_becomes_empty_map() {
        assert_eq!(Document::new(Value::Null).root(), &Value::empty_map());
        assert_eq!(Document::default().root(), &Value::empty_map());
    }
}
