//! Property-based test generators using proptest.
//!
//! Provides strategies for documents, paths and mutation sequences. Paths
//! are drawn from a small vocabulary so that a useful share of generated
//! mutations hit existing containers.

use proptest::prelude::*;
use replica_codec::{Path, PathKey, Value};
use replica_core::{Document, ReplicaId, ReplicaResult};
use replica_server::{ReplicaServer, ServerResult, ServerTransport};

/// Map keys used by generated documents and paths.
pub const KEYS: [&str; 4] = ["a", "b", "list", "n"];

/// Strategy for generating map keys from [`KEYS`].
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(KEYS.to_vec()).prop_map(str::to_string)
}

/// Strategy for generating non-null scalar values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-z]{0,8}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
    ]
}

/// Strategy for generating nested values up to three levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((key_strategy(), inner), 0..4).prop_map(|pairs| {
                Value::map(
                    pairs
                        .into_iter()
                        .map(|(k, v)| (Value::Text(k), v))
                        .collect(),
                )
            }),
        ]
    })
}

/// Strategy for generating replica documents (always maps).
pub fn document_strategy() -> impl Strategy<Value = Value> {
    (
        prop::collection::vec((key_strategy(), value_strategy()), 0..4),
        prop::collection::vec(value_strategy(), 0..4),
    )
        .prop_map(|(pairs, list)| {
            let mut pairs: Vec<(Value, Value)> = pairs
                .into_iter()
                .map(|(k, v)| (Value::Text(k), v))
                .collect();
            pairs.push((Value::from("list"), Value::Array(list)));
            Value::map(pairs)
        })
}

/// Strategy for generating a single path key.
pub fn path_key_strategy() -> impl Strategy<Value = PathKey> {
    prop_oneof![
        3 => key_strategy().prop_map(PathKey::Key),
        1 => (0i64..4).prop_map(PathKey::Index),
    ]
}

/// Strategy for generating paths of one to three keys.
pub fn path_strategy() -> impl Strategy<Value = Path> {
    prop::collection::vec(path_key_strategy(), 1..4).prop_map(Path::new)
}

/// Strategy for generating a sequence plus an insertion point within it.
pub fn table_strategy() -> impl Strategy<Value = (Vec<Value>, usize, Value)> {
    prop::collection::vec(value_strategy(), 0..8).prop_flat_map(|items| {
        let len = items.len();
        (Just(items), 0..=len, value_strategy())
    })
}

/// A single document mutation.
#[derive(Debug, Clone)]
pub enum MutationOp {
    /// Replace a value (null removes a map key).
    Set {
        /// Target path.
        path: Path,
        /// New value.
        value: Value,
    },
    /// Set several keys below a container.
    SetValues {
        /// Container path.
        path: Path,
        /// Keys and values.
        values: Vec<(PathKey, Value)>,
    },
    /// Insert into a sequence.
    TableInsert {
        /// Sequence path.
        path: Path,
        /// Inserted value.
        value: Value,
        /// Insertion index; `None` appends.
        index: Option<usize>,
    },
    /// Remove from a sequence.
    TableRemove {
        /// Sequence path.
        path: Path,
        /// Removed index.
        index: usize,
    },
}

impl MutationOp {
    /// Applies the mutation to a local document.
    pub fn apply_to_document(&self, document: &mut Document) -> ReplicaResult<()> {
        match self {
            MutationOp::Set { path, value } => document.set(path, value.clone()).map(drop),
            MutationOp::SetValues { path, values } => {
                document.set_values(path, values).map(drop)
            }
            MutationOp::TableInsert { path, value, index } => document
                .table_insert(path, value.clone(), *index)
                .map(drop),
            MutationOp::TableRemove { path, index } => {
                document.table_remove(path, *index).map(drop)
            }
        }
    }

    /// Applies the mutation to a server replica, emitting its event.
    pub fn apply_to_server<T: ServerTransport>(
        &self,
        server: &mut ReplicaServer<T>,
        id: ReplicaId,
    ) -> ServerResult<()> {
        match self {
            MutationOp::Set { path, value } => server.set(id, path.clone(), value.clone()),
            MutationOp::SetValues { path, values } => {
                server.set_values(id, path.clone(), values.clone())
            }
            MutationOp::TableInsert { path, value, index } => server
                .table_insert(id, path.clone(), value.clone(), *index)
                .map(drop),
            MutationOp::TableRemove { path, index } => {
                server.table_remove(id, path.clone(), *index).map(drop)
            }
        }
    }
}

/// Strategy for generating one mutation.
pub fn mutation_strategy() -> impl Strategy<Value = MutationOp> {
    let maybe_null = prop_oneof![
        5 => value_strategy(),
        1 => Just(Value::Null),
    ];
    prop_oneof![
        4 => (path_strategy(), maybe_null)
            .prop_map(|(path, value)| MutationOp::Set { path, value }),
        1 => (
            prop::collection::vec(path_key_strategy(), 0..2).prop_map(Path::new),
            prop::collection::vec((path_key_strategy(), value_strategy()), 1..3),
        )
            .prop_map(|(path, values)| MutationOp::SetValues { path, values }),
        3 => (path_strategy(), value_strategy(), prop::option::of(0usize..5))
            .prop_map(|(path, value, index)| MutationOp::TableInsert { path, value, index }),
        2 => (path_strategy(), 0usize..5)
            .prop_map(|(path, index)| MutationOp::TableRemove { path, index }),
    ]
}

/// Strategy for generating a sequence of mutations.
pub fn mutation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<MutationOp>> {
    prop::collection::vec(mutation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn documents_are_maps_with_a_list(doc in document_strategy()) {
            prop_assert!(doc.as_map().is_some());
            prop_assert!(doc.get("list").and_then(Value::as_array).is_some());
        }

        #[test]
        fn table_index_is_in_bounds((items, index, _value) in table_strategy()) {
            prop_assert!(index <= items.len());
        }

        #[test]
        fn failed_mutations_leave_documents_untouched(
            doc in document_strategy(),
            op in mutation_strategy(),
        ) {
            let mut document = Document::new(doc.clone());
            if op.apply_to_document(&mut document).is_err() {
                prop_assert_eq!(document.root(), &doc);
            }
        }
    }
}
