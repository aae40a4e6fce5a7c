//! Mutator registries.
//!
//! A [`WriteLib`] is a named table of mutator functions bound to a replica
//! class. Each mutator gets a numeric index so that a `Write` travels on the
//! wire as `(replica, index, args)`. Indices follow the sorted order of the
//! mutator names, so every process that builds the same registry agrees on
//! them regardless of registration order.

use crate::error::{ReplicaError, ReplicaResult};
use crate::writer::ReplicaWriter;
use replica_codec::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A mutator body.
///
/// Mutators must be deterministic: the server and every client run the same
/// body against their own copy of the document.
pub type MutatorFn =
    Arc<dyn Fn(&mut dyn ReplicaWriter, &[Value]) -> ReplicaResult<Value> + Send + Sync>;

/// A registered mutator.
#[derive(Clone)]
pub struct Mutator {
    name: String,
    index: u16,
    func: MutatorFn,
}

impl Mutator {
    /// Mutator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire index.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Runs the mutator against `writer`.
    pub fn invoke(&self, writer: &mut dyn ReplicaWriter, args: &[Value]) -> ReplicaResult<Value> {
        (self.func)(writer, args)
    }
}

impl fmt::Debug for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("name", &self.name)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// A named, indexed set of mutators.
#[derive(Debug, Clone)]
pub struct WriteLib {
    name: String,
    mutators: Vec<Mutator>,
}

impl WriteLib {
    /// Starts building a registry called `name`.
    pub fn builder(name: impl Into<String>) -> WriteLibBuilder {
        WriteLibBuilder {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of mutators.
    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    /// Returns true if no mutators are registered.
    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }

    /// Looks up a mutator by name.
    pub fn by_name(&self, name: &str) -> ReplicaResult<&Mutator> {
        self.mutators
            .binary_search_by(|m| m.name.as_str().cmp(name))
            .map(|pos| &self.mutators[pos])
            .map_err(|_| ReplicaError::UnknownMutator {
                name: name.to_string(),
            })
    }

    /// Looks up a mutator by wire index.
    pub fn by_index(&self, index: u16) -> ReplicaResult<&Mutator> {
        self.mutators
            .get(usize::from(index))
            .ok_or_else(|| ReplicaError::UnknownMutatorIndex {
                lib: self.name.clone(),
                index,
            })
    }

    /// Wire index of `name`, if registered.
    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.by_name(name).ok().map(Mutator::index)
    }

    /// Mutator names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mutators.iter().map(|m| m.name.as_str())
    }
}

/// Builder for [`WriteLib`].
pub struct WriteLibBuilder {
    name: String,
    entries: Vec<(String, MutatorFn)>,
}

impl WriteLibBuilder {
    /// Registers a mutator.
    pub fn mutator<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut dyn ReplicaWriter, &[Value]) -> ReplicaResult<Value> + Send + Sync + 'static,
    {
        self.entries.push((name.into(), Arc::new(func)));
        self
    }

    /// Finalizes the registry, assigning indices.
    pub fn build(self) -> ReplicaResult<WriteLib> {
        let count = self.entries.len();
        if count > usize::from(u16::MAX) {
            return Err(ReplicaError::TooManyMutators {
                lib: self.name,
                count,
            });
        }

        let mut sorted = BTreeMap::new();
        for (name, func) in self.entries {
            if sorted.contains_key(&name) {
                return Err(ReplicaError::DuplicateMutator {
                    lib: self.name,
                    name,
                });
            }
            sorted.insert(name, func);
        }

        let mutators = sorted
            .into_iter()
            .zip(0u16..)
            .map(|((name, func), index)| Mutator { name, index, func })
            .collect();

        Ok(WriteLib {
            name: self.name,
            mutators,
        })
    }
}
