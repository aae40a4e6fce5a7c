//! # Replica Core
//!
//! Building blocks shared by the replication server and its clients.
//!
//! This crate provides:
//! - `Document` and the mutation primitives (`set`, `set_values`,
//!   `table_insert`, `table_remove`)
//! - `ReplicaWriter`, the mutation seam mutator functions are written against
//! - `WriteLib` mutator registries with deterministic wire indices
//! - `ReplicaToken` interned class tokens
//! - `Signal`/`Connection` local events
//! - `Maid` resource registries
//!
//! Nothing in this crate performs I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod maid;
mod signal;
mod token;
mod write_lib;
mod writer;

pub use document::Document;
pub use error::{ReplicaError, ReplicaResult};
pub use maid::{Maid, MaidKey, MaidToken, Resource};
pub use signal::{Connection, Signal};
pub use token::ReplicaToken;
pub use write_lib::{Mutator, MutatorFn, WriteLib, WriteLibBuilder};
pub use writer::{DocumentWriter, ReplicaWriter};

pub use replica_codec::{Path, PathKey, Value};
pub use replica_protocol::ReplicaId;

/// Debug description of a replica: id, class and tags, never data.
pub fn identify(id: ReplicaId, token: &ReplicaToken, tags: &Value) -> String {
    let tags = match tags.as_map() {
        Some(pairs) if !pairs.is_empty() => pairs
            .iter()
            .map(|(k, v)| format!("{}={}", describe(k), describe(v)))
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::from("-"),
    };
    format!("[Id:{id}; Token:{token}; Tags:{{{tags}}}]")
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Text(t) => t.clone(),
        Value::Bytes(b) => format!("<{} bytes>", b.len()),
        Value::Array(items) => format!("<array of {}>", items.len()),
        Value::Map(pairs) => format!("<map of {}>", pairs.len()),
    }
}
