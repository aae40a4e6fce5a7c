//! # Replica Protocol
//!
//! Wire messages for hierarchical state replication.
//!
//! This crate provides:
//! - `ReplicaId` for server-assigned replica identity
//! - `ReplicaMessage`, one variant per replication event
//! - CBOR encoding/decoding through `replica_codec`
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod id;
mod messages;

pub use id::ReplicaId;
pub use messages::{CreateReplica, ReplicaMessage, PROTOCOL_VERSION};

pub use replica_codec::{CodecError, CodecResult, Path, PathKey, Value};
