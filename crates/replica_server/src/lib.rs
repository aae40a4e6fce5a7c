//! # Replica Server
//!
//! Server-authoritative replication of hierarchical state.
//!
//! This crate provides:
//! - `ReplicaServer`, owner of the replica tree and its event ordering
//! - Broadcast and selective subscription modes over a ready-client set
//! - Mutations (`set`, `set_values`, `table_insert`, `table_remove`,
//!   `write`) applied locally and then sent to receiving clients
//! - Handling of client `RequestData` handshakes and custom messages
//! - The `ServerTransport` seam and an in-memory transport
//!
//! # Ordering
//!
//! For every client, a replica's creation is sent before any other message
//! about it and before its children's creations. Destroys are sent
//! descendants first. Messages about one replica subtree arrive in the order
//! the server produced them.
//!
//! # Usage warnings
//!
//! Subscribing a client that is not ready is logged with `tracing::warn!`
//! and ignored rather than reported as an error.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod replica;
mod server;
mod subscription;
mod transport;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use replica::{ClientEvent, ObjectId, ReplicaParams, ServerReplica};
pub use server::ReplicaServer;
pub use subscription::ReplicationMode;
pub use transport::{ClientId, Envelope, MemoryTransport, ServerTransport};
