//! # Replica Client
//!
//! Client-side mirror of server-authoritative replica trees.
//!
//! This crate provides:
//! - Ordered application of server replication events
//! - Read-only mirror replicas with per-path and whole-replica listeners
//! - Local replay of named mutators (write libs) in place of raw set events
//! - Custom client/server messaging per replica
//!
//! ## Key Invariants
//!
//! - The server is authoritative; clients never mutate replica data
//! - A parent is always created before its children, and destroyed after
//! - An event for an unknown replica terminates the session
//! - Malformed payloads are rejected without ending the session

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod mirror;
mod state;
mod transport;

pub use client::ReplicaClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use mirror::{ChangeEvent, MirrorReplica, ReplicaCreated, SetEvent};
pub use state::{MirrorStats, SessionState};
pub use transport::{ClientTransport, MemoryClientTransport, OutgoingPayload};
