//! Outgoing message delivery.
//!
//! The server never talks to the network directly. It hands encoded
//! payloads to a [`ServerTransport`], which owns framing, retries and the
//! reliable/unreliable channel split.

use replica_codec::CodecResult;
use replica_protocol::ReplicaMessage;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Transport-level identifier of a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery of server payloads to clients.
pub trait ServerTransport {
    /// Sends `payload` to one client.
    ///
    /// Reliable sends arrive in order; unreliable sends may be dropped or
    /// reordered relative to everything else.
    fn send(&mut self, client: ClientId, payload: &[u8], reliable: bool);

    /// Sends `payload` to every client in `clients`.
    fn broadcast(&mut self, clients: &BTreeSet<ClientId>, payload: &[u8], reliable: bool) {
        for client in clients {
            self.send(*client, payload, reliable);
        }
    }
}

/// A payload captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Encoded message.
    pub payload: Vec<u8>,
    /// Channel the message was sent on.
    pub reliable: bool,
}

impl Envelope {
    /// Decodes the payload.
    pub fn message(&self) -> CodecResult<ReplicaMessage> {
        ReplicaMessage::decode(&self.payload)
    }
}

/// In-memory transport that queues payloads per client.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    outbox: BTreeMap<ClientId, Vec<Envelope>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything queued for `client`.
    pub fn drain(&mut self, client: ClientId) -> Vec<Envelope> {
        self.outbox.remove(&client).unwrap_or_default()
    }

    /// Number of payloads queued for `client`.
    pub fn pending(&self, client: ClientId) -> usize {
        self.outbox.get(&client).map_or(0, Vec::len)
    }

    /// Decodes everything queued for `client`, draining the queue.
    pub fn drain_messages(&mut self, client: ClientId) -> CodecResult<Vec<ReplicaMessage>> {
        self.drain(client).iter().map(Envelope::message).collect()
    }
}

impl ServerTransport for MemoryTransport {
    fn send(&mut self, client: ClientId, payload: &[u8], reliable: bool) {
        self.outbox.entry(client).or_default().push(Envelope {
            payload: payload.to_vec(),
            reliable,
        });
    }
}
