//! Transport layer abstraction for client-originated messages.

/// Delivery of client payloads to the server.
pub trait ClientTransport {
    /// Sends `payload` to the server.
    fn send(&mut self, payload: &[u8], reliable: bool);
}

/// A payload captured by [`MemoryClientTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingPayload {
    /// Encoded message.
    pub payload: Vec<u8>,
    /// Channel the message was sent on.
    pub reliable: bool,
}

/// An in-memory transport that queues payloads for the server.
#[derive(Debug, Default)]
pub struct MemoryClientTransport {
    outbox: Vec<OutgoingPayload>,
}

impl MemoryClientTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every queued payload.
    pub fn drain(&mut self) -> Vec<OutgoingPayload> {
        std::mem::take(&mut self.outbox)
    }

    /// Number of queued payloads.
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}

impl ClientTransport for MemoryClientTransport {
    fn send(&mut self, payload: &[u8], reliable: bool) {
        self.outbox.push(OutgoingPayload {
            payload: payload.to_vec(),
            reliable,
        });
    }
}
