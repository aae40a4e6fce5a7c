//! Handling of client-originated messages.

use crate::error::{ServerError, ServerResult};
use crate::replica::ClientEvent;
use crate::server::ReplicaServer;
use crate::transport::{ClientId, ServerTransport};
use replica_codec::Value;
use replica_core::ReplicaId;
use replica_protocol::ReplicaMessage;
use tracing::{debug, warn};

impl<T: ServerTransport> ReplicaServer<T> {
    /// Handles a payload received from `client`.
    ///
    /// Clients may only send `RequestData` and `Custom`. Custom messages about
    /// replicas the client does not receive are dropped with a warning.
    pub fn handle_message(
        &mut self,
        client: ClientId,
        payload: &[u8],
        reliable: bool,
    ) -> ServerResult<()> {
        let limit = self.config.max_incoming_message_bytes;
        if payload.len() > limit {
            warn!(client = %client, size = payload.len(), limit, "client message too large");
            return Err(ServerError::MessageTooLarge {
                client,
                size: payload.len(),
                limit,
            });
        }

        let message = ReplicaMessage::decode(payload)?;
        match message {
            ReplicaMessage::RequestData { protocol_version } => {
                self.handle_request_data(client, protocol_version)
            }
            ReplicaMessage::Custom { id, args } => {
                self.handle_client_event(client, id, args, reliable)
            }
            other => Err(ServerError::UnexpectedMessage {
                client,
                reason: format!("{} messages are server-only", other.kind()),
            }),
        }
    }

    fn handle_request_data(&mut self, client: ClientId, protocol_version: u16) -> ServerResult<()> {
        let expected = self.config.protocol_version;
        if protocol_version != expected {
            warn!(client = %client, expected, got = protocol_version, "protocol version mismatch");
            return Err(ServerError::ProtocolMismatch {
                server: expected,
                client: protocol_version,
            });
        }
        self.client_ready(client)
    }

    fn handle_client_event(
        &mut self,
        client: ClientId,
        id: ReplicaId,
        args: Vec<Value>,
        reliable: bool,
    ) -> ServerResult<()> {
        if !reliable && !self.config.accept_unreliable_client_events {
            debug!(client = %client, replica = %id, "unreliable client event dropped");
            return Ok(());
        }
        if args.len() > self.config.max_custom_args {
            return Err(ServerError::UnexpectedMessage {
                client,
                reason: format!(
                    "{} arguments exceed limit of {}",
                    args.len(),
                    self.config.max_custom_args
                ),
            });
        }

        let Some(node) = self.replicas.get(&id) else {
            warn!(client = %client, replica = %id, "client event for inactive replica dropped");
            return Ok(());
        };
        if !node.receivers.contains(&client) {
            warn!(client = %client, replica = %id, "client event for unreceived replica dropped");
            return Ok(());
        }
        let signal = node.server_events.clone();
        signal.fire(&ClientEvent { client, args });
        Ok(())
    }
}
