//! Error types for the replication server.

use crate::transport::ClientId;
use replica_codec::CodecError;
use replica_core::ReplicaError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the replication server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Replica operation failed.
    #[error(transparent)]
    Replica(#[from] ReplicaError),

    /// Payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Replica creation parameters are inconsistent.
    #[error("invalid replica parameters: {0}")]
    InvalidParams(String),

    /// Incoming payload exceeds the configured limit.
    #[error("message of {size} bytes from client {client} exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Sending client.
        client: ClientId,
        /// Payload size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Client sent a message only the server may send, or a malformed one.
    #[error("unexpected message from client {client}: {reason}")]
    UnexpectedMessage {
        /// Sending client.
        client: ClientId,
        /// What was wrong with it.
        reason: String,
    },

    /// Client speaks a different protocol version.
    #[error("protocol version mismatch: server {server}, client {client}")]
    ProtocolMismatch {
        /// Server version.
        server: u16,
        /// Client version.
        client: u16,
    },
}

impl ServerError {
    /// Returns true if the error was caused by a misbehaving client.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::MessageTooLarge { .. }
                | ServerError::UnexpectedMessage { .. }
                | ServerError::ProtocolMismatch { .. }
                | ServerError::Codec(_)
        )
    }

    /// Returns true if the error was caused by server-side code misusing the API.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, ServerError::Replica(_) | ServerError::InvalidParams(_))
    }
}
