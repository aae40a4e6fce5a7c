//! Error types for the replica client.

use replica_codec::CodecError;
use replica_core::{ReplicaError, ReplicaId};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while mirroring replicas.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// An event referenced a replica the client does not hold.
    ///
    /// The reliable channel should make this impossible; the session is
    /// terminated.
    #[error("{event} references unknown replica {id}")]
    ProtocolOrderingViolation {
        /// Referenced replica.
        id: ReplicaId,
        /// Kind of the offending message.
        event: &'static str,
    },

    /// Replaying an event on the mirror failed; the mirror no longer
    /// matches the server.
    #[error("mirror of replica {id} diverged: {reason}")]
    Desync {
        /// Affected replica.
        id: ReplicaId,
        /// What failed.
        reason: String,
    },

    /// A replica uses a write lib that was not registered on this client.
    #[error("write lib {name} is not registered")]
    UnknownWriteLib {
        /// Registry name.
        name: String,
    },

    /// The session was terminated by an earlier fatal error.
    #[error("session terminated")]
    SessionTerminated,

    /// Payload exceeds the configured limit.
    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Payload size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The server sent a message only clients may send.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Local replica operation failed.
    #[error(transparent)]
    Replica(#[from] ReplicaError),

    /// Payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ClientError {
    /// Returns true if the error ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::ProtocolOrderingViolation { .. }
                | ClientError::Desync { .. }
                | ClientError::UnknownWriteLib { .. }
                | ClientError::SessionTerminated
        )
    }
}
