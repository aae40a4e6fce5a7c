//! Error types for replica core.

use replica_codec::CodecError;
use replica_protocol::ReplicaId;
use thiserror::Error;

/// Result type for core operations.
pub type ReplicaResult<T> = Result<T, ReplicaError>;

/// Errors that can occur when operating on replicas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
    /// Operation on a destroyed replica.
    #[error("replica {id} is no longer active")]
    InactiveNode {
        /// The destroyed replica.
        id: ReplicaId,
    },

    /// Mutation target does not resolve.
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it does not resolve.
        reason: String,
    },

    /// Sequence index outside the valid range.
    #[error("index {index} out of range for sequence at {path} (length {len})")]
    IndexOutOfRange {
        /// Path of the sequence.
        path: String,
        /// Requested index.
        index: usize,
        /// Sequence length.
        len: usize,
    },

    /// Mutator name not present in the replica's registry.
    #[error("unknown mutator: {name}")]
    UnknownMutator {
        /// Requested mutator name.
        name: String,
    },

    /// Mutator index not present in the replica's registry.
    #[error("unknown mutator index {index} in write lib {lib}")]
    UnknownMutatorIndex {
        /// Registry name.
        lib: String,
        /// Requested index.
        index: u16,
    },

    /// The same mutator name was registered twice.
    #[error("mutator {name} registered twice in write lib {lib}")]
    DuplicateMutator {
        /// Registry name.
        lib: String,
        /// Duplicated mutator name.
        name: String,
    },

    /// A registry has more mutators than the wire index can address.
    #[error("write lib {lib} has {count} mutators, more than the wire format allows")]
    TooManyMutators {
        /// Registry name.
        lib: String,
        /// Number of registered mutators.
        count: usize,
    },

    /// Parent assignment is not allowed.
    #[error("cannot parent replica {id} to {parent}: {reason}")]
    InvalidParent {
        /// The replica being moved or created.
        id: ReplicaId,
        /// The requested parent.
        parent: ReplicaId,
        /// Why the assignment was refused.
        reason: String,
    },

    /// Replica is already bound to an external object.
    #[error("replica {id} is already bound to an object")]
    AlreadyBound {
        /// The bound replica.
        id: ReplicaId,
    },

    /// A user mutator reported failure.
    #[error("mutator {name} failed: {message}")]
    Mutator {
        /// Mutator name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// Value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ReplicaError {
    /// Create an invalid path error.
    pub fn invalid_path(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a mutator failure error.
    pub fn mutator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mutator {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error indicates use of a destroyed replica.
    pub fn is_inactive(&self) -> bool {
        matches!(self, ReplicaError::InactiveNode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ReplicaError::IndexOutOfRange {
            path: "items".into(),
            index: 5,
            len: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("items"));
        assert!(msg.contains('5'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn inactive_classification() {
        assert!(ReplicaError::InactiveNode { id: ReplicaId(3) }.is_inactive());
        assert!(!ReplicaError::invalid_path("a.b", "not a container").is_inactive());
    }

    #[test]
    fn codec_errors_convert() {
        let err: ReplicaError = CodecError::FloatForbidden.into();
        assert!(matches!(err, ReplicaError::Codec(CodecError::FloatForbidden)));
    }
}
