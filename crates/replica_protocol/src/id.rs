//! Replica identifiers.

use replica_codec::{CodecError, CodecResult, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned replica identifier.
///
/// Identifiers are unique for the lifetime of a server and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ReplicaId(pub u64);

impl ReplicaId {
    /// Returns the raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Wire form.
    pub fn to_value(self) -> CodecResult<Value> {
        i64::try_from(self.0)
            .map(Value::Integer)
            .map_err(|_| CodecError::IntegerOverflow)
    }

    /// Parses the wire form.
    pub fn from_value(value: &Value) -> CodecResult<Self> {
        let raw = value
            .as_integer()
            .ok_or_else(|| CodecError::invalid_structure("replica id must be an integer"))?;
        u64::try_from(raw)
            .map(ReplicaId)
            .map_err(|_| CodecError::invalid_structure("replica id must be non-negative"))
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReplicaId {
    fn from(raw: u64) -> Self {
        ReplicaId(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form() {
        let id = ReplicaId(42);
        assert_eq!(id.to_value().unwrap(), Value::Integer(42));
        assert_eq!(ReplicaId::from_value(&Value::Integer(42)).unwrap(), id);
        assert!(ReplicaId::from_value(&Value::Integer(-1)).is_err());
        assert!(ReplicaId::from_value(&Value::from("42")).is_err());
    }

    #[test]
    fn ordering_follows_allocation() {
        assert!(ReplicaId(1) < ReplicaId(2));
        assert_eq!(ReplicaId::from(7).to_string(), "7");
    }
}
