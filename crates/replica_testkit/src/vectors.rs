//! Wire-format test vectors.
//!
//! These vectors pin the canonical CBOR form of replication messages so
//! independent client implementations can check their codecs.

use replica_codec::{Path, Value};
use replica_core::ReplicaId;
use replica_protocol::ReplicaMessage;
use serde::{Deserialize, Serialize};

/// A test vector that can be shared across implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Encoded payload (hex).
    pub input_hex: String,
    /// Expected message kind, if the payload is valid.
    pub expected_kind: Option<String>,
    /// Expected error message (if this should fail).
    pub expected_error: Option<String>,
}

fn valid(id: &str, description: &str, hex: &str, kind: &str) -> TestVector {
    TestVector {
        id: id.into(),
        description: description.into(),
        input_hex: hex.into(),
        expected_kind: Some(kind.into()),
        expected_error: None,
    }
}

fn invalid(id: &str, description: &str, hex: &str, error: &str) -> TestVector {
    TestVector {
        id: id.into(),
        description: description.into(),
        input_hex: hex.into(),
        expected_kind: None,
        expected_error: Some(error.into()),
    }
}

/// Vectors for well-formed messages.
pub fn message_vectors() -> Vec<TestVector> {
    vec![
        valid(
            "msg_request_data_v1",
            "RequestData carrying protocol version 1",
            "a26174017070726f746f636f6c5f76657273696f6e01",
            "request_data",
        ),
        valid(
            "msg_destroy_7",
            "Destroy replica 7",
            "a261740962696407",
            "destroy",
        ),
        valid(
            "msg_set_hp_50",
            "Set replica 3 path [hp] to 50",
            "a46174036269640364706174688162687065766176616c75651832",
            "set",
        ),
    ]
}

/// Messages matching [`message_vectors`], in the same order.
pub fn expected_messages() -> Vec<ReplicaMessage> {
    vec![
        ReplicaMessage::RequestData {
            protocol_version: 1,
        },
        ReplicaMessage::Destroy { id: ReplicaId(7) },
        ReplicaMessage::Set {
            id: ReplicaId(3),
            path: Path::from(["hp"]),
            value: Value::Integer(50),
        },
    ]
}

/// Vectors for payloads that must be rejected.
pub fn malformed_vectors() -> Vec<TestVector> {
    vec![
        invalid("bad_null", "Null instead of a message map", "f6", "invalid structure"),
        invalid(
            "bad_unknown_type",
            "Message type 255 does not exist",
            "a1617418ff",
            "unknown message type",
        ),
        invalid("bad_truncated", "Map header without entries", "a2", "decoding failed"),
        invalid("bad_float", "Half-precision float 1.0", "f93c00", "float"),
        invalid(
            "bad_negative_id",
            "Destroy with a negative replica id",
            "a261740962696420",
            "invalid structure",
        ),
    ]
}

/// Returns all test vectors as JSON.
pub fn all_vectors_json() -> String {
    #[derive(Serialize)]
    struct AllVectors {
        messages: Vec<TestVector>,
        malformed: Vec<TestVector>,
    }

    let all = AllVectors {
        messages: message_vectors(),
        malformed: malformed_vectors(),
    };

    serde_json::to_string_pretty(&all).unwrap_or_default()
}

/// Encodes bytes as a lowercase hexadecimal string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes a hexadecimal string, ignoring whitespace.
///
/// Returns `None` on odd length or non-hex characters.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| hex.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
