//! Fuzz testing harnesses for the replication stack.
//!
//! These targets can be driven by cargo-fuzz or other fuzzing frameworks.
//! Each must return normally for every input.

use replica_client::{ClientConfig, MemoryClientTransport, ReplicaClient, SessionState};
use replica_codec::{from_cbor, to_canonical_cbor, Path, PathKey, Value};
use replica_core::Document;
use replica_protocol::ReplicaMessage;

/// Fuzz target for CBOR decoding.
///
/// Arbitrary bytes either decode to a value or return an error.
pub fn fuzz_cbor_decode(data: &[u8]) {
    let _ = from_cbor(data);
}

/// Fuzz target for message decoding.
///
/// Any message that decodes must re-encode and decode to itself.
pub fn fuzz_message_roundtrip(data: &[u8]) {
    if let Ok(message) = ReplicaMessage::decode(data) {
        if let Ok(encoded) = message.encode() {
            let decoded = ReplicaMessage::decode(&encoded).expect("Re-encoded message must decode");
            assert_eq!(decoded, message, "Roundtrip mismatch");
        }
    }
}

/// Fuzz target for the client mirror.
///
/// Splits `data` into length-prefixed payloads and feeds them to a client.
/// Errors are expected; panics are not. Once terminated, the client must
/// stay terminated.
pub fn fuzz_client_stream(data: &[u8]) {
    let mut client = ReplicaClient::new(ClientConfig::default(), MemoryClientTransport::new());
    let mut offset = 0;
    let mut terminated = false;

    while offset < data.len() {
        let len = usize::from(data[offset]);
        offset += 1;
        let end = (offset + len).min(data.len());
        let _ = client.handle_message(&data[offset..end]);
        offset = end;

        if terminated {
            assert_eq!(client.state(), SessionState::Terminated);
        }
        terminated = client.state() == SessionState::Terminated;
    }
}

/// Fuzz target for document mutations.
///
/// Interprets `data` as a sequence of mutations on a small document. Every
/// rejected mutation must leave the document unchanged, and the document
/// must always re-encode canonically.
pub fn fuzz_document_ops(data: &[u8]) {
    const KEYS: [&str; 3] = ["a", "b", "list"];

    let mut document = Document::new(Value::map(vec![
        (Value::from("list"), Value::Array(Vec::new())),
        (Value::from("a"), Value::empty_map()),
    ]));

    for chunk in data.chunks(3) {
        let [op, key, arg] = match *chunk {
            [op, key, arg] => [op, key, arg],
            _ => return,
        };
        let name = KEYS[usize::from(key) % KEYS.len()];
        let path = if key & 0x80 == 0 {
            Path::from([name])
        } else {
            Path::from([name, "b"])
        };
        let index = usize::from(arg % 8);
        let value = Value::Integer(i64::from(arg));

        let before = document.clone();
        let result = match op % 4 {
            0 => document.set(&path, value).map(drop),
            1 => document
                .set_values(&path, &[(PathKey::from(name), value)])
                .map(drop),
            2 => document.table_insert(&path, value, Some(index)).map(drop),
            _ => document.table_remove(&path, index).map(drop),
        };
        if result.is_err() {
            assert_eq!(document, before, "Rejected mutation changed the document");
        }
        to_canonical_cbor(document.root()).expect("Document must encode");
    }
}
