//! # Replica Codec
//!
//! Document model and CBOR wire encoding for replica state.
//!
//! This crate provides:
//! - [`Value`]: the dynamic, nested document type wrapped by every replica
//! - [`Path`]: addressing of a value inside a document
//! - Deterministic CBOR encoding/decoding of values
//!
//! ## Encoding Rules
//!
//! - Maps are kept sorted by key (canonical CBOR order) at all times
//! - Integers use shortest encoding
//! - No floats
//! - Strings must be UTF-8
//!
//! ## Usage
//!
//! ```
//! use replica_codec::{to_canonical_cbor, from_cbor, Value};
//!
//! let value = Value::map(vec![(Value::from("hp"), Value::Integer(42))]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//!
//! let decoded: Value = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod path;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use path::{Path, PathKey};
pub use value::Value;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) {
        let bytes = value.encode().unwrap();
        assert_eq!(Value::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn roundtrip_scalars() {
        roundtrip(Value::Integer(i64::MIN));
        roundtrip(Value::Integer(i64::MAX));
        roundtrip(Value::Text("hello world".to_string()));
        roundtrip(Value::Bytes(vec![1, 2, 3, 4, 5]));
        roundtrip(Value::Bool(true));
        roundtrip(Value::Null);
    }

    #[test]
    fn roundtrip_player_document() {
        let value = Value::map(vec![
            (Value::from("hp"), Value::Integer(100)),
            (
                Value::from("inventory"),
                Value::Array(vec![
                    Value::map(vec![
                        (Value::from("name"), Value::from("sword")),
                        (Value::from("count"), Value::Integer(1)),
                    ]),
                    Value::map(vec![
                        (Value::from("name"), Value::from("potion")),
                        (Value::from("count"), Value::Integer(3)),
                    ]),
                ]),
            ),
            (
                Value::from("slots"),
                Value::map(vec![(Value::Integer(1), Value::from("sword"))]),
            ),
        ]);
        roundtrip(value);
    }

    #[test]
    fn value_serializes_to_json() {
        let value = Value::map(vec![
            (Value::from("hp"), Value::Integer(5)),
            (Value::from("tags"), Value::from(vec!["a", "b"])),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"hp":5,"tags":["a","b"]}"#);
    }
}
