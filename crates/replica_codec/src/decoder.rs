//! CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or contain constructs
/// outside the document model (floats, out-of-range integers).
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    CanonicalDecoder::new(bytes).decode()
}

/// A CBOR decoder producing document values.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Decode the value held by the input.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let raw: ciborium::Value = ciborium::de::from_reader(self.data)
            .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
        convert(raw)
    }
}

fn convert(raw: ciborium::Value) -> CodecResult<Value> {
    match raw {
        ciborium::Value::Null => Ok(Value::Null),
        ciborium::Value::Bool(b) => Ok(Value::Bool(b)),
        ciborium::Value::Integer(n) => i64::try_from(n)
            .map(Value::Integer)
            .map_err(|_| CodecError::IntegerOverflow),
        ciborium::Value::Bytes(b) => Ok(Value::Bytes(b)),
        ciborium::Value::Text(s) => Ok(Value::Text(s)),
        ciborium::Value::Float(_) => Err(CodecError::FloatForbidden),
        // Tags carry no meaning in replica documents.
        ciborium::Value::Tag(_, inner) => convert(*inner),
        ciborium::Value::Array(items) => items
            .into_iter()
            .map(convert)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array),
        ciborium::Value::Map(pairs) => pairs
            .into_iter()
            .map(|(k, v)| Ok((convert(k)?, convert(v)?)))
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::map),
        other => Err(CodecError::unsupported_type(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_integers() {
        assert_eq!(from_cbor(&[0x17]).unwrap(), Value::Integer(23));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn decode_rejects_float() {
        // half-precision 1.0
        assert_eq!(from_cbor(&[0xf9, 0x3c, 0x00]), Err(CodecError::FloatForbidden));
    }

    #[test]
    fn decode_rejects_huge_unsigned() {
        // u64::MAX does not fit an i64
        let bytes = [0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(from_cbor(&bytes), Err(CodecError::IntegerOverflow));
    }

    #[test]
    fn decode_truncated_input() {
        assert!(matches!(
            from_cbor(&[0x62, b'a']),
            Err(CodecError::DecodingFailed { .. })
        ));
    }

    #[test]
    fn decode_sorts_unsorted_map() {
        // map(2), "bb": 2, "a": 1
        let bytes = [0xa2, 0x62, b'b', b'b', 0x02, 0x61, b'a', 0x01];
        let value = from_cbor(&bytes).unwrap();
        assert_eq!(value.as_map().unwrap()[0].0, Value::Text("a".into()));
    }

    #[test]
    fn decode_strips_tags() {
        // tag(1) 5
        assert_eq!(from_cbor(&[0xc1, 0x05]).unwrap(), Value::Integer(5));
    }
}
