//! Dynamic document value type.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::cmp::Ordering;

/// A dynamic document value.
///
/// Replica documents are trees of these values. Maps keep their entries
/// sorted by [`Value::cmp_canonical`] at all times, so two documents that
/// hold the same entries are structurally equal regardless of the order in
/// which the entries were written.
///
/// Floats are intentionally absent: every document must encode to the same
/// bytes on every peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value. Writing null into a map entry removes the entry.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Sequence of values.
    Array(Vec<Value>),
    /// Map of key-value pairs, sorted by key.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create a map value with sorted keys.
    ///
    /// When the same key appears more than once the last pair wins.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        let mut sorted: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match sorted.binary_search_by(|(k, _)| k.cmp_canonical(&key)) {
                Ok(pos) => sorted[pos].1 = value,
                Err(pos) => sorted.insert(pos, (key, value)),
            }
        }
        Value::Map(sorted)
    }

    /// Create an empty map.
    pub fn empty_map() -> Self {
        Value::Map(Vec::new())
    }

    /// Compare two values for canonical ordering.
    ///
    /// Mirrors the ordering of canonical CBOR encodings: major type first,
    /// then encoded length, then content.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.major_type()
            .cmp(&other.major_type())
            .then_with(|| match (self, other) {
                (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
                (Value::Integer(a), Value::Integer(b)) => {
                    let (ua, ub) = (Self::integer_argument(*a), Self::integer_argument(*b));
                    Self::argument_len(ua)
                        .cmp(&Self::argument_len(ub))
                        .then(ua.cmp(&ub))
                }
                (Value::Bytes(a), Value::Bytes(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
                (Value::Text(a), Value::Text(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
                (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()).then_with(|| {
                    a.iter()
                        .zip(b)
                        .map(|(x, y)| x.cmp_canonical(y))
                        .find(|ord| *ord != Ordering::Equal)
                        .unwrap_or(Ordering::Equal)
                }),
                (Value::Map(a), Value::Map(b)) => a.len().cmp(&b.len()).then_with(|| {
                    a.iter()
                        .zip(b)
                        .map(|((ka, va), (kb, vb))| {
                            ka.cmp_canonical(kb).then_with(|| va.cmp_canonical(vb))
                        })
                        .find(|ord| *ord != Ordering::Equal)
                        .unwrap_or(Ordering::Equal)
                }),
                // Null vs Null, or Null vs Bool within the simple-value type.
                (Value::Null, Value::Bool(_)) => Ordering::Greater,
                (Value::Bool(_), Value::Null) => Ordering::Less,
                _ => Ordering::Equal,
            })
    }

    /// CBOR argument of an integer: `n` for non-negative, `-1 - n` otherwise.
    #[allow(clippy::cast_sign_loss)]
    fn integer_argument(n: i64) -> u64 {
        if n >= 0 {
            n as u64
        } else {
            (-1 - n) as u64
        }
    }

    fn argument_len(n: u64) -> u8 {
        match n {
            0..=23 => 1,
            24..=0xFF => 2,
            0x100..=0xFFFF => 3,
            0x1_0000..=0xFFFF_FFFF => 5,
            _ => 9,
        }
    }

    fn major_type(&self) -> u8 {
        match self {
            Value::Integer(n) if *n >= 0 => 0,
            Value::Integer(_) => 1,
            Value::Bytes(_) => 2,
            Value::Text(_) => 3,
            Value::Array(_) => 4,
            Value::Map(_) => 5,
            Value::Bool(_) | Value::Null => 7,
        }
    }

    /// Short name of this value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for arrays and maps.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Map(_))
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a mutable array, if it is one.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Number of elements of an array or entries of a map.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(a.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Look up a text key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Look up an arbitrary key in this map value.
    pub fn get_key(&self, key: &Value) -> Option<&Value> {
        let pairs = self.as_map()?;
        pairs
            .binary_search_by(|(k, _)| k.cmp_canonical(key))
            .ok()
            .map(|pos| &pairs[pos].1)
    }

    /// Mutable lookup of an arbitrary key in this map value.
    pub fn get_key_mut(&mut self, key: &Value) -> Option<&mut Value> {
        match self {
            Value::Map(pairs) => {
                let pos = pairs.binary_search_by(|(k, _)| k.cmp_canonical(key)).ok()?;
                Some(&mut pairs[pos].1)
            }
            _ => None,
        }
    }

    /// Insert into a map value, keeping keys sorted.
    ///
    /// Returns the previous value for the key. Does nothing and returns
    /// `None` if this value is not a map.
    pub fn map_insert(&mut self, key: Value, value: Value) -> Option<Value> {
        let Value::Map(pairs) = self else {
            return None;
        };
        match pairs.binary_search_by(|(k, _)| k.cmp_canonical(&key)) {
            Ok(pos) => Some(std::mem::replace(&mut pairs[pos].1, value)),
            Err(pos) => {
                pairs.insert(pos, (key, value));
                None
            }
        }
    }

    /// Remove a key from a map value, returning its value.
    pub fn map_remove(&mut self, key: &Value) -> Option<Value> {
        let Value::Map(pairs) = self else {
            return None;
        };
        let pos = pairs.binary_search_by(|(k, _)| k.cmp_canonical(key)).ok()?;
        Some(pairs.remove(pos).1)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (k, v) in pairs {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}
