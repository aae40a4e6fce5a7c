//! Addressing values inside a document.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::fmt;

/// One segment of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathKey {
    /// A text key into a map.
    Key(String),
    /// An integer key: an index into an array, or an integer map key.
    Index(i64),
}

impl PathKey {
    /// The map key this segment addresses.
    pub fn to_value(&self) -> Value {
        match self {
            PathKey::Key(k) => Value::Text(k.clone()),
            PathKey::Index(i) => Value::Integer(*i),
        }
    }

    /// Converts a map key back into a path segment.
    pub fn from_value(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Text(k) => Ok(PathKey::Key(k.clone())),
            Value::Integer(i) => Ok(PathKey::Index(*i)),
            other => Err(CodecError::invalid_structure(format!(
                "path segment must be text or integer, got {}",
                other.kind()
            ))),
        }
    }

    /// The segment as an array index, if it is a non-negative integer.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathKey::Index(i) => usize::try_from(*i).ok(),
            PathKey::Key(_) => None,
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Key(k) => f.write_str(k),
            PathKey::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathKey {
    fn from(k: &str) -> Self {
        PathKey::Key(k.to_string())
    }
}

impl From<String> for PathKey {
    fn from(k: String) -> Self {
        PathKey::Key(k)
    }
}

impl From<i64> for PathKey {
    fn from(i: i64) -> Self {
        PathKey::Index(i)
    }
}

impl From<i32> for PathKey {
    fn from(i: i32) -> Self {
        PathKey::Index(i64::from(i))
    }
}

impl From<usize> for PathKey {
    fn from(i: usize) -> Self {
        PathKey::Index(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

/// An ordered sequence of keys locating a value inside a document.
///
/// The empty path addresses the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<PathKey>);

impl Path {
    /// The root path.
    pub fn root() -> Self {
        Path(Vec::new())
    }

    /// Creates a path from its segments.
    pub fn new(keys: Vec<PathKey>) -> Self {
        Path(keys)
    }

    /// Parses a dotted path such as `"inventory.3.name"`.
    ///
    /// Segments that parse as integers become [`PathKey::Index`]. The empty
    /// string is the root path.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Path::root();
        }
        Path(
            dotted
                .split('.')
                .map(|segment| match segment.parse::<i64>() {
                    Ok(i) => PathKey::Index(i),
                    Err(_) => PathKey::Key(segment.to_string()),
                })
                .collect(),
        )
    }

    /// The segments of this path.
    pub fn keys(&self) -> &[PathKey] {
        &self.0
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path with `key` appended.
    pub fn child(&self, key: impl Into<PathKey>) -> Self {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Path(keys)
    }

    /// Splits off the final segment.
    pub fn split_last(&self) -> Option<(&PathKey, &[PathKey])> {
        self.0.split_last()
    }

    /// Wire form: an array of text/integer keys.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().map(PathKey::to_value).collect())
    }

    /// Parses the wire form produced by [`Path::to_value`].
    pub fn from_value(value: &Value) -> CodecResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| CodecError::invalid_structure("path must be an array"))?;
        items
            .iter()
            .map(PathKey::from_value)
            .collect::<CodecResult<Vec<_>>>()
            .map(Path)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl From<Vec<PathKey>> for Path {
    fn from(keys: Vec<PathKey>) -> Self {
        Path(keys)
    }
}

impl<K: Into<PathKey>, const N: usize> From<[K; N]> for Path {
    fn from(keys: [K; N]) -> Self {
        Path(keys.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Path {
    fn from(dotted: &str) -> Self {
        Path::parse(dotted)
    }
}
