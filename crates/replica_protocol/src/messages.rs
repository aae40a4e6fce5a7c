//! Protocol messages exchanged between server and clients.

use crate::id::ReplicaId;
use replica_codec::{
    from_cbor, to_canonical_cbor, CodecError, CodecResult, Path, PathKey, Value,
};

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Creation payload for a replica, sent once before any other event for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReplica {
    /// Replica ID.
    pub id: ReplicaId,
    /// Class token name.
    pub token: String,
    /// Static tags, sent only with creation.
    pub tags: Value,
    /// Snapshot of the replica's data.
    pub data: Value,
    /// Parent replica, `None` for top-level replicas.
    pub parent: Option<ReplicaId>,
    /// Name of the mutator registry bound to the replica's class.
    pub write_lib: Option<String>,
}

/// A replication protocol message.
///
/// Every variant except [`ReplicaMessage::RequestData`] references a replica
/// by id. `Custom` travels in both directions; `RequestData` only from client
/// to server; everything else only from server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaMessage {
    /// Client has finished loading and asks for initial data.
    RequestData {
        /// Client's protocol version.
        protocol_version: u16,
    },
    /// Replica creation.
    Create(CreateReplica),
    /// Replace the value at `path`.
    Set {
        /// Replica ID.
        id: ReplicaId,
        /// Target path.
        path: Path,
        /// New value (null removes a map entry).
        value: Value,
    },
    /// Set several keys below `path` at once.
    SetValues {
        /// Replica ID.
        id: ReplicaId,
        /// Container path.
        path: Path,
        /// Keys and their new values.
        values: Vec<(PathKey, Value)>,
    },
    /// Insert into the sequence at `path`.
    TableInsert {
        /// Replica ID.
        id: ReplicaId,
        /// Sequence path.
        path: Path,
        /// Inserted value.
        value: Value,
        /// Resolved insertion index.
        index: usize,
    },
    /// Remove from the sequence at `path`.
    TableRemove {
        /// Replica ID.
        id: ReplicaId,
        /// Sequence path.
        path: Path,
        /// Removed index.
        index: usize,
    },
    /// Invocation of a registered mutator, by index.
    Write {
        /// Replica ID.
        id: ReplicaId,
        /// Index of the mutator in the replica's registry.
        mutator: u16,
        /// Mutator arguments.
        args: Vec<Value>,
    },
    /// Replica moved under a new parent.
    Reparent {
        /// Replica ID.
        id: ReplicaId,
        /// New parent.
        parent: Option<ReplicaId>,
    },
    /// Replica destroyed.
    Destroy {
        /// Replica ID.
        id: ReplicaId,
    },
    /// Application signal scoped to a replica.
    Custom {
        /// Replica ID.
        id: ReplicaId,
        /// Signal arguments.
        args: Vec<Value>,
    },
}

impl ReplicaMessage {
    /// Returns the message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            ReplicaMessage::RequestData { .. } => 1,
            ReplicaMessage::Create(_) => 2,
            ReplicaMessage::Set { .. } => 3,
            ReplicaMessage::SetValues { .. } => 4,
            ReplicaMessage::TableInsert { .. } => 5,
            ReplicaMessage::TableRemove { .. } => 6,
            ReplicaMessage::Write { .. } => 7,
            ReplicaMessage::Reparent { .. } => 8,
            ReplicaMessage::Destroy { .. } => 9,
            ReplicaMessage::Custom { .. } => 10,
        }
    }

    /// Human-readable message kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicaMessage::RequestData { .. } => "request_data",
            ReplicaMessage::Create(_) => "create",
            ReplicaMessage::Set { .. } => "set",
            ReplicaMessage::SetValues { .. } => "set_values",
            ReplicaMessage::TableInsert { .. } => "table_insert",
            ReplicaMessage::TableRemove { .. } => "table_remove",
            ReplicaMessage::Write { .. } => "write",
            ReplicaMessage::Reparent { .. } => "reparent",
            ReplicaMessage::Destroy { .. } => "destroy",
            ReplicaMessage::Custom { .. } => "custom",
        }
    }

    /// The replica this message refers to.
    pub fn replica_id(&self) -> Option<ReplicaId> {
        match self {
            ReplicaMessage::RequestData { .. } => None,
            ReplicaMessage::Create(create) => Some(create.id),
            ReplicaMessage::Set { id, .. }
            | ReplicaMessage::SetValues { id, .. }
            | ReplicaMessage::TableInsert { id, .. }
            | ReplicaMessage::TableRemove { id, .. }
            | ReplicaMessage::Write { id, .. }
            | ReplicaMessage::Reparent { id, .. }
            | ReplicaMessage::Destroy { id }
            | ReplicaMessage::Custom { id, .. } => Some(*id),
        }
    }

    /// Converts to the document form used on the wire.
    pub fn to_value(&self) -> CodecResult<Value> {
        let mut pairs = vec![(
            Value::Text("t".into()),
            Value::Integer(i64::from(self.type_code())),
        )];
        if let Some(id) = self.replica_id() {
            pairs.push((Value::Text("id".into()), id.to_value()?));
        }

        match self {
            ReplicaMessage::RequestData { protocol_version } => {
                pairs.push((
                    Value::Text("protocol_version".into()),
                    Value::Integer(i64::from(*protocol_version)),
                ));
            }
            ReplicaMessage::Create(create) => {
                pairs.push((Value::Text("token".into()), Value::Text(create.token.clone())));
                pairs.push((Value::Text("tags".into()), create.tags.clone()));
                pairs.push((Value::Text("data".into()), create.data.clone()));
                if let Some(parent) = create.parent {
                    pairs.push((Value::Text("parent".into()), parent.to_value()?));
                }
                if let Some(ref lib) = create.write_lib {
                    pairs.push((Value::Text("write_lib".into()), Value::Text(lib.clone())));
                }
            }
            ReplicaMessage::Set { path, value, .. } => {
                pairs.push((Value::Text("path".into()), path.to_value()));
                pairs.push((Value::Text("value".into()), value.clone()));
            }
            ReplicaMessage::SetValues { path, values, .. } => {
                pairs.push((Value::Text("path".into()), path.to_value()));
                let values = values
                    .iter()
                    .map(|(k, v)| (k.to_value(), v.clone()))
                    .collect();
                pairs.push((Value::Text("values".into()), Value::map(values)));
            }
            ReplicaMessage::TableInsert {
                path, value, index, ..
            } => {
                pairs.push((Value::Text("path".into()), path.to_value()));
                pairs.push((Value::Text("value".into()), value.clone()));
                pairs.push((Value::Text("index".into()), index_to_value(*index)?));
            }
            ReplicaMessage::TableRemove { path, index, .. } => {
                pairs.push((Value::Text("path".into()), path.to_value()));
                pairs.push((Value::Text("index".into()), index_to_value(*index)?));
            }
            ReplicaMessage::Write { mutator, args, .. } => {
                pairs.push((
                    Value::Text("mutator".into()),
                    Value::Integer(i64::from(*mutator)),
                ));
                pairs.push((Value::Text("args".into()), Value::Array(args.clone())));
            }
            ReplicaMessage::Reparent { parent, .. } => {
                if let Some(parent) = parent {
                    pairs.push((Value::Text("parent".into()), parent.to_value()?));
                }
            }
            ReplicaMessage::Destroy { .. } => {}
            ReplicaMessage::Custom { args, .. } => {
                pairs.push((Value::Text("args".into()), Value::Array(args.clone())));
            }
        }

        Ok(Value::map(pairs))
    }

    /// Parses the document form produced by [`ReplicaMessage::to_value`].
    pub fn from_value(value: &Value) -> CodecResult<Self> {
        let fields = Fields::new(value)?;
        let code = fields.integer("t")?;

        let message = match code {
            1 => ReplicaMessage::RequestData {
                protocol_version: u16::try_from(fields.integer("protocol_version")?)
                    .map_err(|_| CodecError::invalid_structure("protocol_version out of range"))?,
            },
            2 => ReplicaMessage::Create(CreateReplica {
                id: fields.replica_id("id")?,
                token: fields
                    .get("token")
                    .and_then(Value::as_text)
                    .ok_or_else(|| CodecError::invalid_structure("missing token"))?
                    .to_string(),
                tags: fields.get("tags").cloned().unwrap_or_else(Value::empty_map),
                data: fields.get("data").cloned().unwrap_or_else(Value::empty_map),
                parent: fields.optional_replica_id("parent")?,
                write_lib: fields
                    .get("write_lib")
                    .and_then(Value::as_text)
                    .map(str::to_string),
            }),
            3 => ReplicaMessage::Set {
                id: fields.replica_id("id")?,
                path: fields.path()?,
                value: fields.get("value").cloned().unwrap_or(Value::Null),
            },
            4 => {
                let values = fields
                    .get("values")
                    .and_then(Value::as_map)
                    .ok_or_else(|| CodecError::invalid_structure("missing values"))?
                    .iter()
                    .map(|(k, v)| Ok((PathKey::from_value(k)?, v.clone())))
                    .collect::<CodecResult<Vec<_>>>()?;
                ReplicaMessage::SetValues {
                    id: fields.replica_id("id")?,
                    path: fields.path()?,
                    values,
                }
            }
            5 => ReplicaMessage::TableInsert {
                id: fields.replica_id("id")?,
                path: fields.path()?,
                value: fields.get("value").cloned().unwrap_or(Value::Null),
                index: fields.index()?,
            },
            6 => ReplicaMessage::TableRemove {
                id: fields.replica_id("id")?,
                path: fields.path()?,
                index: fields.index()?,
            },
            7 => ReplicaMessage::Write {
                id: fields.replica_id("id")?,
                mutator: u16::try_from(fields.integer("mutator")?)
                    .map_err(|_| CodecError::invalid_structure("mutator index out of range"))?,
                args: fields.args()?,
            },
            8 => ReplicaMessage::Reparent {
                id: fields.replica_id("id")?,
                parent: fields.optional_replica_id("parent")?,
            },
            9 => ReplicaMessage::Destroy {
                id: fields.replica_id("id")?,
            },
            10 => ReplicaMessage::Custom {
                id: fields.replica_id("id")?,
                args: fields.args()?,
            },
            other => {
                return Err(CodecError::invalid_structure(format!(
                    "unknown message type {other}"
                )))
            }
        };
        Ok(message)
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(&self.to_value()?)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value: Value = from_cbor(bytes)?;
        Self::from_value(&value)
    }
}

fn index_to_value(index: usize) -> CodecResult<Value> {
    i64::try_from(index)
        .map(Value::Integer)
        .map_err(|_| CodecError::IntegerOverflow)
}

/// Field access over a decoded message map.
struct Fields<'a> {
    map: &'a [(Value, Value)],
}

impl<'a> Fields<'a> {
    fn new(value: &'a Value) -> CodecResult<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| CodecError::invalid_structure("expected map"))?;
        Ok(Self { map })
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    }

    fn integer(&self, name: &str) -> CodecResult<i64> {
        self.get(name)
            .and_then(Value::as_integer)
            .ok_or_else(|| CodecError::invalid_structure(format!("missing {name}")))
    }

    fn replica_id(&self, name: &str) -> CodecResult<ReplicaId> {
        ReplicaId::from_value(
            self.get(name)
                .ok_or_else(|| CodecError::invalid_structure(format!("missing {name}")))?,
        )
    }

    fn optional_replica_id(&self, name: &str) -> CodecResult<Option<ReplicaId>> {
        self.get(name).map(ReplicaId::from_value).transpose()
    }

    fn path(&self) -> CodecResult<Path> {
        Path::from_value(
            self.get("path")
                .ok_or_else(|| CodecError::invalid_structure("missing path"))?,
        )
    }

    fn index(&self) -> CodecResult<usize> {
        usize::try_from(self.integer("index")?)
            .map_err(|_| CodecError::invalid_structure("negative index"))
    }

    fn args(&self) -> CodecResult<Vec<Value>> {
        Ok(self
            .get("args")
            .and_then(Value::as_array)
            .ok_or_else(|| CodecError::invalid_structure("missing args"))?
            .to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hp_path() -> Path {
        Path::from(["hp"])
    }

    #[test]
    fn create_roundtrip() {
        let message = ReplicaMessage::Create(CreateReplica {
            id: ReplicaId(2),
            token: "Player".into(),
            tags: Value::map(vec![(Value::from("owner"), Value::Integer(7))]),
            data: Value::map(vec![(Value::from("hp"), Value::Integer(100))]),
            parent: Some(ReplicaId(1)),
            write_lib: Some("PlayerWrites".into()),
        });
        let bytes = message.encode().unwrap();
        assert_eq!(ReplicaMessage::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn top_level_create_has_no_parent() {
        let message = ReplicaMessage::Create(CreateReplica {
            id: ReplicaId(1),
            token: "World".into(),
            tags: Value::empty_map(),
            data: Value::empty_map(),
            parent: None,
            write_lib: None,
        });
        let value = message.to_value().unwrap();
        assert!(value.get("parent").is_none());
        assert_eq!(ReplicaMessage::from_value(&value).unwrap(), message);
    }

    #[test]
    fn set_roundtrip() {
        let message = ReplicaMessage::Set {
            id: ReplicaId(9),
            path: hp_path(),
            value: Value::Integer(50),
        };
        let decoded = ReplicaMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.replica_id(), Some(ReplicaId(9)));
    }

    #[test]
    fn set_values_keys_survive() {
        let message = ReplicaMessage::SetValues {
            id: ReplicaId(3),
            path: Path::root(),
            values: vec![
                (PathKey::Index(1), Value::from("a")),
                (PathKey::Key("coins".into()), Value::Integer(5)),
            ],
        };
        let decoded = ReplicaMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn write_carries_index_not_name() {
        let message = ReplicaMessage::Write {
            id: ReplicaId(4),
            mutator: 3,
            args: vec![Value::Integer(10)],
        };
        let value = message.to_value().unwrap();
        assert_eq!(value.get("mutator"), Some(&Value::Integer(3)));
        assert_eq!(ReplicaMessage::from_value(&value).unwrap(), message);
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let value = Value::map(vec![(Value::from("t"), Value::Integer(99))]);
        assert!(ReplicaMessage::from_value(&value).is_err());
    }

    #[test]
    fn decode_rejects_negative_index() {
        let value = Value::map(vec![
            (Value::from("t"), Value::Integer(6)),
            (Value::from("id"), Value::Integer(1)),
            (Value::from("path"), Value::Array(vec![])),
            (Value::from("index"), Value::Integer(-1)),
        ]);
        assert!(ReplicaMessage::from_value(&value).is_err());
    }

    #[test]
    fn type_codes_are_unique() {
        let messages = vec![
            ReplicaMessage::RequestData {
                protocol_version: PROTOCOL_VERSION,
            },
            ReplicaMessage::Destroy { id: ReplicaId(1) },
            ReplicaMessage::Reparent {
                id: ReplicaId(1),
                parent: Some(ReplicaId(2)),
            },
            ReplicaMessage::Custom {
                id: ReplicaId(1),
                args: vec![],
            },
        ];
        let mut codes: Vec<u8> = messages.iter().map(ReplicaMessage::type_code).collect();
        codes.dedup();
        assert_eq!(codes, vec![1, 9, 8, 10]);
        for message in messages {
            let decoded = ReplicaMessage::decode(&message.encode().unwrap()).unwrap();
            assert_eq!(decoded, message);
        }
    }
}
