//! The client mirror builder.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::mirror::{ChangeEvent, MirrorListeners, MirrorReplica, ReplicaCreated, SetEvent};
use crate::state::{MirrorStats, SessionState};
use crate::transport::ClientTransport;
use replica_codec::{Path, Value};
use replica_core::{
    Connection, Maid, ReplicaError, ReplicaId, ReplicaToken, ReplicaWriter, Signal, WriteLib,
};
use replica_protocol::{CreateReplica, ReplicaMessage};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Rebuilds the server's replica tree from the ordered event stream.
///
/// Events referencing a replica the client does not hold are protocol
/// ordering violations: the session is terminated and every later message
/// is refused with [`ClientError::SessionTerminated`]. Malformed payloads are
/// rejected without ending the session.
pub struct ReplicaClient<T: ClientTransport> {
    config: ClientConfig,
    transport: T,
    state: SessionState,
    stats: MirrorStats,
    replicas: BTreeMap<ReplicaId, MirrorReplica>,
    write_libs: HashMap<String, Arc<WriteLib>>,
    class_listeners: HashMap<ReplicaToken, Signal<ReplicaCreated>>,
}

impl<T: ClientTransport> ReplicaClient<T> {
    /// Creates a client with an empty mirror.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            state: SessionState::Idle,
            stats: MirrorStats::default(),
            replicas: BTreeMap::new(),
            write_libs: HashMap::new(),
            class_listeners: HashMap::new(),
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Traffic counters.
    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    /// The outgoing transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the outgoing transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Registers a write lib so `Write` events for its classes can be replayed.
    ///
    /// Must match the server's registry of the same name.
    pub fn register_write_lib(&mut self, lib: Arc<WriteLib>) {
        debug!(lib = lib.name(), mutators = lib.len(), "write lib registered");
        self.write_libs.insert(lib.name().to_string(), lib);
    }

    /// Tells the server the client is loaded and wants initial data.
    pub fn request_data(&mut self) -> ClientResult<()> {
        match self.state {
            SessionState::Terminated => return Err(ClientError::SessionTerminated),
            SessionState::Live => {
                warn!("data already requested");
                return Ok(());
            }
            SessionState::Idle => {}
        }
        let bytes = ReplicaMessage::RequestData {
            protocol_version: self.config.protocol_version,
        }
        .encode()?;
        self.transport.send(&bytes, true);
        self.state = SessionState::Live;
        Ok(())
    }

    /// Sends a custom message about a replica to the server.
    pub fn fire_server(&mut self, id: ReplicaId, args: Vec<Value>, reliable: bool) -> ClientResult<()> {
        if self.state == SessionState::Terminated {
            return Err(ClientError::SessionTerminated);
        }
        self.node(id)?;
        let bytes = ReplicaMessage::Custom { id, args }.encode()?;
        self.transport.send(&bytes, reliable);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Incoming events
    // ------------------------------------------------------------------

    /// Applies one payload received from the server.
    pub fn handle_message(&mut self, payload: &[u8]) -> ClientResult<()> {
        if !self.state.accepts_events() {
            return Err(ClientError::SessionTerminated);
        }
        if payload.len() > self.config.max_message_size {
            self.stats.messages_rejected += 1;
            warn!(size = payload.len(), limit = self.config.max_message_size, "message too large");
            return Err(ClientError::MessageTooLarge {
                size: payload.len(),
                limit: self.config.max_message_size,
            });
        }
        let message = match ReplicaMessage::decode(payload) {
            Ok(message) => message,
            Err(err) => {
                self.stats.messages_rejected += 1;
                warn!(error = %err, "malformed message rejected");
                return Err(err.into());
            }
        };
        self.apply(message)
    }

    /// Applies one decoded message.
    pub fn apply(&mut self, message: ReplicaMessage) -> ClientResult<()> {
        if !self.state.accepts_events() {
            return Err(ClientError::SessionTerminated);
        }
        let kind = message.kind();
        let result = match message {
            ReplicaMessage::Create(create) => self.apply_create(create),
            ReplicaMessage::Set { id, path, value } => {
                self.replay(id, kind, |w| w.set(&path, value).map(drop))
            }
            ReplicaMessage::SetValues { id, path, values } => {
                self.replay(id, kind, |w| w.set_values(&path, &values))
            }
            ReplicaMessage::TableInsert {
                id,
                path,
                value,
                index,
            } => self.replay(id, kind, |w| {
                w.table_insert(&path, value, Some(index)).map(drop)
            }),
            ReplicaMessage::TableRemove { id, path, index } => {
                self.replay(id, kind, |w| w.table_remove(&path, index).map(drop))
            }
            ReplicaMessage::Write { id, mutator, args } => self.apply_write(id, mutator, args),
            ReplicaMessage::Reparent { id, parent } => self.apply_reparent(id, parent),
            ReplicaMessage::Destroy { id } => self.apply_destroy(id),
            ReplicaMessage::Custom { id, args } => {
                match self.replicas.get(&id) {
                    Some(node) => node.listeners.client_events.fire(&args),
                    None => warn!(replica = %id, "custom message for unknown replica dropped"),
                }
                Ok(())
            }
            ReplicaMessage::RequestData { .. } => Err(ClientError::UnexpectedMessage(
                "request_data is client-only".into(),
            )),
        };

        match result {
            Ok(()) => {
                self.stats.messages_applied += 1;
                Ok(())
            }
            Err(err) if err.is_fatal() => {
                error!(error = %err, kind, "fatal replication error; session terminated");
                self.state = SessionState::Terminated;
                Err(err)
            }
            Err(err) => {
                self.stats.messages_rejected += 1;
                Err(err)
            }
        }
    }

    fn apply_create(&mut self, create: CreateReplica) -> ClientResult<()> {
        let id = create.id;
        if self.replicas.contains_key(&id) {
            return Err(ClientError::Desync {
                id,
                reason: "replica created twice".into(),
            });
        }
        if let Some(parent) = create.parent {
            if !self.replicas.contains_key(&parent) {
                return Err(ClientError::ProtocolOrderingViolation {
                    id: parent,
                    event: "create",
                });
            }
        }
        let write_lib = match create.write_lib {
            Some(name) => Some(
                self.write_libs
                    .get(&name)
                    .cloned()
                    .ok_or(ClientError::UnknownWriteLib { name })?,
            ),
            None => None,
        };

        let token = ReplicaToken::new(&create.token);
        let (maid, maid_key) = Maid::new(id);
        let node = MirrorReplica {
            id,
            token: token.clone(),
            tags: create.tags,
            document: create.data.into(),
            parent: create.parent,
            children: BTreeSet::new(),
            write_lib,
            listeners: MirrorListeners::default(),
            maid,
            maid_key,
        };
        let announcement = self
            .class_listeners
            .get(&token)
            .filter(|signal| signal.listener_count() > 0)
            .map(|signal| {
                (
                    signal.clone(),
                    ReplicaCreated {
                        id,
                        parent: node.parent,
                        tags: node.tags.clone(),
                        data: node.data().clone(),
                    },
                )
            });

        self.replicas.insert(id, node);
        if let Some(parent) = create.parent.and_then(|p| self.replicas.get_mut(&p)) {
            parent.children.insert(id);
        }
        self.stats.replicas_created += 1;
        debug!(replica = %id, token = %token, "mirror created");

        if let Some((signal, event)) = announcement {
            signal.fire(&event);
        }
        Ok(())
    }

    /// Runs `op` against the mirror of `id`, turning failures into a desync.
    fn replay<F>(&mut self, id: ReplicaId, kind: &'static str, op: F) -> ClientResult<()>
    where
        F: FnOnce(&mut dyn ReplicaWriter) -> Result<(), ReplicaError>,
    {
        let node = self
            .replicas
            .get_mut(&id)
            .ok_or(ClientError::ProtocolOrderingViolation { id, event: kind })?;
        let mut writer = node.writer();
        op(&mut writer).map_err(|err| ClientError::Desync {
            id,
            reason: err.to_string(),
        })
    }

    fn apply_write(&mut self, id: ReplicaId, index: u16, args: Vec<Value>) -> ClientResult<()> {
        let node = self
            .replicas
            .get_mut(&id)
            .ok_or(ClientError::ProtocolOrderingViolation { id, event: "write" })?;
        let lib = node.write_lib.clone().ok_or_else(|| ClientError::Desync {
            id,
            reason: "write on a replica without a write lib".into(),
        })?;
        let mutator = lib.by_index(index).map_err(|err| ClientError::Desync {
            id,
            reason: err.to_string(),
        })?;

        {
            let mut writer = node.writer();
            mutator
                .invoke(&mut writer, &args)
                .map_err(|err| ClientError::Desync {
                    id,
                    reason: format!("replaying {} failed: {err}", mutator.name()),
                })?;
        }
        self.stats.writes_replayed += 1;

        if let Some(signal) = node.listeners.write.get(mutator.name()) {
            signal.fire(&args);
        }
        Ok(())
    }

    fn apply_reparent(&mut self, id: ReplicaId, parent: Option<ReplicaId>) -> ClientResult<()> {
        let old_parent = self
            .replicas
            .get(&id)
            .ok_or(ClientError::ProtocolOrderingViolation {
                id,
                event: "reparent",
            })?
            .parent;
        if let Some(parent) = parent {
            if !self.replicas.contains_key(&parent) {
                return Err(ClientError::ProtocolOrderingViolation {
                    id: parent,
                    event: "reparent",
                });
            }
        }

        if let Some(old) = old_parent.and_then(|p| self.replicas.get_mut(&p)) {
            old.children.remove(&id);
        }
        if let Some(new) = parent.and_then(|p| self.replicas.get_mut(&p)) {
            new.children.insert(id);
        }
        if let Some(node) = self.replicas.get_mut(&id) {
            node.parent = parent;
        }
        Ok(())
    }

    fn apply_destroy(&mut self, id: ReplicaId) -> ClientResult<()> {
        let parent = self
            .replicas
            .get(&id)
            .ok_or(ClientError::ProtocolOrderingViolation {
                id,
                event: "destroy",
            })?
            .parent;
        self.destroy_subtree(id);
        if let Some(parent) = parent.and_then(|p| self.replicas.get_mut(&p)) {
            parent.children.remove(&id);
        }
        Ok(())
    }

    fn destroy_subtree(&mut self, id: ReplicaId) {
        let Some(node) = self.replicas.remove(&id) else {
            return;
        };
        for child in &node.children {
            self.destroy_subtree(*child);
        }
        node.maid.finalize(&node.maid_key);
        node.listeners.clear();
        self.stats.replicas_destroyed += 1;
        debug!(replica = %id, "mirror destroyed");
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Listens for new replicas of class `token`.
    pub fn on_new<F>(&mut self, token: &ReplicaToken, listener: F) -> Connection
    where
        F: Fn(&ReplicaCreated) + Send + Sync + 'static,
    {
        self.class_listeners
            .entry(token.clone())
            .or_default()
            .connect(listener)
    }

    /// Listens for `set` events at exactly `path`, including keys written by
    /// `set_values`.
    pub fn on_set<F>(
        &mut self,
        id: ReplicaId,
        path: impl Into<Path>,
        listener: F,
    ) -> ClientResult<Connection>
    where
        F: Fn(&SetEvent) + Send + Sync + 'static,
    {
        let node = self.node_mut(id)?;
        Ok(node
            .listeners
            .set
            .entry(path.into())
            .or_default()
            .connect(listener))
    }

    /// Listens for every mutation of a replica.
    pub fn on_change<F>(&mut self, id: ReplicaId, listener: F) -> ClientResult<Connection>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        Ok(self.node(id)?.listeners.change.connect(listener))
    }

    /// Listens for replayed writes of the mutator `name`; receives the args.
    pub fn on_write<F>(&mut self, id: ReplicaId, name: &str, listener: F) -> ClientResult<Connection>
    where
        F: Fn(&Vec<Value>) + Send + Sync + 'static,
    {
        let node = self.node_mut(id)?;
        if let Some(lib) = &node.write_lib {
            lib.by_name(name)?;
        }
        Ok(node
            .listeners
            .write
            .entry(name.to_string())
            .or_default()
            .connect(listener))
    }

    /// Listens for custom messages the server sends about a replica.
    pub fn on_client_event<F>(&mut self, id: ReplicaId, listener: F) -> ClientResult<Connection>
    where
        F: Fn(&Vec<Value>) + Send + Sync + 'static,
    {
        Ok(self.node(id)?.listeners.client_events.connect(listener))
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Returns a mirrored replica.
    pub fn replica(&self, id: ReplicaId) -> Option<&MirrorReplica> {
        self.replicas.get(&id)
    }

    /// Returns true if the replica is mirrored.
    pub fn is_active(&self, id: ReplicaId) -> bool {
        self.replicas.contains_key(&id)
    }

    /// All mirrored replicas, in id order.
    pub fn replicas(&self) -> impl Iterator<Item = &MirrorReplica> {
        self.replicas.values()
    }

    /// First child of `id` with class `token`.
    pub fn get_child(&self, id: ReplicaId, token: &ReplicaToken) -> Option<ReplicaId> {
        self.replicas
            .get(&id)?
            .children
            .iter()
            .copied()
            .find(|child| {
                self.replicas
                    .get(child)
                    .is_some_and(|c| &c.token == token)
            })
    }

    /// Debug description of a replica, without its data.
    pub fn identify(&self, id: ReplicaId) -> ClientResult<String> {
        Ok(self.node(id)?.identify())
    }

    /// Reads a value from a mirrored replica.
    pub fn get(&self, id: ReplicaId, path: &Path) -> Option<&Value> {
        self.replicas.get(&id)?.get(path)
    }

    fn node(&self, id: ReplicaId) -> Result<&MirrorReplica, ReplicaError> {
        self.replicas
            .get(&id)
            .ok_or(ReplicaError::InactiveNode { id })
    }

    fn node_mut(&mut self, id: ReplicaId) -> Result<&mut MirrorReplica, ReplicaError> {
        self.replicas
            .get_mut(&id)
            .ok_or(ReplicaError::InactiveNode { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryClientTransport;
    use parking_lot::Mutex;
    use replica_codec::PathKey;
    use replica_core::ReplicaResult;

    fn client() -> ReplicaClient<MemoryClientTransport> {
        ReplicaClient::new(ClientConfig::default(), MemoryClientTransport::new())
    }

    fn create(id: u64, parent: Option<u64>) -> ReplicaMessage {
        ReplicaMessage::Create(CreateReplica {
            id: ReplicaId(id),
            token: "ClientTestNode".into(),
            tags: Value::empty_map(),
            data: Value::map(vec![
                (Value::from("hp"), Value::Integer(100)),
                (Value::from("items"), Value::Array(vec![])),
            ]),
            parent: parent.map(ReplicaId),
            write_lib: None,
        })
    }

    fn hp() -> Path {
        Path::from(["hp"])
    }

    #[test]
    fn request_data_sends_handshake_once() {
        let mut client = client();
        client.request_data().unwrap();
        client.request_data().unwrap();
        let sent = client.transport_mut().drain();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            ReplicaMessage::decode(&sent[0].payload).unwrap(),
            ReplicaMessage::RequestData { .. }
        ));
        assert_eq!(client.state(), SessionState::Live);
    }

    #[test]
    fn create_then_set_updates_mirror() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        client
            .apply(ReplicaMessage::Set {
                id: ReplicaId(1),
                path: hp(),
                value: Value::Integer(50),
            })
            .unwrap();
        assert_eq!(client.get(ReplicaId(1), &hp()), Some(&Value::Integer(50)));
        assert_eq!(client.stats().messages_applied, 2);
    }

    #[test]
    fn unknown_replica_terminates_session() {
        let mut client = client();
        let err = client
            .apply(ReplicaMessage::Set {
                id: ReplicaId(9),
                path: hp(),
                value: Value::Integer(1),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ProtocolOrderingViolation { event: "set", .. }
        ));
        assert_eq!(client.state(), SessionState::Terminated);
        assert_eq!(
            client.apply(create(1, None)).unwrap_err(),
            ClientError::SessionTerminated
        );
    }

    #[test]
    fn child_before_parent_is_a_violation() {
        let mut client = client();
        let err = client.apply(create(2, Some(1))).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn malformed_payload_is_not_fatal() {
        let mut client = client();
        assert!(client.handle_message(&[0xff]).is_err());
        assert_eq!(client.state(), SessionState::Idle);
        assert_eq!(client.stats().messages_rejected, 1);
        client
            .handle_message(&create(1, None).encode().unwrap())
            .unwrap();
    }

    #[test]
    fn on_set_receives_new_and_old() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client
            .on_set(ReplicaId(1), ["hp"], move |e| sink.lock().push(e.clone()))
            .unwrap();

        client
            .apply(ReplicaMessage::Set {
                id: ReplicaId(1),
                path: hp(),
                value: Value::Integer(70),
            })
            .unwrap();
        client
            .apply(ReplicaMessage::SetValues {
                id: ReplicaId(1),
                path: Path::root(),
                values: vec![(PathKey::Key("hp".into()), Value::Integer(80))],
            })
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                SetEvent {
                    new: Value::Integer(70),
                    old: Value::Integer(100)
                },
                SetEvent {
                    new: Value::Integer(80),
                    old: Value::Integer(70)
                },
            ]
        );
    }

    #[test]
    fn set_values_keys_arrive_in_canonical_order() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client
            .on_change(ReplicaId(1), move |e| sink.lock().push(e.clone()))
            .unwrap();
        let wire = ReplicaMessage::SetValues {
            id: ReplicaId(1),
            path: Path::root(),
            values: vec![
                (PathKey::from("mp"), Value::Integer(5)),
                (PathKey::from("hp"), Value::Integer(1)),
                (PathKey::from("hp"), Value::Integer(2)),
            ],
        }
        .encode()
        .unwrap();
        client.handle_message(&wire).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![ChangeEvent::SetValues {
                path: Path::root(),
                values: vec![
                    (PathKey::from("hp"), Value::Integer(2)),
                    (PathKey::from("mp"), Value::Integer(5)),
                ],
            }]
        );
        let mirror = client.replica(ReplicaId(1)).unwrap();
        assert_eq!(mirror.get(&hp()), Some(&Value::Integer(2)));
    }

    #[test]
    fn on_change_describes_table_ops() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client
            .on_change(ReplicaId(1), move |e| sink.lock().push(e.clone()))
            .unwrap();
        let items = Path::from(["items"]);
        client
            .apply(ReplicaMessage::TableInsert {
                id: ReplicaId(1),
                path: items.clone(),
                value: Value::from("sword"),
                index: 0,
            })
            .unwrap();
        client
            .apply(ReplicaMessage::TableRemove {
                id: ReplicaId(1),
                path: items.clone(),
                index: 0,
            })
            .unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                ChangeEvent::TableInsert {
                    path: items.clone(),
                    value: Value::from("sword"),
                    index: 0
                },
                ChangeEvent::TableRemove {
                    path: items,
                    index: 0,
                    removed: Value::from("sword")
                },
            ]
        );
    }

    #[test]
    fn bad_replay_is_a_desync() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        let err = client
            .apply(ReplicaMessage::TableRemove {
                id: ReplicaId(1),
                path: Path::from(["items"]),
                index: 3,
            })
            .unwrap_err();
        assert!(matches!(err, ClientError::Desync { .. }));
        assert_eq!(client.state(), SessionState::Terminated);
    }

    #[test]
    fn write_replays_registered_mutator() {
        fn heal(w: &mut dyn ReplicaWriter, args: &[Value]) -> ReplicaResult<Value> {
            let path = Path::from(["hp"]);
            let hp = w.get(&path).and_then(Value::as_integer).unwrap_or(0);
            let amount = args.first().and_then(Value::as_integer).unwrap_or(0);
            w.set(&path, Value::Integer(hp + amount))?;
            Ok(Value::Null)
        }
        let lib = Arc::new(
            WriteLib::builder("ClientTestLib")
                .mutator("Heal", heal)
                .build()
                .unwrap(),
        );
        let mut client = client();
        client.register_write_lib(Arc::clone(&lib));
        let mut message = create(1, None);
        if let ReplicaMessage::Create(ref mut c) = message {
            c.write_lib = Some("ClientTestLib".into());
        }
        client.apply(message).unwrap();

        let writes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&writes);
        client
            .on_write(ReplicaId(1), "Heal", move |args| sink.lock().push(args.clone()))
            .unwrap();
        assert!(client.on_write(ReplicaId(1), "Fly", |_| {}).is_err());

        client
            .apply(ReplicaMessage::Write {
                id: ReplicaId(1),
                mutator: lib.index_of("Heal").unwrap(),
                args: vec![Value::Integer(10)],
            })
            .unwrap();
        assert_eq!(client.get(ReplicaId(1), &hp()), Some(&Value::Integer(110)));
        assert_eq!(*writes.lock(), vec![vec![Value::Integer(10)]]);
        assert_eq!(client.stats().writes_replayed, 1);
    }

    #[test]
    fn unregistered_write_lib_is_fatal() {
        let mut client = client();
        let mut message = create(1, None);
        if let ReplicaMessage::Create(ref mut c) = message {
            c.write_lib = Some("Missing".into());
        }
        let err = client.apply(message).unwrap_err();
        assert!(matches!(err, ClientError::UnknownWriteLib { .. }));
        assert_eq!(client.state(), SessionState::Terminated);
    }

    #[test]
    fn destroy_removes_subtree_and_runs_maid() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        client.apply(create(2, Some(1))).unwrap();
        client.apply(create(3, Some(2))).unwrap();
        let released = Arc::new(Mutex::new(Vec::new()));
        for id in [1, 3] {
            let sink = Arc::clone(&released);
            client
                .replica(ReplicaId(id))
                .unwrap()
                .maid()
                .add(move || sink.lock().push(id))
                .unwrap();
        }

        client.apply(ReplicaMessage::Destroy { id: ReplicaId(1) }).unwrap();
        assert_eq!(client.replicas().count(), 0);
        assert_eq!(*released.lock(), vec![3, 1]);
        assert_eq!(client.stats().replicas_destroyed, 3);
    }

    #[test]
    fn mirror_maid_refuses_foreign_key() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        let (_, foreign) = Maid::new(ReplicaId(1));
        let maid = client.replica(ReplicaId(1)).unwrap().maid();
        assert!(!maid.finalize(&foreign));
        assert!(maid.is_active());
        maid.add(|| {}).unwrap();
    }

    #[test]
    fn reparent_moves_between_children() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        client.apply(create(2, None)).unwrap();
        client.apply(create(3, Some(1))).unwrap();
        client
            .apply(ReplicaMessage::Reparent {
                id: ReplicaId(3),
                parent: Some(ReplicaId(2)),
            })
            .unwrap();
        assert!(client.replica(ReplicaId(1)).unwrap().children().is_empty());
        assert_eq!(
            client.replica(ReplicaId(3)).unwrap().parent(),
            Some(ReplicaId(2))
        );
        let token = ReplicaToken::new("ClientTestNode");
        assert_eq!(client.get_child(ReplicaId(2), &token), Some(ReplicaId(3)));
    }

    #[test]
    fn class_listeners_see_creation() {
        let mut client = client();
        let token = ReplicaToken::new("ClientTestNode");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.on_new(&token, move |created| sink.lock().push(created.id));
        client.apply(create(4, None)).unwrap();
        assert_eq!(*seen.lock(), vec![ReplicaId(4)]);
    }

    #[test]
    fn custom_messages_reach_listeners() {
        let mut client = client();
        client.apply(create(1, None)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client
            .on_client_event(ReplicaId(1), move |args| sink.lock().push(args.clone()))
            .unwrap();
        client
            .apply(ReplicaMessage::Custom {
                id: ReplicaId(1),
                args: vec![Value::from("boom")],
            })
            .unwrap();
        client
            .apply(ReplicaMessage::Custom {
                id: ReplicaId(8),
                args: vec![],
            })
            .unwrap();
        assert_eq!(*seen.lock(), vec![vec![Value::from("boom")]]);

        client.fire_server(ReplicaId(1), vec![Value::Integer(1)], false).unwrap();
        assert!(client.fire_server(ReplicaId(8), vec![], true).is_err());
        assert_eq!(client.transport().pending(), 1);
    }
}
