//! Server-side replica nodes.

use crate::subscription::ReplicationMode;
use crate::transport::ClientId;
use replica_codec::{Path, Value};
use replica_core::{Document, Maid, MaidKey, ReplicaId, ReplicaToken, Signal, WriteLib};
use std::collections::BTreeSet;
use std::sync::Arc;

/// External engine object a replica can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// A custom message received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    /// Sending client.
    pub client: ClientId,
    /// Message arguments.
    pub args: Vec<Value>,
}

/// Parameters for creating a replica.
#[derive(Debug, Clone)]
pub struct ReplicaParams {
    /// Class token.
    pub token: ReplicaToken,
    /// Immutable tags.
    pub tags: Value,
    /// Initial data.
    pub data: Value,
    /// Mutator registry for the class.
    pub write_lib: Option<Arc<WriteLib>>,
    /// Parent replica; `None` creates a top-level replica.
    pub parent: Option<ReplicaId>,
}

impl ReplicaParams {
    /// Parameters for a replica of class `token` with empty tags and data.
    pub fn new(token: ReplicaToken) -> Self {
        Self {
            token,
            tags: Value::empty_map(),
            data: Value::empty_map(),
            write_lib: None,
            parent: None,
        }
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tags: Value) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the initial data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Binds a mutator registry.
    pub fn with_write_lib(mut self, lib: Arc<WriteLib>) -> Self {
        self.write_lib = Some(lib);
        self
    }

    /// Nests the replica under `parent`.
    pub fn with_parent(mut self, parent: ReplicaId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A replica owned by the server.
pub struct ServerReplica {
    pub(crate) id: ReplicaId,
    pub(crate) token: ReplicaToken,
    pub(crate) tags: Value,
    pub(crate) document: Document,
    pub(crate) write_lib: Option<Arc<WriteLib>>,
    pub(crate) parent: Option<ReplicaId>,
    pub(crate) children: BTreeSet<ReplicaId>,
    pub(crate) mode: ReplicationMode,
    /// Clients that currently hold this replica.
    pub(crate) receivers: BTreeSet<ClientId>,
    pub(crate) bound_object: Option<ObjectId>,
    pub(crate) maid: Maid,
    pub(crate) maid_key: MaidKey,
    pub(crate) server_events: Signal<ClientEvent>,
}

impl ServerReplica {
    pub(crate) fn new(id: ReplicaId, params: ReplicaParams) -> Self {
        let (maid, maid_key) = Maid::new(id);
        Self {
            id,
            token: params.token,
            tags: params.tags,
            document: Document::new(params.data),
            write_lib: params.write_lib,
            parent: params.parent,
            children: BTreeSet::new(),
            mode: ReplicationMode::Unreplicated,
            receivers: BTreeSet::new(),
            bound_object: None,
            maid,
            maid_key,
            server_events: Signal::new(),
        }
    }

    /// Replica ID.
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    /// Class token.
    pub fn token(&self) -> &ReplicaToken {
        &self.token
    }

    /// Creation tags.
    pub fn tags(&self) -> &Value {
        &self.tags
    }

    /// Current data.
    pub fn data(&self) -> &Value {
        self.document.root()
    }

    /// Reads the value at `path`.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.document.get(path)
    }

    /// Parent replica.
    pub fn parent(&self) -> Option<ReplicaId> {
        self.parent
    }

    /// Child replicas.
    pub fn children(&self) -> &BTreeSet<ReplicaId> {
        &self.children
    }

    /// Returns true for top-level replicas.
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Replication mode.
    pub fn mode(&self) -> &ReplicationMode {
        &self.mode
    }

    /// Clients currently receiving this replica.
    pub fn receivers(&self) -> &BTreeSet<ClientId> {
        &self.receivers
    }

    /// Bound engine object.
    pub fn bound_object(&self) -> Option<ObjectId> {
        self.bound_object
    }

    /// Mutator registry.
    pub fn write_lib(&self) -> Option<&Arc<WriteLib>> {
        self.write_lib.as_ref()
    }

    /// Resource registry.
    pub fn maid(&self) -> &Maid {
        &self.maid
    }

    /// Debug description without data.
    pub fn identify(&self) -> String {
        replica_core::identify(self.id, &self.token, &self.tags)
    }
}
