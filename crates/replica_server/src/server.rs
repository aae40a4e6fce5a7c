//! The replication coordinator.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::replica::{ClientEvent, ObjectId, ReplicaParams, ServerReplica};
use crate::subscription::{desired_receivers, ReceiverDiff, ReplicationMode};
use crate::transport::{ClientId, ServerTransport};
use replica_codec::{Path, PathKey, Value};
use replica_core::{
    Connection, DocumentWriter, Maid, ReplicaError, ReplicaId, ReplicaResult, ReplicaToken, Signal,
};
use replica_protocol::{CreateReplica, ReplicaMessage};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Server-authoritative owner of the replica tree.
///
/// Every mutation is applied to the replica's document first and then sent,
/// in call order, to each client currently receiving the replica. A client
/// always gets a replica's creation before any other message about it, and
/// before the creation of its children.
///
/// # Example
///
/// ```
/// use replica_server::{MemoryTransport, ReplicaParams, ReplicaServer, ServerConfig};
/// use replica_codec::Value;
///
/// let mut server = ReplicaServer::new(ServerConfig::default(), MemoryTransport::new());
/// let token = server.token("World");
/// let world = server.create(ReplicaParams::new(token)).unwrap();
/// server.replicate(world).unwrap();
/// server.set(world, ["time"], Value::Integer(12)).unwrap();
/// ```
pub struct ReplicaServer<T: ServerTransport> {
    pub(crate) config: ServerConfig,
    pub(crate) transport: T,
    pub(crate) replicas: BTreeMap<ReplicaId, ServerReplica>,
    next_id: u64,
    pub(crate) ready: BTreeSet<ClientId>,
    bound: BTreeMap<ObjectId, BTreeSet<ReplicaId>>,
    class_libs: HashMap<ReplicaToken, String>,
    new_ready_client: Signal<ClientId>,
    removing_ready_client: Signal<ClientId>,
}

impl<T: ServerTransport> ReplicaServer<T> {
    /// Creates a server with no replicas and no ready clients.
    pub fn new(config: ServerConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            replicas: BTreeMap::new(),
            next_id: 1,
            ready: BTreeSet::new(),
            bound: BTreeMap::new(),
            class_libs: HashMap::new(),
            new_ready_client: Signal::new(),
            removing_ready_client: Signal::new(),
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The outgoing transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the outgoing transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Returns the class token called `name`.
    pub fn token(&self, name: &str) -> ReplicaToken {
        ReplicaToken::new(name)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Creates a replica. New replicas start unreplicated.
    pub fn create(&mut self, params: ReplicaParams) -> ServerResult<ReplicaId> {
        if let Some(parent) = params.parent {
            self.node(parent)?;
        }
        if !params.tags.is_null() && params.tags.as_map().is_none() {
            return Err(ServerError::InvalidParams(format!(
                "tags must be a map, got {}",
                params.tags.kind()
            )));
        }
        if !params.data.is_null() && !params.data.is_container() {
            return Err(ServerError::InvalidParams(format!(
                "data must be a map or sequence, got {}",
                params.data.kind()
            )));
        }
        if let Some(lib) = &params.write_lib {
            match self.class_libs.get(&params.token) {
                Some(bound) if bound != lib.name() => {
                    return Err(ServerError::InvalidParams(format!(
                        "class {} is bound to write lib {bound}, not {}",
                        params.token,
                        lib.name()
                    )));
                }
                Some(_) => {}
                None => {
                    self.class_libs
                        .insert(params.token.clone(), lib.name().to_string());
                }
            }
        }

        let id = ReplicaId(self.next_id);
        self.next_id += 1;

        let mut params = params;
        if params.tags.is_null() {
            params.tags = Value::empty_map();
        }
        let parent = params.parent;
        let token = params.token.clone();
        self.replicas.insert(id, ServerReplica::new(id, params));
        if let Some(parent) = parent.and_then(|p| self.replicas.get_mut(&p)) {
            parent.children.insert(id);
        }

        debug!(replica = %id, token = %token, parent = ?parent, "replica created");
        Ok(id)
    }

    /// Destroys a replica and all of its descendants.
    ///
    /// Descendants are destroyed first, so every receiving client gets their
    /// destroy messages before the replica's own. Destroying an inactive
    /// replica does nothing.
    pub fn destroy(&mut self, id: ReplicaId) -> ServerResult<()> {
        if !self.replicas.contains_key(&id) {
            debug!(replica = %id, "destroy of inactive replica ignored");
            return Ok(());
        }
        self.destroy_subtree(id)
    }

    fn destroy_subtree(&mut self, id: ReplicaId) -> ServerResult<()> {
        let children: Vec<ReplicaId> = match self.replicas.get(&id) {
            Some(node) => node.children.iter().copied().collect(),
            None => return Ok(()),
        };
        for child in children {
            self.destroy_subtree(child)?;
        }

        let Some(node) = self.replicas.remove(&id) else {
            return Ok(());
        };
        if !node.receivers.is_empty() {
            let bytes = ReplicaMessage::Destroy { id }.encode()?;
            self.transport.broadcast(&node.receivers, &bytes, true);
        }
        if let Some(parent) = node.parent.and_then(|p| self.replicas.get_mut(&p)) {
            parent.children.remove(&id);
        }
        if let Some(object) = node.bound_object {
            if let Some(replicas) = self.bound.get_mut(&object) {
                replicas.remove(&id);
                if replicas.is_empty() {
                    self.bound.remove(&object);
                }
            }
        }
        node.server_events.clear();
        node.maid.finalize(&node.maid_key);

        debug!(replica = %id, clients = node.receivers.len(), "replica destroyed");
        Ok(())
    }

    /// Moves a nested replica under a new parent.
    ///
    /// Clients that keep receiving the replica get a reparent message; clients
    /// that gain or lose it through the move get a creation or destroy.
    pub fn set_parent(&mut self, id: ReplicaId, parent: ReplicaId) -> ServerResult<()> {
        let old_parent = self.node(id)?.parent.ok_or_else(|| ReplicaError::InvalidParent {
            id,
            parent,
            reason: "top-level replicas cannot be reparented".into(),
        })?;
        self.node(parent)?;
        if parent == id || self.is_descendant(parent, id) {
            return Err(ReplicaError::InvalidParent {
                id,
                parent,
                reason: "a replica cannot be nested under itself or its descendants".into(),
            }
            .into());
        }
        if old_parent == parent {
            return Ok(());
        }

        if let Some(old) = self.replicas.get_mut(&old_parent) {
            old.children.remove(&id);
        }
        if let Some(new) = self.replicas.get_mut(&parent) {
            new.children.insert(id);
        }
        let staying = {
            let node = self.node_mut(id)?;
            node.parent = Some(parent);
            let before = node.receivers.clone();
            let desired = self.desired_for(id);
            before
                .intersection(&desired)
                .copied()
                .collect::<BTreeSet<_>>()
        };

        if !staying.is_empty() {
            let bytes = ReplicaMessage::Reparent {
                id,
                parent: Some(parent),
            }
            .encode()?;
            self.transport.broadcast(&staying, &bytes, true);
        }
        debug!(replica = %id, from = %old_parent, to = %parent, "replica reparented");
        self.reconcile(id)
    }

    fn is_descendant(&self, candidate: ReplicaId, ancestor: ReplicaId) -> bool {
        let mut current = candidate;
        while let Some(parent) = self.replicas.get(&current).and_then(|n| n.parent) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Binds a replica to an external object; the replica is destroyed when
    /// the object is removed.
    pub fn bind_to_object(&mut self, id: ReplicaId, object: ObjectId) -> ServerResult<()> {
        let node = self.node_mut(id)?;
        if node.bound_object.is_some() {
            return Err(ReplicaError::AlreadyBound { id }.into());
        }
        node.bound_object = Some(object);
        self.bound.entry(object).or_default().insert(id);
        Ok(())
    }

    /// Reports that an external object is gone, destroying bound replicas.
    pub fn object_removed(&mut self, object: ObjectId) -> ServerResult<()> {
        let Some(replicas) = self.bound.remove(&object) else {
            return Ok(());
        };
        for id in replicas {
            self.destroy(id)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Replaces the value at `path`.
    pub fn set(
        &mut self,
        id: ReplicaId,
        path: impl Into<Path>,
        value: impl Into<Value>,
    ) -> ServerResult<()> {
        let path = path.into();
        let value = value.into();
        self.node_mut(id)?.document.set(&path, value.clone())?;
        self.emit(id, &ReplicaMessage::Set { id, path, value }, true)
    }

    /// Sets several keys below `path` in one event.
    pub fn set_values(
        &mut self,
        id: ReplicaId,
        path: impl Into<Path>,
        values: Vec<(PathKey, Value)>,
    ) -> ServerResult<()> {
        let path = path.into();
        self.node_mut(id)?.document.set_values(&path, &values)?;
        self.emit(id, &ReplicaMessage::SetValues { id, path, values }, true)
    }

    /// Inserts into the sequence at `path`; `None` appends. Returns the index.
    pub fn table_insert(
        &mut self,
        id: ReplicaId,
        path: impl Into<Path>,
        value: impl Into<Value>,
        index: Option<usize>,
    ) -> ServerResult<usize> {
        let path = path.into();
        let value = value.into();
        let index = self
            .node_mut(id)?
            .document
            .table_insert(&path, value.clone(), index)?;
        self.emit(
            id,
            &ReplicaMessage::TableInsert {
                id,
                path,
                value,
                index,
            },
            true,
        )?;
        Ok(index)
    }

    /// Removes and returns an element of the sequence at `path`.
    pub fn table_remove(
        &mut self,
        id: ReplicaId,
        path: impl Into<Path>,
        index: usize,
    ) -> ServerResult<Value> {
        let path = path.into();
        let removed = self.node_mut(id)?.document.table_remove(&path, index)?;
        self.emit(id, &ReplicaMessage::TableRemove { id, path, index }, true)?;
        Ok(removed)
    }

    /// Runs the mutator `name` from the replica's write lib.
    ///
    /// Clients receive a single write message and run the same mutator
    /// themselves. If the mutator fails, the document is restored and nothing
    /// is sent.
    pub fn write(&mut self, id: ReplicaId, name: &str, args: Vec<Value>) -> ServerResult<Value> {
        let node = self.node_mut(id)?;
        let lib = node
            .write_lib
            .clone()
            .ok_or_else(|| ReplicaError::UnknownMutator {
                name: name.to_string(),
            })?;
        let mutator = lib.by_name(name)?;

        let snapshot = node.document.clone();
        let result = {
            let mut writer = DocumentWriter::new(id, &node.tags, &mut node.document);
            mutator.invoke(&mut writer, &args)
        };
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                node.document = snapshot;
                warn!(replica = %id, mutator = name, error = %err, "write rolled back");
                return Err(err.into());
            }
        };

        let message = ReplicaMessage::Write {
            id,
            mutator: mutator.index(),
            args,
        };
        self.emit(id, &message, true)?;
        Ok(output)
    }

    // ------------------------------------------------------------------
    // Subscription
    // ------------------------------------------------------------------

    /// Replicates to every ready client, now and in the future.
    ///
    /// Explicit subscriptions are discarded.
    pub fn replicate(&mut self, id: ReplicaId) -> ServerResult<()> {
        let node = self.node_mut(id)?;
        if node.mode == ReplicationMode::Broadcast {
            return Ok(());
        }
        if let ReplicationMode::Selective(clients) = &node.mode {
            debug!(replica = %id, discarded = clients.len(), "switching to broadcast");
        }
        node.mode = ReplicationMode::Broadcast;
        self.reconcile(id)
    }

    /// Stops replicating; every current receiver gets a destroy.
    pub fn dont_replicate(&mut self, id: ReplicaId) -> ServerResult<()> {
        self.node_mut(id)?.mode = ReplicationMode::Unreplicated;
        self.reconcile(id)
    }

    /// Subscribes a ready client.
    ///
    /// Subscribing a client that is not ready, or a replica in broadcast
    /// mode, logs a warning and does nothing.
    pub fn subscribe(&mut self, id: ReplicaId, client: ClientId) -> ServerResult<()> {
        let ready = self.ready.contains(&client);
        let node = self.node_mut(id)?;
        if !ready {
            warn!(replica = %id, client = %client, "cannot subscribe a client that is not ready");
            return Ok(());
        }
        match node.mode {
            ReplicationMode::Broadcast => {
                warn!(replica = %id, client = %client, "replica is broadcast; subscribe ignored");
                return Ok(());
            }
            ReplicationMode::Selective(ref mut clients) => {
                clients.insert(client);
            }
            ReplicationMode::Unreplicated => {
                node.mode = ReplicationMode::Selective(BTreeSet::from([client]));
            }
        }
        self.reconcile(id)
    }

    /// Removes an explicit subscription.
    pub fn unsubscribe(&mut self, id: ReplicaId, client: ClientId) -> ServerResult<()> {
        let node = self.node_mut(id)?;
        match node.mode {
            ReplicationMode::Broadcast => {
                warn!(replica = %id, client = %client, "replica is broadcast; unsubscribe ignored");
                return Ok(());
            }
            ReplicationMode::Selective(ref mut clients) => {
                clients.remove(&client);
            }
            ReplicationMode::Unreplicated => return Ok(()),
        }
        self.reconcile(id)
    }

    // ------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------

    /// Adds a client to the ready set and sends it every replica it now
    /// receives, parents before children.
    pub fn client_ready(&mut self, client: ClientId) -> ServerResult<()> {
        if !self.ready.insert(client) {
            warn!(client = %client, "client is already ready");
            return Ok(());
        }
        info!(client = %client, "client ready");

        let top_level: Vec<ReplicaId> = self
            .replicas
            .values()
            .filter(|n| n.is_top_level())
            .map(|n| n.id)
            .collect();
        for id in top_level {
            self.reconcile(id)?;
        }
        self.new_ready_client.fire(&client);
        Ok(())
    }

    /// Removes a client from the ready set and from every subscription.
    pub fn client_disconnected(&mut self, client: ClientId) {
        if !self.ready.contains(&client) {
            return;
        }
        self.removing_ready_client.fire(&client);
        self.ready.remove(&client);
        for node in self.replicas.values_mut() {
            node.receivers.remove(&client);
            if let ReplicationMode::Selective(ref mut clients) = node.mode {
                clients.remove(&client);
            }
        }
        info!(client = %client, "client removed");
    }

    /// Clients that completed the handshake.
    pub fn ready_clients(&self) -> &BTreeSet<ClientId> {
        &self.ready
    }

    /// Listens for clients becoming ready.
    pub fn on_new_ready_client<F>(&self, listener: F) -> Connection
    where
        F: Fn(&ClientId) + Send + Sync + 'static,
    {
        self.new_ready_client.connect(listener)
    }

    /// Listens for ready clients about to be removed.
    pub fn on_removing_ready_client<F>(&self, listener: F) -> Connection
    where
        F: Fn(&ClientId) + Send + Sync + 'static,
    {
        self.removing_ready_client.connect(listener)
    }

    // ------------------------------------------------------------------
    // Custom messages
    // ------------------------------------------------------------------

    /// Sends a custom message to one receiving client.
    pub fn fire_client(
        &mut self,
        id: ReplicaId,
        client: ClientId,
        args: Vec<Value>,
        reliable: bool,
    ) -> ServerResult<()> {
        if !self.node(id)?.receivers.contains(&client) {
            warn!(replica = %id, client = %client, "client does not receive replica; message dropped");
            return Ok(());
        }
        let bytes = ReplicaMessage::Custom { id, args }.encode()?;
        self.transport.send(client, &bytes, reliable);
        Ok(())
    }

    /// Sends a custom message to every receiving client.
    pub fn fire_all_clients(
        &mut self,
        id: ReplicaId,
        args: Vec<Value>,
        reliable: bool,
    ) -> ServerResult<()> {
        self.node(id)?;
        self.emit(id, &ReplicaMessage::Custom { id, args }, reliable)
    }

    /// Listens for custom messages sent by clients about a replica.
    pub fn on_server_event<F>(&self, id: ReplicaId, listener: F) -> ServerResult<Connection>
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        Ok(self.node(id)?.server_events.connect(listener))
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Returns an active replica.
    pub fn replica(&self, id: ReplicaId) -> Option<&ServerReplica> {
        self.replicas.get(&id)
    }

    /// Returns true if the replica exists and is not destroyed.
    pub fn is_active(&self, id: ReplicaId) -> bool {
        self.replicas.contains_key(&id)
    }

    /// All active replicas, in creation order.
    pub fn replicas(&self) -> impl Iterator<Item = &ServerReplica> {
        self.replicas.values()
    }

    /// Debug description of a replica, without its data.
    pub fn identify(&self, id: ReplicaId) -> ServerResult<String> {
        Ok(self.node(id)?.identify())
    }

    /// The replica's resource registry.
    pub fn maid(&self, id: ReplicaId) -> ServerResult<&Maid> {
        Ok(&self.node(id)?.maid)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn node(&self, id: ReplicaId) -> ReplicaResult<&ServerReplica> {
        self.replicas
            .get(&id)
            .ok_or(ReplicaError::InactiveNode { id })
    }

    fn node_mut(&mut self, id: ReplicaId) -> ReplicaResult<&mut ServerReplica> {
        self.replicas
            .get_mut(&id)
            .ok_or(ReplicaError::InactiveNode { id })
    }

    /// Sends `message` to every client receiving `id`.
    fn emit(&mut self, id: ReplicaId, message: &ReplicaMessage, reliable: bool) -> ServerResult<()> {
        let Some(node) = self.replicas.get(&id) else {
            return Ok(());
        };
        if node.receivers.is_empty() {
            return Ok(());
        }
        let bytes = message.encode()?;
        debug!(
            replica = %id,
            kind = message.kind(),
            clients = node.receivers.len(),
            "emitting"
        );
        self.transport.broadcast(&node.receivers, &bytes, reliable);
        Ok(())
    }

    fn desired_for(&self, id: ReplicaId) -> BTreeSet<ClientId> {
        let Some(node) = self.replicas.get(&id) else {
            return BTreeSet::new();
        };
        match node.parent {
            Some(parent) => {
                let empty = BTreeSet::new();
                let parent_receivers = self
                    .replicas
                    .get(&parent)
                    .map_or(&empty, |p| &p.receivers);
                desired_receivers(&node.mode, &self.ready, Some(parent_receivers))
            }
            None => desired_receivers(&node.mode, &self.ready, None),
        }
    }

    fn create_message(&self, id: ReplicaId) -> ReplicaResult<ReplicaMessage> {
        let node = self.node(id)?;
        Ok(ReplicaMessage::Create(CreateReplica {
            id,
            token: node.token.name().to_string(),
            tags: node.tags.clone(),
            data: node.document.root().clone(),
            parent: node.parent,
            write_lib: node.write_lib.as_ref().map(|lib| lib.name().to_string()),
        }))
    }

    /// Brings the receiver set of `id` and its subtree up to date.
    ///
    /// Gained clients get the creation of `id` before any child creation;
    /// lost clients get child destroys before the destroy of `id`.
    fn reconcile(&mut self, id: ReplicaId) -> ServerResult<()> {
        let desired = self.desired_for(id);
        let Some(node) = self.replicas.get_mut(&id) else {
            return Ok(());
        };
        let diff = ReceiverDiff::between(&node.receivers, &desired);
        if diff.is_empty() {
            return Ok(());
        }
        node.receivers = desired;
        let children: Vec<ReplicaId> = node.children.iter().copied().collect();

        if !diff.gained.is_empty() {
            let bytes = self.create_message(id)?.encode()?;
            self.transport.broadcast(&diff.gained, &bytes, true);
            debug!(replica = %id, clients = ?diff.gained, "replica created on clients");
        }
        for child in children {
            self.reconcile(child)?;
        }
        if !diff.lost.is_empty() {
            let bytes = ReplicaMessage::Destroy { id }.encode()?;
            self.transport.broadcast(&diff.lost, &bytes, true);
            debug!(replica = %id, clients = ?diff.lost, "replica removed from clients");
        }
        Ok(())
    }
}
