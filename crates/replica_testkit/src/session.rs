//! In-memory replication sessions.
//!
//! Wires one [`ReplicaServer`] to any number of [`ReplicaClient`]s through
//! memory transports, and records every message each client receives.

use replica_client::{ClientConfig, MemoryClientTransport, ReplicaClient};
use replica_core::{ReplicaId, WriteLib};
use replica_protocol::ReplicaMessage;
use replica_server::{ClientId, MemoryTransport, ReplicaServer, ServerConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A client mirror driven by a [`TestSession`].
pub type TestClient = ReplicaClient<MemoryClientTransport>;

/// The authoritative server of a [`TestSession`].
pub type TestServer = ReplicaServer<MemoryTransport>;

/// A server plus connected clients, exchanging messages on demand.
pub struct TestSession {
    /// The authoritative server.
    pub server: TestServer,
    clients: BTreeMap<ClientId, TestClient>,
    logs: BTreeMap<ClientId, Vec<ReplicaMessage>>,
    write_libs: Vec<Arc<WriteLib>>,
    next_client: u64,
}

impl TestSession {
    /// Creates a session with default configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Creates a session with a custom server configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            server: ReplicaServer::new(config, MemoryTransport::new()),
            clients: BTreeMap::new(),
            logs: BTreeMap::new(),
            write_libs: Vec::new(),
            next_client: 1,
        }
    }

    /// Registers a write lib on every current and future client.
    pub fn register_write_lib(&mut self, lib: Arc<WriteLib>) {
        for client in self.clients.values_mut() {
            client.register_write_lib(Arc::clone(&lib));
        }
        self.write_libs.push(lib);
    }

    /// Adds a client that has not requested data yet.
    pub fn add_client(&mut self) -> ClientId {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        let mut client = ReplicaClient::new(ClientConfig::default(), MemoryClientTransport::new());
        for lib in &self.write_libs {
            client.register_write_lib(Arc::clone(lib));
        }
        self.clients.insert(id, client);
        self.logs.insert(id, Vec::new());
        id
    }

    /// Adds a client, requests data and delivers the initial replicas.
    pub fn connect(&mut self) -> ClientId {
        let id = self.add_client();
        self.ready(id);
        id
    }

    /// Sends the data request of an added client and pumps.
    pub fn ready(&mut self, client: ClientId) {
        self.client_mut(client)
            .request_data()
            .expect("Failed to request data");
        self.pump();
    }

    /// Disconnects a client, dropping its mirror and anything still queued.
    pub fn disconnect(&mut self, client: ClientId) {
        self.server.client_disconnected(client);
        self.server.transport_mut().drain(client);
        self.clients.remove(&client);
    }

    /// Delivers queued messages in both directions until nothing is pending.
    ///
    /// Returns the number of messages delivered to clients.
    ///
    /// # Panics
    ///
    /// Panics if the server or a client rejects a message.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            let mut moved = 0;
            for (&id, client) in &mut self.clients {
                for out in client.transport_mut().drain() {
                    self.server
                        .handle_message(id, &out.payload, out.reliable)
                        .unwrap_or_else(|e| panic!("server rejected message from {id}: {e}"));
                    moved += 1;
                }
            }
            for (&id, client) in &mut self.clients {
                let log = self.logs.entry(id).or_default();
                for envelope in self.server.transport_mut().drain(id) {
                    let message = envelope.message().expect("Server sent undecodable message");
                    client
                        .handle_message(&envelope.payload)
                        .unwrap_or_else(|e| panic!("client {id} rejected {}: {e}", message.kind()));
                    log.push(message);
                    moved += 1;
                    delivered += 1;
                }
            }
            if moved == 0 {
                return delivered;
            }
        }
    }

    /// Returns a client.
    ///
    /// # Panics
    ///
    /// Panics if the client is unknown or disconnected.
    pub fn client(&self, client: ClientId) -> &TestClient {
        self.clients.get(&client).expect("Unknown client")
    }

    /// Returns a client mutably.
    ///
    /// # Panics
    ///
    /// Panics if the client is unknown or disconnected.
    pub fn client_mut(&mut self, client: ClientId) -> &mut TestClient {
        self.clients.get_mut(&client).expect("Unknown client")
    }

    /// Connected client ids.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Every message a client has received, in order.
    pub fn log(&self, client: ClientId) -> &[ReplicaMessage] {
        self.logs.get(&client).map_or(&[], Vec::as_slice)
    }

    /// Removes and returns a client's message log.
    pub fn take_log(&mut self, client: ClientId) -> Vec<ReplicaMessage> {
        self.logs
            .get_mut(&client)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Returns true if the client mirrors `replica`.
    pub fn mirrors(&self, client: ClientId, replica: ReplicaId) -> bool {
        self.client(client).is_active(replica)
    }

    /// Asserts every client mirrors exactly the replicas it receives, with
    /// the server's data, tags and parent.
    ///
    /// # Panics
    ///
    /// Panics on the first mismatch.
    pub fn assert_mirrors_match(&self) {
        for (&id, client) in &self.clients {
            for replica in self.server.replicas() {
                let receives = replica.receivers().contains(&id);
                match client.replica(replica.id()) {
                    Some(mirror) => {
                        assert!(receives, "client {id} mirrors {} without receiving it", replica.id());
                        assert_eq!(mirror.data(), replica.data(), "data of {} on client {id}", replica.id());
                        assert_eq!(mirror.tags(), replica.tags(), "tags of {} on client {id}", replica.id());
                        assert_eq!(mirror.parent(), replica.parent(), "parent of {} on client {id}", replica.id());
                    }
                    None => assert!(!receives, "client {id} is missing {}", replica.id()),
                }
            }
            for mirror in client.replicas() {
                assert!(
                    self.server.is_active(mirror.id()),
                    "client {id} still mirrors destroyed replica {}",
                    mirror.id()
                );
            }
        }
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Kinds and ids of a message log, for compact assertions.
pub fn summarize(log: &[ReplicaMessage]) -> Vec<(&'static str, Option<ReplicaId>)> {
    log.iter().map(|m| (m.kind(), m.replica_id())).collect()
}
