//! Replication modes and reception rules.
//!
//! A client receives a replica when the replica's own mode includes the
//! client and, for nested replicas, the client also receives the parent.
//! The server keeps each replica's receiver set materialised and diffs it
//! whenever a mode, the ready set or the tree shape changes.

use crate::transport::ClientId;
use std::collections::BTreeSet;

/// Who a replica is replicated to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplicationMode {
    /// Not replicated.
    #[default]
    Unreplicated,
    /// Every ready client, now and in the future.
    Broadcast,
    /// Explicitly subscribed clients only.
    Selective(BTreeSet<ClientId>),
}

impl ReplicationMode {
    /// Clients this mode admits, given the ready set.
    pub fn admitted(&self, ready: &BTreeSet<ClientId>) -> BTreeSet<ClientId> {
        match self {
            ReplicationMode::Unreplicated => BTreeSet::new(),
            ReplicationMode::Broadcast => ready.clone(),
            ReplicationMode::Selective(clients) => clients.intersection(ready).copied().collect(),
        }
    }

    /// Returns true if `client` is explicitly subscribed.
    pub fn is_subscribed(&self, client: ClientId) -> bool {
        matches!(self, ReplicationMode::Selective(clients) if clients.contains(&client))
    }
}

/// Clients that should receive a replica.
///
/// `parent_receivers` is `None` for top-level replicas.
pub(crate) fn desired_receivers(
    mode: &ReplicationMode,
    ready: &BTreeSet<ClientId>,
    parent_receivers: Option<&BTreeSet<ClientId>>,
) -> BTreeSet<ClientId> {
    let admitted = mode.admitted(ready);
    match parent_receivers {
        Some(parent) => admitted.intersection(parent).copied().collect(),
        None => admitted,
    }
}

/// Difference between the current and desired receiver sets.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ReceiverDiff {
    pub gained: BTreeSet<ClientId>,
    pub lost: BTreeSet<ClientId>,
}

impl ReceiverDiff {
    pub(crate) fn between(current: &BTreeSet<ClientId>, desired: &BTreeSet<ClientId>) -> Self {
        Self {
            gained: desired.difference(current).copied().collect(),
            lost: current.difference(desired).copied().collect(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.gained.is_empty() && self.lost.is_empty()
    }
}
