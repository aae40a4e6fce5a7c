//! Resource registries tied to a replica's lifetime.
//!
//! A [`Maid`] collects resources acquired on behalf of a replica. They are
//! released in reverse registration order when the replica is destroyed, or
//! earlier through [`Maid::cleanup`] or an individual [`MaidToken`].
//!
//! Deactivation needs the [`MaidKey`] handed out with the registry, so code
//! holding only a `Maid` cannot retire a live replica's registry.

use crate::error::{ReplicaError, ReplicaResult};
use crate::signal::Connection;
use parking_lot::Mutex;
use replica_protocol::ReplicaId;
use std::fmt;
use std::sync::{Arc, Weak};

/// Something a [`Maid`] can release.
pub trait Resource: Send {
    /// Releases the resource.
    fn release(self: Box<Self>);
}

impl<F: FnOnce() + Send> Resource for F {
    fn release(self: Box<Self>) {
        (*self)()
    }
}

impl Resource for Connection {
    fn release(self: Box<Self>) {
        self.disconnect();
    }
}

struct MaidInner {
    active: bool,
    next_id: u64,
    resources: Vec<(u64, Box<dyn Resource>)>,
}

/// A replica's resource registry.
#[derive(Clone)]
pub struct Maid {
    owner: ReplicaId,
    inner: Arc<Mutex<MaidInner>>,
}

impl Maid {
    /// Creates an empty, active registry for `owner`, locked by the returned
    /// key.
    pub fn new(owner: ReplicaId) -> (Self, MaidKey) {
        let inner = Arc::new(Mutex::new(MaidInner {
            active: true,
            next_id: 0,
            resources: Vec::new(),
        }));
        let key = MaidKey {
            maid: Arc::downgrade(&inner),
        };
        (Self { owner, inner }, key)
    }

    /// Returns true until the owning replica is destroyed.
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.inner.lock().resources.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a resource.
    ///
    /// Fails with `InactiveNode` once the owning replica is destroyed.
    pub fn add<R: Resource + 'static>(&self, resource: R) -> ReplicaResult<MaidToken> {
        let mut inner = self.inner.lock();
        if !inner.active {
            return Err(ReplicaError::InactiveNode { id: self.owner });
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.resources.push((id, Box::new(resource)));
        Ok(MaidToken {
            id,
            maid: Arc::downgrade(&self.inner),
        })
    }

    /// Releases every registered resource, most recent first.
    ///
    /// The registry stays usable.
    pub fn cleanup(&self) {
        let resources = std::mem::take(&mut self.inner.lock().resources);
        release_all(resources);
    }

    /// Marks the registry inactive and releases everything.
    ///
    /// Returns false without touching the registry if `key` belongs to a
    /// different registry. Only the first accepted call releases.
    pub fn finalize(&self, key: &MaidKey) -> bool {
        if !Weak::ptr_eq(&key.maid, &Arc::downgrade(&self.inner)) {
            tracing::warn!(replica = %self.owner, "maid finalize refused: foreign key");
            return false;
        }
        let resources = {
            let mut inner = self.inner.lock();
            if !inner.active {
                return true;
            }
            inner.active = false;
            std::mem::take(&mut inner.resources)
        };
        tracing::debug!(replica = %self.owner, count = resources.len(), "releasing replica resources");
        release_all(resources);
        true
    }
}

/// Unlocks [`Maid::finalize`] for the registry it was issued with.
///
/// Held by the owner of the replica, never handed out.
pub struct MaidKey {
    maid: Weak<Mutex<MaidInner>>,
}

impl fmt::Debug for MaidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaidKey").finish_non_exhaustive()
    }
}

fn release_all(resources: Vec<(u64, Box<dyn Resource>)>) {
    for (_, resource) in resources.into_iter().rev() {
        resource.release();
    }
}

impl fmt::Debug for Maid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Maid")
            .field("owner", &self.owner)
            .field("active", &inner.active)
            .field("resources", &inner.resources.len())
            .finish()
    }
}

/// Handle to a single registered resource.
#[derive(Debug, Clone)]
pub struct MaidToken {
    id: u64,
    maid: Weak<Mutex<MaidInner>>,
}

impl MaidToken {
    /// Releases just this resource. Returns false if it was already released.
    pub fn release(&self) -> bool {
        let Some(inner) = self.maid.upgrade() else {
            return false;
        };
        let resource = {
            let mut inner = inner.lock();
            let Some(pos) = inner.resources.iter().position(|(id, _)| *id == self.id) else {
                return false;
            };
            inner.resources.remove(pos).1
        };
        resource.release();
        true
    }
}
