//! In-process publish/subscribe.
//!
//! [`Signal::fire`] snapshots the listener list before delivering, so
//! listeners may connect or disconnect from inside a callback. A listener
//! disconnected during a fire is skipped if it has not been reached yet.
//! A panicking listener is logged and does not stop delivery to the rest.

use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Slot<A> {
    id: u64,
    connected: Arc<AtomicBool>,
    listener: Listener<A>,
}

impl<A> Clone for Slot<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            connected: Arc::clone(&self.connected),
            listener: Arc::clone(&self.listener),
        }
    }
}

struct SignalInner<A> {
    next_id: u64,
    slots: Vec<Slot<A>>,
}

/// A list of listeners receiving `&A`.
pub struct Signal<A> {
    inner: Arc<Mutex<SignalInner<A>>>,
}

impl<A: 'static> Signal<A> {
    /// Creates a signal with no listeners.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }

    /// Adds a listener. Delivery follows connection order.
    pub fn connect<F>(&self, listener: F) -> Connection
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let connected = Arc::new(AtomicBool::new(true));
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.slots.push(Slot {
                id,
                connected: Arc::clone(&connected),
                listener: Arc::new(listener),
            });
            id
        };

        let weak: Weak<Mutex<SignalInner<A>>> = Arc::downgrade(&self.inner);
        Connection::new(
            connected,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().slots.retain(|slot| slot.id != id);
                }
            }),
        )
    }

    /// Number of connected listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Delivers `args` to every connected listener.
    pub fn fire(&self, args: &A) {
        self.fire_until(args, || true);
    }

    /// Delivers `args` while `keep_going` returns true.
    ///
    /// `keep_going` is checked before each listener.
    pub fn fire_until<P>(&self, args: &A, mut keep_going: P)
    where
        P: FnMut() -> bool,
    {
        let snapshot: Vec<Slot<A>> = self.inner.lock().slots.clone();
        for slot in snapshot {
            if !keep_going() {
                break;
            }
            if !slot.connected.load(Ordering::Acquire) {
                continue;
            }
            let listener = &slot.listener;
            if catch_unwind(AssertUnwindSafe(|| listener(args))).is_err() {
                tracing::error!(listener = slot.id, "signal listener panicked");
            }
        }
    }

    /// Disconnects every listener.
    pub fn clear(&self) {
        let slots = std::mem::take(&mut self.inner.lock().slots);
        for slot in slots {
            slot.connected.store(false, Ordering::Release);
        }
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.inner.lock().slots.len())
            .finish()
    }
}

/// Handle to a connected listener.
///
/// Dropping the handle does not disconnect; call [`Connection::disconnect`]
/// or hand the connection to a [`Maid`](crate::Maid).
#[derive(Clone)]
pub struct Connection {
    connected: Arc<AtomicBool>,
    detach: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Connection {
    fn new(connected: Arc<AtomicBool>, detach: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            connected,
            detach: Arc::new(Mutex::new(Some(detach))),
        }
    }

    /// Stops delivery to the listener. Safe to call more than once.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        let detach = self.detach.lock().take();
        if let Some(detach) = detach {
            detach();
        }
    }

    /// Returns true until the listener is disconnected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}
