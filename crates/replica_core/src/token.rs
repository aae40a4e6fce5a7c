//! Interned replica class tokens.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

fn registry() -> &'static Mutex<HashMap<String, Arc<str>>> {
    static TOKENS: OnceLock<Mutex<HashMap<String, Arc<str>>>> = OnceLock::new();
    TOKENS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Process-global handle naming a replica class.
///
/// Tokens are interned: creating a token twice with the same name yields the
/// same handle.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaToken(Arc<str>);

impl ReplicaToken {
    /// Returns the token called `name`, creating it on first use.
    pub fn new(name: &str) -> Self {
        let mut tokens = registry().lock();
        if let Some(existing) = tokens.get(name) {
            return Self(Arc::clone(existing));
        }
        let interned: Arc<str> = Arc::from(name);
        tokens.insert(name.to_string(), Arc::clone(&interned));
        tracing::debug!(token = name, "registered replica token");
        Self(interned)
    }

    /// Returns the token called `name` if it was created before.
    pub fn existing(name: &str) -> Option<Self> {
        registry().lock().get(name).map(|t| Self(Arc::clone(t)))
    }

    /// Token name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns true if both handles point at the same interned name.
    pub fn same_handle(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ReplicaToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicaToken({})", self.0)
    }
}

impl fmt::Display for ReplicaToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
