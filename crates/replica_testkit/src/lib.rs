//! # Replica Testkit
//!
//! Test utilities for hierarchical replica replication.
//!
//! This crate provides:
//! - An in-memory session wiring one server to many clients
//! - Fixtures: sample player data, a player write lib, ready-made trees
//! - Property-based test generators using proptest
//! - Fuzz testing harnesses
//! - Stress scenarios
//! - Wire-format test vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use replica_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_session() {
//!     let mut session = TestSession::new();
//!     let client = session.connect();
//!     let world = broadcast_world(&mut session, &["ana"]);
//!     assert!(session.mirrors(client, world.root));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod session;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::session::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use session::*;
pub use stress::*;
pub use vectors::*;
