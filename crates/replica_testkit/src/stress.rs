//! Stress scenarios for the replication stack.
//!
//! These runs push many replicas, clients and mutations through a
//! [`TestSession`] and check that every mirror converges.

use crate::fixtures::{player_data, player_write_lib, PLAYER_CLASS, WORLD_CLASS};
use crate::session::TestSession;
use replica_codec::Value;
use replica_server::ReplicaParams;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Server operations performed.
    pub total_ops: usize,
    /// Operations the server accepted.
    pub successful_ops: usize,
    /// Operations the server rejected.
    pub failed_ops: usize,
    /// Messages delivered to clients.
    pub messages_delivered: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, delivered: usize, duration: Duration) -> Self {
        Self {
            total_ops: successful + failed,
            successful_ops: successful,
            failed_ops: failed,
            messages_delivered: delivered,
            duration,
        }
    }

    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Messages delivered: {}", self.messages_delivered);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second());
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of mutations to perform.
    pub operations: usize,
    /// Number of connected clients.
    pub clients: usize,
    /// Number of player replicas under the world root.
    pub replicas: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 2_000,
            clients: 8,
            replicas: 64,
        }
    }
}

/// Mutates broadcast players round-robin through every mutation kind.
///
/// # Panics
///
/// Panics if any mirror diverges from the server.
pub fn stress_broadcast_mutations(config: &StressConfig) -> StressTestResult {
    let mut session = TestSession::new();
    let lib = player_write_lib();
    session.register_write_lib(Arc::clone(&lib));
    for _ in 0..config.clients {
        session.connect();
    }

    let root = session
        .server
        .create(ReplicaParams::new(session.server.token(WORLD_CLASS)))
        .expect("Failed to create world");
    session.server.replicate(root).expect("Failed to replicate world");
    let token = session.server.token(PLAYER_CLASS);
    let mut players = Vec::with_capacity(config.replicas);
    for i in 0..config.replicas {
        let id = session
            .server
            .create(
                ReplicaParams::new(token.clone())
                    .with_data(player_data(&format!("p{i}"), 100))
                    .with_write_lib(Arc::clone(&lib))
                    .with_parent(root),
            )
            .expect("Failed to create player");
        session.server.replicate(id).expect("Failed to replicate player");
        players.push(id);
    }
    let mut delivered = session.pump();

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    for (i, id) in (0..config.operations).zip(players.iter().cycle()) {
        let amount = Value::Integer(i64::try_from(i % 17).unwrap_or(0));
        let result = match i % 5 {
            0 => session.server.write(*id, "Heal", vec![amount]).map(drop),
            1 => session.server.write(*id, "Damage", vec![amount]).map(drop),
            2 => session.server.set(*id, ["name"], format!("n{i}")),
            3 => session
                .server
                .table_insert(*id, ["items"], amount, Some(0))
                .map(drop),
            _ => session.server.table_remove(*id, ["items"], 0).map(drop),
        };
        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
        if i % 64 == 0 {
            delivered += session.pump();
        }
    }
    delivered += session.pump();
    let duration = start.elapsed();

    session.assert_mirrors_match();
    StressTestResult::new(successful, failed, delivered, duration)
}

/// Repeatedly builds and tears down a subtree while clients watch.
///
/// # Panics
///
/// Panics if any client keeps a destroyed replica.
pub fn stress_churn(config: &StressConfig) -> StressTestResult {
    let mut session = TestSession::new();
    for _ in 0..config.clients {
        session.connect();
    }
    let token = session.server.token(WORLD_CLASS);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut delivered = 0usize;
    for round in 0..config.operations / config.replicas.max(1) {
        let root = session
            .server
            .create(ReplicaParams::new(token.clone()))
            .expect("Failed to create root");
        session.server.replicate(root).expect("Failed to replicate root");
        let mut parent = root;
        for _ in 0..config.replicas {
            let child = session
                .server
                .create(ReplicaParams::new(token.clone()).with_parent(parent))
                .expect("Failed to create child");
            session.server.replicate(child).expect("Failed to replicate child");
            parent = if round % 2 == 0 { child } else { root };
            successful += 1;
        }
        delivered += session.pump();
        session.server.destroy(root).expect("Failed to destroy root");
        delivered += session.pump();
        session.assert_mirrors_match();
    }

    StressTestResult::new(successful, 0, delivered, start.elapsed())
}
