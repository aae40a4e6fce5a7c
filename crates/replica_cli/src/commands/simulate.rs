//! Simulate command implementation.
//!
//! Runs a scripted session: a broadcast world holding a player that only
//! the first client subscribes to. The player is damaged, healed through its
//! write lib and given an item, then the world is destroyed.

use super::{describe, to_json, CliError, Format};
use replica_codec::Value;
use replica_server::{ClientId, ReplicaParams, ServerError};
use replica_testkit::{
    player_data, player_write_lib, TestSession, PLAYER_CLASS, WORLD_CLASS,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Messages one client received during the run.
#[derive(Debug, Serialize)]
pub struct ClientStream {
    /// Client id.
    pub client: u64,
    /// Received messages, in wire form.
    pub messages: Vec<serde_json::Value>,
}

fn step(err: ServerError) -> CliError {
    CliError::Simulation(err.to_string())
}

/// Runs the scripted session with `clients` clients.
pub fn run(clients: usize, format: Format) -> Result<(), CliError> {
    let mut session = TestSession::new();
    let lib = player_write_lib();
    session.register_write_lib(Arc::clone(&lib));
    let ids: Vec<ClientId> = (0..clients.max(1)).map(|_| session.connect()).collect();

    let world = session
        .server
        .create(ReplicaParams::new(session.server.token(WORLD_CLASS)))
        .map_err(step)?;
    session.server.replicate(world).map_err(step)?;
    let player = session
        .server
        .create(
            ReplicaParams::new(session.server.token(PLAYER_CLASS))
                .with_data(player_data("hero", 100))
                .with_write_lib(lib)
                .with_parent(world),
        )
        .map_err(step)?;
    session.pump();
    info!(world = %world, player = %player, "scene created");

    session.server.subscribe(player, ids[0]).map_err(step)?;
    session.server.set(player, ["hp"], 50).map_err(step)?;
    session
        .server
        .write(player, "Heal", vec![Value::Integer(10)])
        .map_err(step)?;
    session
        .server
        .write(player, "AddItem", vec![Value::from("sword")])
        .map_err(step)?;
    session.pump();

    session.server.destroy(world).map_err(step)?;
    let delivered = session.pump();
    info!(delivered, "scene destroyed");

    match format {
        Format::Json => {
            let streams = ids
                .iter()
                .map(|id| -> Result<ClientStream, CliError> {
                    let messages = session
                        .log(*id)
                        .iter()
                        .map(to_json)
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(ClientStream {
                        client: id.0,
                        messages,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", serde_json::to_string_pretty(&streams)?);
        }
        Format::Text => {
            for id in &ids {
                println!("client {id}:");
                for message in session.log(*id) {
                    println!("  {}", describe(message));
                }
            }
        }
    }
    Ok(())
}
