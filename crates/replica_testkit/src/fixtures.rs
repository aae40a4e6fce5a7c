//! Test fixtures and replica helpers.
//!
//! Provides sample data, a player write lib and ready-made replica trees
//! for common test scenarios.

use crate::session::TestSession;
use replica_codec::{Path, Value};
use replica_core::{ReplicaError, ReplicaId, ReplicaResult, ReplicaWriter, WriteLib};
use replica_server::{ClientId, ReplicaParams};
use std::sync::Arc;

/// Class name of player replicas.
pub const PLAYER_CLASS: &str = "Player";

/// Class name of the world root replica.
pub const WORLD_CLASS: &str = "World";

/// Name of the player write lib.
pub const PLAYER_LIB: &str = "PlayerWriteLib";

/// Player data: `{hp, name, items: []}`.
pub fn player_data(name: &str, hp: i64) -> Value {
    Value::map(vec![
        (Value::from("hp"), Value::Integer(hp)),
        (Value::from("name"), Value::from(name)),
        (Value::from("items"), Value::Array(Vec::new())),
    ])
}

/// Tags marking the owning client of a replica.
pub fn owner_tags(client: ClientId) -> Value {
    Value::map(vec![(
        Value::from("owner"),
        Value::Integer(i64::try_from(client.0).unwrap_or(i64::MAX)),
    )])
}

fn amount(args: &[Value]) -> ReplicaResult<i64> {
    args.first()
        .and_then(Value::as_integer)
        .ok_or_else(|| ReplicaError::mutator("amount", "expected an integer amount"))
}

fn hp(writer: &dyn ReplicaWriter) -> i64 {
    writer
        .get(&Path::from(["hp"]))
        .and_then(Value::as_integer)
        .unwrap_or(0)
}

/// Adds `args[0]` to `hp`; returns the new value.
pub fn heal(writer: &mut dyn ReplicaWriter, args: &[Value]) -> ReplicaResult<Value> {
    let hp = hp(writer) + amount(args)?;
    writer.set(&Path::from(["hp"]), Value::Integer(hp))?;
    Ok(Value::Integer(hp))
}

/// Subtracts `args[0]` from `hp`, never below zero; returns the new value.
pub fn damage(writer: &mut dyn ReplicaWriter, args: &[Value]) -> ReplicaResult<Value> {
    let hp = (hp(writer) - amount(args)?).max(0);
    writer.set(&Path::from(["hp"]), Value::Integer(hp))?;
    Ok(Value::Integer(hp))
}

/// Appends `args[0]` to `items` and returns its index.
pub fn add_item(writer: &mut dyn ReplicaWriter, args: &[Value]) -> ReplicaResult<Value> {
    let item = args
        .first()
        .cloned()
        .ok_or_else(|| ReplicaError::mutator("AddItem", "missing item"))?;
    let index = writer.table_insert(&Path::from(["items"]), item, None)?;
    Ok(Value::Integer(i64::try_from(index).unwrap_or(i64::MAX)))
}

/// Registry with `AddItem`, `Damage` and `Heal`.
///
/// # Panics
///
/// Never in practice; the names are distinct.
pub fn player_write_lib() -> Arc<WriteLib> {
    Arc::new(
        WriteLib::builder(PLAYER_LIB)
            .mutator("Heal", heal)
            .mutator("Damage", damage)
            .mutator("AddItem", add_item)
            .build()
            .expect("Failed to build player write lib"),
    )
}

/// A world root with one player child per entry of `names`.
#[derive(Debug, Clone)]
pub struct World {
    /// Broadcast root replica.
    pub root: ReplicaId,
    /// Player replicas, in `names` order.
    pub players: Vec<ReplicaId>,
}

/// Builds a broadcast world whose players are also broadcast.
///
/// Players carry [`player_write_lib`], so clients must have it registered
/// (see [`TestSession::register_write_lib`]) before the world is created.
pub fn broadcast_world(session: &mut TestSession, names: &[&str]) -> World {
    let world_token = session.server.token(WORLD_CLASS);
    let player_token = session.server.token(PLAYER_CLASS);
    let lib = player_write_lib();

    let root = session
        .server
        .create(ReplicaParams::new(world_token))
        .expect("Failed to create world");
    let players = names
        .iter()
        .map(|name| {
            session
                .server
                .create(
                    ReplicaParams::new(player_token.clone())
                        .with_data(player_data(name, 100))
                        .with_write_lib(Arc::clone(&lib))
                        .with_parent(root),
                )
                .expect("Failed to create player")
        })
        .collect::<Vec<_>>();

    session.server.replicate(root).expect("Failed to replicate world");
    for player in &players {
        session
            .server
            .replicate(*player)
            .expect("Failed to replicate player");
    }
    session.pump();
    World { root, players }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_core::Document;

    #[test]
    fn player_lib_is_sorted() {
        let lib = player_write_lib();
        assert_eq!(
            lib.names().collect::<Vec<_>>(),
            vec!["AddItem", "Damage", "Heal"]
        );
    }

    #[test]
    fn mutators_apply_to_documents() {
        let lib = player_write_lib();
        let mut document = Document::new(player_data("ana", 30));
        let tags = Value::empty_map();
        let mut writer = replica_core::DocumentWriter::new(ReplicaId(1), &tags, &mut document);

        let heal = lib.by_name("Heal").unwrap();
        assert_eq!(
            heal.invoke(&mut writer, &[Value::Integer(5)]).unwrap(),
            Value::Integer(35)
        );
        let damage = lib.by_name("Damage").unwrap();
        assert_eq!(
            damage.invoke(&mut writer, &[Value::Integer(99)]).unwrap(),
            Value::Integer(0)
        );
        let add = lib.by_name("AddItem").unwrap();
        assert_eq!(
            add.invoke(&mut writer, &[Value::from("rope")]).unwrap(),
            Value::Integer(0)
        );
        assert!(heal.invoke(&mut writer, &[]).is_err());
    }

    #[test]
    fn broadcast_world_reaches_clients() {
        let mut session = TestSession::new();
        session.register_write_lib(player_write_lib());
        let client = session.connect();
        let world = broadcast_world(&mut session, &["ana", "bo"]);
        assert!(session.mirrors(client, world.root));
        for player in &world.players {
            assert!(session.mirrors(client, *player));
        }
        session.assert_mirrors_match();
    }
}
