//! End-to-end replication scenarios between a server and several clients.

use parking_lot::Mutex;
use replica_codec::{Path, Value};
use replica_core::ReplicaId;
use replica_protocol::ReplicaMessage;
use replica_server::{ClientId, ObjectId, ReplicaParams, ReplicationMode};
use replica_testkit::prelude::*;
use std::sync::Arc;

fn node(session: &mut TestSession, parent: Option<ReplicaId>) -> ReplicaId {
    let token = session.server.token("ScenarioNode");
    let mut params = ReplicaParams::new(token).with_data(player_data("n", 100));
    if let Some(parent) = parent {
        params = params.with_parent(parent);
    }
    session.server.create(params).unwrap()
}

fn destroys(log: &[ReplicaMessage]) -> Vec<ReplicaId> {
    log.iter()
        .filter_map(|m| match m {
            ReplicaMessage::Destroy { id } => Some(*id),
            _ => None,
        })
        .collect()
}

#[test]
fn broadcast_parent_with_selective_child() {
    let mut session = TestSession::new();
    let a = node(&mut session, None);
    let b = node(&mut session, Some(a));
    session.server.replicate(a).unwrap();

    let x = session.connect();
    assert_eq!(summarize(&session.take_log(x)), vec![("create", Some(a))]);

    session.server.subscribe(b, x).unwrap();
    session.pump();
    match session.take_log(x).as_slice() {
        [ReplicaMessage::Create(create)] => {
            assert_eq!(create.id, b);
            assert_eq!(create.parent, Some(a));
        }
        other => panic!("expected create of B, got {other:?}"),
    }

    session.server.set(b, ["hp"], 50).unwrap();
    session.pump();
    assert_eq!(
        session.take_log(x),
        vec![ReplicaMessage::Set {
            id: b,
            path: Path::from(["hp"]),
            value: Value::Integer(50),
        }]
    );
    assert_eq!(
        session.client(x).get(b, &Path::from(["hp"])),
        Some(&Value::Integer(50))
    );

    session.server.destroy(a).unwrap();
    session.pump();
    assert_eq!(destroys(&session.take_log(x)), vec![b, a]);
    assert_eq!(session.client(x).replicas().count(), 0);
}

#[test]
fn destroying_a_subtree_sends_one_destroy_per_node() {
    let mut session = TestSession::new();
    let x = session.connect();
    let root = node(&mut session, None);
    let left = node(&mut session, Some(root));
    let right = node(&mut session, Some(root));
    let leaf = node(&mut session, Some(left));
    for id in [root, left, right, leaf] {
        session.server.replicate(id).unwrap();
    }
    session.pump();
    session.take_log(x);

    session.server.destroy(root).unwrap();
    session.pump();
    let order = destroys(session.log(x));
    assert_eq!(order.len(), 4);
    let position = |id| order.iter().position(|d| *d == id).unwrap();
    assert!(position(leaf) < position(left));
    assert!(position(left) < position(root));
    assert!(position(right) < position(root));
    assert_eq!(*order.last().unwrap(), root);
    session.assert_mirrors_match();
}

#[test]
fn unready_subscribers_never_receive() {
    let mut session = TestSession::new();
    let lurker = session.add_client();
    let b = node(&mut session, None);

    session.server.subscribe(b, lurker).unwrap();
    assert_eq!(session.server.replica(b).unwrap().mode(), &ReplicationMode::Unreplicated);
    session.ready(lurker);
    session.server.set(b, ["hp"], 1).unwrap();
    session.pump();

    assert!(session.log(lurker).is_empty());
    assert!(!session.mirrors(lurker, b));
}

#[test]
fn subscribing_a_ready_client_creates_immediately() {
    let mut session = TestSession::new();
    let x = session.connect();
    let y = session.connect();
    let b = node(&mut session, None);

    session.server.subscribe(b, x).unwrap();
    session.pump();
    assert!(session.mirrors(x, b));
    assert!(!session.mirrors(y, b));

    session.server.unsubscribe(b, x).unwrap();
    session.pump();
    assert!(!session.mirrors(x, b));
    assert_eq!(destroys(session.log(x)), vec![b]);
}

#[test]
fn nested_selective_child_waits_for_parent() {
    let mut session = TestSession::new();
    let x = session.connect();
    let a = node(&mut session, None);
    let b = node(&mut session, Some(a));

    session.server.subscribe(b, x).unwrap();
    session.pump();
    assert!(session.log(x).is_empty());

    session.server.subscribe(a, x).unwrap();
    session.pump();
    assert_eq!(
        summarize(session.log(x)),
        vec![("create", Some(a)), ("create", Some(b))]
    );
    session.assert_mirrors_match();
}

#[test]
fn writes_replay_as_single_event() {
    let mut session = TestSession::new();
    session.register_write_lib(player_write_lib());
    let x = session.connect();
    let world = broadcast_world(&mut session, &["ana"]);
    let player = world.players[0];
    session.take_log(x);

    let healed = session
        .server
        .write(player, "Heal", vec![Value::Integer(10)])
        .unwrap();
    session.pump();

    let log = session.take_log(x);
    assert_eq!(summarize(&log), vec![("write", Some(player))]);
    assert!(log.iter().all(|m| !matches!(m, ReplicaMessage::Set { .. })));
    assert_eq!(healed, Value::Integer(110));
    assert_eq!(
        session.client(x).get(player, &Path::from(["hp"])),
        Some(&Value::Integer(110))
    );
    assert_eq!(session.client(x).stats().writes_replayed, 1);
}

#[test]
fn failed_write_sends_nothing() {
    let mut session = TestSession::new();
    session.register_write_lib(player_write_lib());
    let x = session.connect();
    let world = broadcast_world(&mut session, &["ana"]);
    session.take_log(x);

    assert!(session
        .server
        .write(world.players[0], "Heal", vec![Value::from("lots")])
        .is_err());
    assert_eq!(session.pump(), 0);
    session.assert_mirrors_match();
}

#[test]
fn reparent_across_visible_and_hidden_parents() {
    let mut session = TestSession::new();
    let x = session.connect();
    let shown = node(&mut session, None);
    let other = node(&mut session, None);
    let hidden = node(&mut session, None);
    let child = node(&mut session, Some(shown));
    for id in [shown, other, child] {
        session.server.replicate(id).unwrap();
    }
    session.pump();
    session.take_log(x);

    session.server.set_parent(child, other).unwrap();
    session.pump();
    assert_eq!(
        session.take_log(x),
        vec![ReplicaMessage::Reparent {
            id: child,
            parent: Some(other),
        }]
    );
    assert_eq!(session.client(x).replica(child).unwrap().parent(), Some(other));

    session.server.set_parent(child, hidden).unwrap();
    session.pump();
    assert_eq!(destroys(&session.take_log(x)), vec![child]);

    session.server.set_parent(child, shown).unwrap();
    session.pump();
    assert_eq!(summarize(&session.take_log(x)), vec![("create", Some(child))]);
    session.assert_mirrors_match();

    assert!(session.server.set_parent(shown, child).is_err());
    assert!(session.server.set_parent(child, child).is_err());
}

#[test]
fn late_joiner_receives_tree_top_down() {
    let mut session = TestSession::new();
    session.register_write_lib(player_write_lib());
    let world = broadcast_world(&mut session, &["ana", "bo", "cy"]);
    session
        .server
        .write(world.players[1], "AddItem", vec![Value::from("lamp")])
        .unwrap();

    let late = session.connect();
    let log = summarize(session.log(late));
    assert_eq!(log.len(), 4);
    assert_eq!(log[0], ("create", Some(world.root)));
    assert!(log.iter().all(|(kind, _)| *kind == "create"));
    session.assert_mirrors_match();
}

#[test]
fn dont_replicate_destroys_on_every_client() {
    let mut session = TestSession::new();
    session.register_write_lib(player_write_lib());
    let clients = [session.connect(), session.connect()];
    let world = broadcast_world(&mut session, &["ana"]);

    session.server.dont_replicate(world.root).unwrap();
    session.pump();
    for client in clients {
        assert!(!session.mirrors(client, world.root));
        assert!(!session.mirrors(client, world.players[0]));
        assert_eq!(
            destroys(session.log(client)),
            vec![world.players[0], world.root]
        );
    }
    session.assert_mirrors_match();
}

#[test]
fn selective_to_broadcast_reaches_everyone() {
    let mut session = TestSession::new();
    let x = session.connect();
    let y = session.connect();
    let b = node(&mut session, None);
    session.server.subscribe(b, x).unwrap();
    session.server.replicate(b).unwrap();
    session.pump();

    assert!(session.mirrors(x, b));
    assert!(session.mirrors(y, b));
    assert_eq!(summarize(session.log(x)), vec![("create", Some(b))]);

    session.server.subscribe(b, y).unwrap();
    session.server.unsubscribe(b, x).unwrap();
    assert_eq!(session.pump(), 0);
}

#[test]
fn object_removal_destroys_bound_replicas() {
    let mut session = TestSession::new();
    session.register_write_lib(player_write_lib());
    let x = session.connect();
    let world = broadcast_world(&mut session, &["ana", "bo"]);
    let object = ObjectId(77);
    session.server.bind_to_object(world.players[0], object).unwrap();
    assert!(session.server.bind_to_object(world.players[0], ObjectId(78)).is_err());

    session.server.object_removed(object).unwrap();
    session.pump();
    assert!(!session.mirrors(x, world.players[0]));
    assert!(session.mirrors(x, world.players[1]));
    session.assert_mirrors_match();
}

#[test]
fn custom_messages_flow_both_ways() {
    let mut session = TestSession::new();
    session.register_write_lib(player_write_lib());
    let x = session.connect();
    let y = session.connect();
    let world = broadcast_world(&mut session, &["ana"]);
    let player = world.players[0];

    let heard = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&heard);
    session
        .server
        .on_server_event(player, move |event| sink.lock().push(event.client))
        .unwrap();
    session
        .client_mut(y)
        .fire_server(player, vec![Value::from("jump")], false)
        .unwrap();
    session.pump();
    assert_eq!(*heard.lock(), vec![y]);

    let echoes = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&echoes);
    session
        .client_mut(x)
        .on_client_event(player, move |_| *sink.lock() += 1)
        .unwrap();
    session
        .server
        .fire_all_clients(player, vec![Value::from("boom")], true)
        .unwrap();
    session.pump();
    assert_eq!(*echoes.lock(), 1);
    assert_eq!(summarize(session.log(y)).last(), Some(&("custom", Some(player))));
}

#[test]
fn ready_signals_track_clients() {
    let mut session = TestSession::new();
    let joined = Arc::new(Mutex::new(Vec::new()));
    let left = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&joined);
    let _joined = session
        .server
        .on_new_ready_client(move |client| sink.lock().push(*client));
    let sink = Arc::clone(&left);
    let _left = session
        .server
        .on_removing_ready_client(move |client| sink.lock().push(*client));

    let x = session.connect();
    let y = session.connect();
    session.disconnect(x);

    assert_eq!(*joined.lock(), vec![x, y]);
    assert_eq!(*left.lock(), vec![x]);
    assert_eq!(
        session.server.ready_clients().iter().copied().collect::<Vec<ClientId>>(),
        vec![y]
    );
}

#[test]
fn client_listeners_observe_mirrored_changes() {
    let mut session = TestSession::new();
    session.register_write_lib(player_write_lib());
    let x = session.connect();

    let created = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&created);
    let token = session.server.token(PLAYER_CLASS);
    session
        .client_mut(x)
        .on_new(&token, move |c| sink.lock().push(c.id));
    let world = broadcast_world(&mut session, &["ana"]);
    let player = world.players[0];
    assert_eq!(*created.lock(), vec![player]);

    let writes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&writes);
    session
        .client_mut(x)
        .on_write(player, "Damage", move |args| sink.lock().push(args.clone()))
        .unwrap();
    let changes = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&changes);
    session
        .client_mut(x)
        .on_change(player, move |_| *sink.lock() += 1)
        .unwrap();

    session
        .server
        .write(player, "Damage", vec![Value::Integer(30)])
        .unwrap();
    session.server.set(player, ["name"], "anna").unwrap();
    session.pump();

    assert_eq!(*writes.lock(), vec![vec![Value::Integer(30)]]);
    assert_eq!(*changes.lock(), 2);
    assert_eq!(
        session.client(x).get_child(world.root, &token),
        Some(player)
    );
    assert!(session
        .client(x)
        .identify(player)
        .unwrap()
        .contains("Player"));
}
