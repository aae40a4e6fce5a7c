//! Property tests for server/client convergence and mutation laws.

use proptest::prelude::*;
use replica_codec::{Path, Value};
use replica_core::{Document, ReplicaId};
use replica_protocol::ReplicaMessage;
use replica_server::ReplicaParams;
use replica_testkit::prelude::*;
use std::collections::BTreeMap;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn mirrors_converge_under_random_mutations(
        doc in document_strategy(),
        ops in mutation_sequence_strategy(1, 40),
    ) {
        let mut session = TestSession::new();
        let client = session.connect();
        let id = session
            .server
            .create(ReplicaParams::new(session.server.token("PropDoc")).with_data(doc.clone()))
            .unwrap();
        session.server.replicate(id).unwrap();

        let mut local = Document::new(doc);
        for op in &ops {
            let on_server = op.apply_to_server(&mut session.server, id).is_ok();
            let on_local = op.apply_to_document(&mut local).is_ok();
            prop_assert_eq!(on_server, on_local);
        }
        session.pump();

        let server_data = session.server.replica(id).unwrap().data().clone();
        prop_assert_eq!(&server_data, local.root());
        prop_assert_eq!(session.client(client).replica(id).unwrap().data(), &server_data);
    }

    #[test]
    fn insert_then_remove_restores_sequence((items, index, value) in table_strategy()) {
        let mut document = Document::new(Value::map(vec![(
            Value::from("list"),
            Value::Array(items.clone()),
        )]));
        let path = Path::from(["list"]);
        let at = document.table_insert(&path, value.clone(), Some(index)).unwrap();
        prop_assert_eq!(at, index);
        let removed = document.table_remove(&path, at).unwrap();
        prop_assert_eq!(removed, value);
        prop_assert_eq!(document.get(&path), Some(&Value::Array(items)));
    }

    #[test]
    fn creates_precede_every_reference(
        shape in prop::collection::vec(prop::option::of(0usize..8), 1..12),
        broadcast in prop::collection::vec(any::<bool>(), 12),
        destroy_at in 0usize..12,
    ) {
        let mut session = TestSession::new();
        let client = session.connect();
        let token = session.server.token("PropNode");

        let mut ids: Vec<ReplicaId> = Vec::new();
        for parent in &shape {
            let mut params = ReplicaParams::new(token.clone());
            if let Some(parent) = parent.and_then(|p| ids.get(p % ids.len().max(1)).copied()) {
                params = params.with_parent(parent);
            }
            ids.push(session.server.create(params).unwrap());
        }
        for (id, replicate) in ids.iter().zip(&broadcast) {
            if *replicate {
                session.server.replicate(*id).unwrap();
            }
            session.server.set(*id, ["touched"], true).unwrap();
        }
        if let Some(victim) = ids.get(destroy_at) {
            session.server.destroy(*victim).unwrap();
        }
        session.pump();

        let mut live: BTreeMap<ReplicaId, Option<ReplicaId>> = BTreeMap::new();
        for message in session.log(client) {
            match message {
                ReplicaMessage::Create(create) => {
                    if let Some(parent) = create.parent {
                        prop_assert!(live.contains_key(&parent));
                    }
                    prop_assert!(live.insert(create.id, create.parent).is_none());
                }
                ReplicaMessage::Destroy { id } => {
                    prop_assert!(live.remove(id).is_some());
                    prop_assert!(live.values().all(|parent| *parent != Some(*id)));
                }
                other => {
                    let id = other.replica_id().unwrap();
                    prop_assert!(live.contains_key(&id));
                }
            }
        }
        session.assert_mirrors_match();
    }
}

#[test]
fn fuzz_targets_survive_generated_payloads() {
    let mut runner = proptest::test_runner::TestRunner::new(
        PropTestConfig::quick().to_proptest_config(),
    );
    runner
        .run(&prop::collection::vec(any::<u8>(), 0..256), |data| {
            fuzz_cbor_decode(&data);
            fuzz_message_roundtrip(&data);
            fuzz_client_stream(&data);
            fuzz_document_ops(&data);
            Ok(())
        })
        .unwrap();
}
