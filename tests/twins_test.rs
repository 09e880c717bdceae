/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! End-to-end tests for the executor and the safety oracle.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use log::LevelFilter;

use hotstuff_twins::{
    consensus::{registry::factory_for, ProtocolRegistry, SimpleHotStuff},
    messages::{Message, Proposal, Vote},
    twins::{
        assign_node_ids, execute_scenario, execute_scenario_with_registry, ExecutionConfig,
        ExecutionError, Injection, NodeSet, Recipients, SafetyOracle, Scenario,
    },
    types::{
        basic::{Command, CryptoHash, NodeId, ReplicaId, SignatureBytes, ViewNumber},
        block::Block,
        certificates::Signature,
    },
};

mod common;

use common::{
    logging::setup_logger,
    scenarios::{config, connected_scenario, view},
};

const PROTOCOLS: [&str; 2] = ["chainedhotstuff", "simplehotstuff"];

#[test]
fn baseline_commits_exactly_one_block() {
    setup_logger(LevelFilter::Info);

    for protocol in PROTOCOLS {
        let result = execute_scenario(&connected_scenario(4, 4, 1), &config(4, 0, protocol)).unwrap();

        assert!(result.safe, "{} is unsafe", protocol);
        assert_eq!(result.commits, 1, "{} committed {}", protocol, result.commits);
        assert!(result.ticks < 100, "{} used up the tick budget", protocol);
        assert!(!result.injected);

        let committed: BTreeSet<CryptoHash> = result
            .commit_log
            .values()
            .flat_map(|commits| commits.iter().copied())
            .collect();
        assert_eq!(committed.len(), 1);
        assert_eq!(result.commit_log.len(), 4);
        assert!(result.commit_log.values().all(|commits| commits.len() == 1));
    }
}

#[test]
fn runs_are_deterministic() {
    let scenario = connected_scenario(4, 4, 1);
    let config = config(4, 0, "chainedhotstuff");
    let first = execute_scenario(&scenario, &config).unwrap();
    let second = execute_scenario(&scenario, &config).unwrap();

    assert_eq!(first.message_log, second.message_log);
    assert_eq!(first.commit_log, second.commit_log);
    assert_eq!(first.ticks, second.ticks);
}

#[test]
fn sent_messages_are_numbered_from_one() {
    let result =
        execute_scenario(&connected_scenario(4, 4, 1), &config(4, 0, "chainedhotstuff")).unwrap();

    assert_eq!(result.message_count, result.messages.len());
    for (i, envelope) in result.messages.iter().enumerate() {
        assert_eq!(envelope.ordinal, i as u64 + 1);
    }

    // The leader of view 1 starts first, and its proposal is the first message.
    let first = &result.messages[0];
    assert_eq!(first.sender, NodeId::new(1));
    assert_eq!(first.recipients, Recipients::All);
    assert!(matches!(first.message, Message::Propose(_)));
    assert_eq!(first.message.view(), ViewNumber::new(1));

    assert!(result.message_log.starts_with("send #1 node 1 -> all"));
    assert!(result.message_log.contains("deliver #1 node 1 -> node 4"));
}

#[test]
fn isolated_leader_then_healed_network_is_safe() {
    let scenario = Scenario::new(vec![
        view(1, vec![NodeSet::from([1]), NodeSet::from([2, 3, 4])]),
        view(2, vec![NodeSet::from([1, 2, 3, 4])]),
        view(2, vec![NodeSet::from([1, 2, 3, 4])]),
        view(2, vec![NodeSet::from([1, 2, 3, 4])]),
    ]);

    for protocol in PROTOCOLS {
        let result = execute_scenario(&scenario, &config(4, 0, protocol)).unwrap();
        assert!(result.safe, "{} is unsafe", protocol);
        assert!(result.message_log.contains("partitioned in view 1"));
    }
}

#[test]
fn instances_do_not_commit_past_a_missing_block() {
    // Node 4 misses the view 3 block, then sees every later block, whose certificates reach back to
    // the block it never received.
    let everyone = vec![NodeSet::from([1, 2, 3, 4])];
    let scenario = Scenario::new(vec![
        view(1, everyone.clone()),
        view(1, everyone.clone()),
        view(1, vec![NodeSet::from([1, 2, 3]), NodeSet::from([4])]),
        view(1, everyone.clone()),
        view(1, everyone.clone()),
        view(1, everyone.clone()),
        view(1, everyone),
    ]);

    for protocol in PROTOCOLS {
        let result = execute_scenario(&scenario, &config(4, 0, protocol)).unwrap();
        assert!(result.safe, "{} is unsafe: {:?}", protocol, result.verdict.conflict);
        assert!(result.message_log.contains("partitioned in view 3"));
        assert!(result.commit_log[&NodeId::new(4)].is_empty(), "{}", protocol);

        let connected = &result.commit_log[&NodeId::new(1)];
        assert!(!connected.is_empty(), "{} committed nothing", protocol);
        for node in [2, 3] {
            assert_eq!(&result.commit_log[&NodeId::new(node)], connected);
        }
    }
}

#[test]
fn twins_split_across_partitions_stay_safe() {
    // Replica 1 runs as nodes 1 and 2. Node 1 sits with a quorum, node 2 does not.
    let split = vec![NodeSet::from([1, 3, 4]), NodeSet::from([2, 5])];
    let scenario = Scenario::new(vec![
        view(1, split.clone()),
        view(1, split.clone()),
        view(1, split.clone()),
        view(1, split),
    ]);

    for protocol in PROTOCOLS {
        let result = execute_scenario(&scenario, &config(4, 1, protocol)).unwrap();
        assert!(result.safe, "{} is unsafe", protocol);
        assert_eq!(result.commit_log.len(), 5);
    }
}

#[test]
fn equivocating_twin_leaders_stay_safe() {
    // Both twins of replica 1 lead every view, each with a different half of the network.
    let scenario = Scenario::new(vec![
        view(1, vec![NodeSet::from([1, 3, 4]), NodeSet::from([2, 5])]),
        view(1, vec![NodeSet::from([1, 3]), NodeSet::from([2, 4, 5])]),
        view(1, vec![NodeSet::from([1, 3, 4]), NodeSet::from([2, 5])]),
        view(1, vec![NodeSet::from([1, 2, 3, 4, 5])]),
    ]);

    for protocol in PROTOCOLS {
        let result = execute_scenario(&scenario, &config(4, 1, protocol)).unwrap();
        assert!(result.safe, "{} is unsafe", protocol);
    }
}

#[test]
fn node_ids_put_twins_first() {
    let nodes = assign_node_ids(4, 1);
    let expected: Vec<(NodeId, ReplicaId)> = [(1, 1), (2, 1), (3, 2), (4, 3), (5, 4)]
        .into_iter()
        .map(|(node, replica)| (NodeId::new(node), ReplicaId::new(replica)))
        .collect();
    assert_eq!(nodes, expected);

    assert_eq!(assign_node_ids(3, 0).len(), 3);
    assert_eq!(assign_node_ids(3, 3).len(), 6);
}

#[test]
fn invalid_configurations_are_rejected() {
    let connected = connected_scenario(4, 4, 1);
    let invalid = |scenario: &Scenario, config: &ExecutionConfig| {
        matches!(
            execute_scenario(scenario, config),
            Err(ExecutionError::InvalidConfiguration(_))
        )
    };

    assert!(invalid(&connected, &config(0, 0, "chainedhotstuff")));
    assert!(invalid(&connected, &config(4, 5, "chainedhotstuff")));
    assert!(invalid(&Scenario::default(), &config(4, 0, "chainedhotstuff")));

    let all = || vec![NodeSet::from([1, 2, 3, 4])];
    assert!(invalid(
        &Scenario::new(vec![view(0, all())]),
        &config(4, 0, "chainedhotstuff")
    ));
    assert!(invalid(
        &Scenario::new(vec![view(5, all())]),
        &config(4, 0, "chainedhotstuff")
    ));
    // Node 5 only exists with a twin.
    assert!(invalid(
        &Scenario::new(vec![view(1, vec![NodeSet::from([1, 2, 3, 4, 5])])]),
        &config(4, 0, "chainedhotstuff")
    ));
    assert!(invalid(
        &Scenario::new(vec![view(1, vec![NodeSet::from([1, 2]), NodeSet::from([2, 3, 4])])]),
        &config(4, 0, "chainedhotstuff")
    ));
    assert!(invalid(
        &Scenario::new(vec![view(1, vec![NodeSet::from([1, 2, 3])])]),
        &config(4, 0, "chainedhotstuff")
    ));
    // Twins count towards the universe.
    assert!(invalid(&connected, &config(4, 1, "chainedhotstuff")));
}

#[test]
fn unknown_protocol_is_an_error() {
    let result = execute_scenario(&connected_scenario(4, 4, 1), &config(4, 0, "pbft"));
    match result {
        Err(ExecutionError::UnknownProtocol(name)) => assert_eq!(name, "pbft"),
        other => panic!("expected an unknown protocol error, got {:?}", other.map(|r| r.ticks)),
    }
}

#[test]
fn custom_registries_resolve_their_own_names() {
    let mut registry = ProtocolRegistry::empty();
    registry.register("shs", factory_for::<SimpleHotStuff>());
    assert_eq!(registry.names().collect::<Vec<&str>>(), vec!["shs"]);

    let result = execute_scenario_with_registry(
        &connected_scenario(4, 4, 1),
        &config(4, 0, "shs"),
        &registry,
    )
    .unwrap();
    assert_eq!(result.commits, 1);

    assert!(matches!(
        execute_scenario_with_registry(
            &connected_scenario(4, 4, 1),
            &config(4, 0, "chainedhotstuff"),
            &registry,
        ),
        Err(ExecutionError::UnknownProtocol(_))
    ));
}

#[test]
fn injecting_the_sent_message_changes_nothing() {
    let scenario = connected_scenario(4, 4, 1);
    let plain = execute_scenario(&scenario, &config(4, 0, "chainedhotstuff")).unwrap();

    let mut injected_config = config(4, 0, "chainedhotstuff");
    injected_config.injection = Some(Injection {
        ordinal: 1,
        replacement: plain.messages[0].message.clone(),
    });
    let injected = execute_scenario(&scenario, &injected_config).unwrap();

    assert!(injected.injected);
    assert_eq!(injected.commit_log, plain.commit_log);
    assert!(injected.message_log.contains("inject #1"));
}

#[test]
fn impossible_messages_are_reported_as_faults() {
    // A vote signed by replica 2, sent on behalf of replica 1.
    let forged_vote: Message = Vote {
        view: ViewNumber::new(1),
        block: Block::genesis_hash(),
        signature: Signature::new(ReplicaId::new(2), SignatureBytes::new([0u8; 64])),
    }
    .into();
    // A proposal without a certificate.
    let orphan: Message = Proposal {
        block: Block::new(
            Block::genesis_hash(),
            None,
            Command::from("orphan"),
            ViewNumber::new(1),
            ReplicaId::new(1),
        ),
    }
    .into();

    for replacement in [forged_vote, orphan] {
        let config = ExecutionConfig::builder()
            .num_nodes(4)
            .num_twins(0)
            .tick_budget(100)
            .protocol("chainedhotstuff")
            .injection(Injection {
                ordinal: 1,
                replacement,
            })
            .build();
        match execute_scenario(&connected_scenario(4, 4, 1), &config) {
            Err(ExecutionError::Fault { node, fault }) => {
                assert_eq!(node, NodeId::new(1));
                assert!(fault.location().file().ends_with("base.rs"));
                assert!(fault.to_string().contains("base.rs"));
            }
            other => panic!("expected a fault, got {:?}", other.map(|r| r.ticks)),
        }
    }
}

#[test]
fn messages_for_unscheduled_views_are_dropped() {
    let stray: Message = Vote {
        view: ViewNumber::new(9),
        block: Block::genesis_hash(),
        signature: Signature::new(ReplicaId::new(2), SignatureBytes::new([0u8; 64])),
    }
    .into();
    let config = ExecutionConfig::builder()
        .num_nodes(4)
        .num_twins(0)
        .tick_budget(100)
        .protocol("chainedhotstuff")
        .injection(Injection {
            ordinal: 1,
            replacement: stray,
        })
        .build();

    let result = execute_scenario(&connected_scenario(4, 4, 1), &config).unwrap();
    assert!(!result.injected);
    assert!(result.safe);
    assert!(result.message_log.contains("drop #1: view 9 is not scheduled"));
}

#[test]
fn tick_budget_and_deadline_bound_a_run() {
    let scenario = connected_scenario(4, 4, 1);

    let no_ticks = ExecutionConfig::builder()
        .num_nodes(4)
        .num_twins(0)
        .tick_budget(0)
        .protocol("chainedhotstuff")
        .build();
    let result = execute_scenario(&scenario, &no_ticks).unwrap();
    assert_eq!(result.ticks, 0);
    assert_eq!(result.commits, 0);
    // Only the first proposal and the new view messages of view 1 were sent.
    assert!(result.message_count > 0);

    let no_time = ExecutionConfig::builder()
        .num_nodes(4)
        .num_twins(0)
        .tick_budget(100)
        .protocol("chainedhotstuff")
        .deadline(Duration::ZERO)
        .build();
    assert!(matches!(
        execute_scenario(&scenario, &no_time),
        Err(ExecutionError::DeadlineExceeded { ticks: 0 })
    ));
}

#[test]
fn oracle_reports_the_first_conflict() {
    let a = CryptoHash::new([1u8; 32]);
    let b = CryptoHash::new([2u8; 32]);
    let c = CryptoHash::new([3u8; 32]);
    let mut commit_log = BTreeMap::new();
    commit_log.insert(NodeId::new(1), vec![a, b]);
    commit_log.insert(NodeId::new(2), vec![a]);
    commit_log.insert(NodeId::new(3), vec![a, c, c]);

    let verdict = SafetyOracle::new(BTreeSet::new()).check(&commit_log);
    assert!(!verdict.safe);
    assert_eq!(verdict.commits, 3);
    let conflict = verdict.conflict.unwrap();
    assert_eq!(conflict.index, 1);
    assert_eq!(conflict.first, (NodeId::new(1), b));
    assert_eq!(conflict.second, (NodeId::new(3), c));

    // Excluding the twin that diverged makes the log consistent.
    let verdict = SafetyOracle::new(BTreeSet::from([NodeId::new(3)])).check(&commit_log);
    assert!(verdict.safe);
    assert_eq!(verdict.commits, 2);
    assert!(verdict.conflict.is_none());

    let verdict = SafetyOracle::new(BTreeSet::new()).check(&BTreeMap::new());
    assert!(verdict.safe);
    assert_eq!(verdict.commits, 0);
}

#[test]
fn event_logging_does_not_change_the_outcome() {
    setup_logger(LevelFilter::Info);

    let scenario = connected_scenario(4, 4, 1);
    let quiet = execute_scenario(&scenario, &config(4, 0, "simplehotstuff")).unwrap();
    let mut logged_config = config(4, 0, "simplehotstuff");
    logged_config.log_events = true;
    let logged = execute_scenario(&scenario, &logged_config).unwrap();

    assert_eq!(quiet.commit_log, logged.commit_log);
    assert_eq!(quiet.message_log, logged.message_log);
}
