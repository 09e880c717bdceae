/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for scenario generation.

use std::collections::BTreeSet;

use hotstuff_twins::{
    consensus::{registry::factory_for, ChainedHotStuff, ProtocolFactory, Rules, SimpleHotStuff},
    twins::{ExecutionConfig, GeneratorConfig, NodeSet, Scenario, ScenarioGenerator},
    types::basic::ReplicaId,
};

mod common;

use common::scenarios::config;

fn generator(config: GeneratorConfig) -> ScenarioGenerator {
    ScenarioGenerator::new(config, factory_for::<ChainedHotStuff>())
}

#[test]
fn exhaustive_mode_enumerates_every_scenario_once() {
    // 2 leaders × 2 assignments of 2 nodes = 4 choices per round, 4^2 scenarios.
    let scenarios: Vec<Scenario> = generator(
        GeneratorConfig::builder()
            .num_nodes(2)
            .num_twins(0)
            .rounds(2)
            .max_partitions(2)
            .build(),
    )
    .collect();

    assert_eq!(scenarios.len(), 16);
    let distinct: BTreeSet<String> = scenarios.iter().map(Scenario::to_string).collect();
    assert_eq!(distinct.len(), 16);
    assert!(scenarios.iter().all(|scenario| scenario.len() == 2));
}

#[test]
fn exhaustive_mode_varies_the_last_round_fastest() {
    let mut generator = generator(
        GeneratorConfig::builder()
            .num_nodes(2)
            .num_twins(0)
            .rounds(2)
            .max_partitions(2)
            .build(),
    );
    assert_eq!(generator.total(), 16);
    let together = vec![NodeSet::from([1, 2])];
    let apart = vec![NodeSet::from([1]), NodeSet::from([2])];
    assert_eq!(generator.assignments(), &[together.clone(), apart.clone()]);

    let first = generator.next_scenario().unwrap();
    let second = generator.next_scenario().unwrap();
    let fifth = generator.nth(2).unwrap();

    for view in first.views() {
        assert_eq!(view.leader, ReplicaId::new(1));
        assert_eq!(view.partitions, together);
    }

    assert_eq!(second.views()[0], first.views()[0]);
    assert_eq!(second.views()[1].leader, ReplicaId::new(1));
    assert_eq!(second.views()[1].partitions, apart);

    assert_eq!(fifth.views()[0].leader, ReplicaId::new(1));
    assert_eq!(fifth.views()[0].partitions, apart);
    assert_eq!(fifth.views()[1], first.views()[1]);
}

#[test]
fn limit_bounds_the_number_of_scenarios() {
    let limited = generator(
        GeneratorConfig::builder()
            .num_nodes(4)
            .num_twins(1)
            .rounds(4)
            .max_partitions(2)
            .limit(25)
            .build(),
    );
    assert_eq!(limited.count(), 25);
}

#[test]
fn seeded_mode_is_reproducible() {
    let seeded = |seed| {
        generator(
            GeneratorConfig::builder()
                .num_nodes(4)
                .num_twins(1)
                .rounds(4)
                .max_partitions(3)
                .limit(10)
                .seed(seed)
                .build(),
        )
        .collect::<Vec<Scenario>>()
    };

    let first = seeded(7);
    assert_eq!(first.len(), 10);
    assert_eq!(first, seeded(7));
    assert_ne!(first, seeded(8));
}

#[test]
fn leaders_can_be_restricted() {
    let scenarios: Vec<Scenario> = generator(
        GeneratorConfig::builder()
            .num_nodes(4)
            .num_twins(0)
            .rounds(3)
            .max_partitions(2)
            .leaders(vec![ReplicaId::new(2)])
            .limit(50)
            .build(),
    )
    .collect();

    assert_eq!(scenarios.len(), 50);
    assert!(scenarios
        .iter()
        .flat_map(|scenario| scenario.leaders())
        .all(|leader| leader == ReplicaId::new(2)));
}

#[test]
fn zero_rounds_yields_nothing() {
    let mut empty = generator(
        GeneratorConfig::builder()
            .num_nodes(4)
            .num_twins(0)
            .rounds(0)
            .max_partitions(2)
            .build(),
    );
    assert_eq!(empty.total(), 0);
    assert!(empty.next().is_none());
}

#[test]
fn generated_scenarios_can_be_executed() {
    let mut generator = generator(
        GeneratorConfig::builder()
            .num_nodes(4)
            .num_twins(0)
            .rounds(4)
            .max_partitions(2)
            .limit(3)
            .build(),
    );
    let config = config(4, 0, "chainedhotstuff");

    let mut executed = 0;
    while let Some((scenario, result)) = generator.execute_next(&config) {
        let result = result.unwrap();
        assert!(result.safe, "unsafe run of\n{}", scenario);
        executed += 1;
    }
    assert_eq!(executed, 3);
}

#[test]
fn sampled_twins_scenarios_are_safe() {
    let protocols: [(&str, ProtocolFactory); 2] = [
        (ChainedHotStuff::NAME, factory_for::<ChainedHotStuff>()),
        (SimpleHotStuff::NAME, factory_for::<SimpleHotStuff>()),
    ];

    for (protocol, factory) in protocols {
        for max_partitions in [2, 3] {
            let mut generator = ScenarioGenerator::new(
                GeneratorConfig::builder()
                    .num_nodes(4)
                    .num_twins(1)
                    .rounds(7)
                    .max_partitions(max_partitions)
                    .limit(150)
                    .seed(0x7715 + max_partitions as u64)
                    .build(),
                factory.clone(),
            );
            let config = ExecutionConfig::builder()
                .num_nodes(4)
                .num_twins(1)
                .tick_budget(200)
                .view_timeout_ticks(5)
                .protocol(protocol)
                .build();

            let mut executed = 0;
            while let Some((scenario, result)) = generator.execute_next(&config) {
                let result = result.unwrap();
                assert!(
                    result.safe,
                    "{} is unsafe ({:?}) in\n{}",
                    protocol, result.verdict.conflict, scenario
                );
                executed += 1;
            }
            assert_eq!(executed, 150);
        }
    }
}
