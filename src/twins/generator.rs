/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Scenario generation.
//!
//! Each round of a scenario is one choice out of `leaders × partition assignments`. A choice `c`
//! stands for leader `c / P` and assignment `c % P`, where `P` is the number of assignments. The
//! exhaustive mode enumerates scenarios as the numbers `0, 1, 2, ...` written in base `C` (the number
//! of choices per round) with round 1 as the most significant digit. The random mode draws each
//! round's choice from a seeded [`StdRng`], so the same seed always produces the same scenarios.

use rand::{rngs::StdRng, Rng, SeedableRng};
use typed_builder::TypedBuilder;

use crate::{consensus::ProtocolFactory, types::basic::ReplicaId};

use super::{
    executor::{execute_scenario_with_factory, ExecutionConfig, ExecutionError, ExecutionResult},
    partitions::PartitionGenerator,
    scenario::{NodeSet, Scenario, ViewSchedule},
};

/// Stores the parameters of a scenario generator.
#[derive(Clone, Debug, TypedBuilder)]
pub struct GeneratorConfig {
    #[builder(setter(doc = "Set the number of replicas. Required."))]
    pub num_nodes: u32,
    #[builder(setter(doc = "Set how many replicas run as twin pairs. Required."))]
    pub num_twins: u32,
    #[builder(setter(doc = "Set the number of views in every scenario. Required."))]
    pub rounds: usize,
    #[builder(setter(doc = "Set the maximum number of groups in a partition assignment. Required."))]
    pub max_partitions: usize,
    #[builder(default, setter(strip_option, doc = "Restrict the leaders to choose from. Defaults to every replica."))]
    pub leaders: Option<Vec<ReplicaId>>,
    #[builder(default, setter(strip_option, doc = "Stop after this many scenarios."))]
    pub limit: Option<u64>,
    #[builder(default, setter(strip_option, doc = "Draw scenarios at random from a generator seeded with this value."))]
    pub seed: Option<u64>,
}

pub struct ScenarioGenerator {
    rounds: usize,
    leaders: Vec<ReplicaId>,
    assignments: Vec<Vec<NodeSet>>,
    total: u128,
    bound: u128,
    emitted: u128,
    rng: Option<StdRng>,
    factory: ProtocolFactory,
}

impl ScenarioGenerator {
    /// Create a generator whose scenarios are executed with instances built by `factory`.
    pub fn new(config: GeneratorConfig, factory: ProtocolFactory) -> Self {
        let leaders = config
            .leaders
            .clone()
            .unwrap_or_else(|| (1..=config.num_nodes).map(ReplicaId::new).collect());
        let assignments: Vec<Vec<NodeSet>> = PartitionGenerator::for_nodes(
            config.num_nodes + config.num_twins,
            config.max_partitions,
        )
        .collect();

        let choices = (leaders.len() as u128) * (assignments.len() as u128);
        let total = if config.rounds == 0 {
            0
        } else {
            u32::try_from(config.rounds)
                .ok()
                .and_then(|rounds| choices.checked_pow(rounds))
                .unwrap_or(u128::MAX)
        };
        let rng = config.seed.map(StdRng::seed_from_u64);
        let bound = match (config.limit, &rng) {
            (Some(limit), None) => total.min(u128::from(limit)),
            (Some(limit), Some(_)) if total > 0 => u128::from(limit),
            (None, _) | (Some(_), Some(_)) => total,
        };
        log::debug!(
            "scenario generator: {} leaders, {} assignments, {} rounds, {} scenarios",
            leaders.len(),
            assignments.len(),
            config.rounds,
            bound
        );

        Self {
            rounds: config.rounds,
            leaders,
            assignments,
            total,
            bound,
            emitted: 0,
            rng,
            factory,
        }
    }

    /// Number of distinct scenarios (saturating at `u128::MAX`).
    pub fn total(&self) -> u128 {
        self.total
    }

    /// The partition assignments every round chooses from.
    pub fn assignments(&self) -> &[Vec<NodeSet>] {
        &self.assignments
    }

    pub fn next_scenario(&mut self) -> Option<Scenario> {
        if self.emitted >= self.bound {
            return None;
        }

        let choices = self.choices_per_round();
        let digits: Vec<usize> = match &mut self.rng {
            Some(rng) => (0..self.rounds).map(|_| rng.gen_range(0, choices)).collect(),
            None => {
                let mut digits = vec![0; self.rounds];
                let mut rest = self.emitted;
                for digit in digits.iter_mut().rev() {
                    *digit = (rest % choices as u128) as usize;
                    rest /= choices as u128;
                }
                digits
            }
        };
        self.emitted += 1;

        Some(digits.into_iter().map(|choice| self.view_schedule(choice)).collect())
    }

    /// Generate the next scenario and run it with fresh instances.
    pub fn execute_next(
        &mut self,
        config: &ExecutionConfig,
    ) -> Option<(Scenario, Result<ExecutionResult, ExecutionError>)> {
        let scenario = self.next_scenario()?;
        let result = execute_scenario_with_factory(&scenario, config, &self.factory);
        Some((scenario, result))
    }

    fn choices_per_round(&self) -> usize {
        self.leaders.len() * self.assignments.len()
    }

    fn view_schedule(&self, choice: usize) -> ViewSchedule {
        let num_assignments = self.assignments.len();
        ViewSchedule::new(
            self.leaders[choice / num_assignments],
            self.assignments[choice % num_assignments].clone(),
        )
    }
}

impl Iterator for ScenarioGenerator {
    type Item = Scenario;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_scenario()
    }
}
