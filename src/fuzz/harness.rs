/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Running scenarios with an injected message, and catching whatever goes wrong.
//!
//! A run fails if the executor returns an error, if anything panics, if the run is unsafe, or if it
//! commits a different number of blocks than expected. Each failed run is counted once and recorded
//! in the harness's [`FaultLog`].
//!
//! ## Panics
//!
//! Panics are caught with [`catch_unwind`](std::panic::catch_unwind), and reported at the site they
//! were raised at, also when they were raised on a signature verification worker.

use crate::{
    consensus::{ChainedHotStuff, ProtocolRegistry, Rules},
    messages::{Message, NewView},
    twins::{
        executor::{execute_scenario_with_registry, ExecutionConfig, ExecutionError},
        network::Injection,
        scenario::{NodeSet, Scenario, ViewSchedule},
    },
    types::basic::{NodeId, ReplicaId, ViewNumber},
};

use super::{
    faults::FaultLog,
    mutator::{message_from_seed, MessageMutator},
    panics::catch_panic,
};

/// Where a fault was caught.
const RECOVERED_FROM_SCENARIO: &str = "try_execute";
const RECOVERED_FROM_MESSAGE: &str = "prepare";

pub struct FuzzHarness {
    scenario: Scenario,
    config: ExecutionConfig,
    registry: ProtocolRegistry,
    expected_commits: usize,
    fault_log: FaultLog,
}

impl FuzzHarness {
    /// A harness that runs `scenario` under `config`. The injection in `config` is replaced on every
    /// run.
    pub fn new(scenario: Scenario, config: ExecutionConfig, expected_commits: usize) -> Self {
        Self {
            scenario,
            config,
            registry: ProtocolRegistry::default(),
            expected_commits,
            fault_log: FaultLog::new(),
        }
    }

    /// The baseline: 4 replicas, no twins, 4 views led by replica 1 without partitions, a budget of
    /// 100 ticks, and exactly one expected commit.
    pub fn baseline(protocol: &str) -> Self {
        let config = ExecutionConfig::builder()
            .num_nodes(4)
            .num_twins(0)
            .tick_budget(100)
            .protocol(protocol)
            .build();
        Self::new(baseline_scenario(4, 4), config, 1)
    }

    pub fn with_registry(mut self, registry: ProtocolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn fault_log(&self) -> &FaultLog {
        &self.fault_log
    }

    pub fn into_fault_log(self) -> FaultLog {
        self.fault_log
    }

    /// Build a fuzz message with `make`. A panic while building counts as a failed message, and
    /// yields `None`.
    pub fn prepare(
        &mut self,
        make: impl FnOnce() -> Message,
        seed: Option<u64>,
    ) -> Option<Message> {
        self.fault_log.total_messages += 1;
        match catch_panic(make) {
            Ok(message) => Some(message),
            Err((location, message)) => {
                self.fault_log.failed_messages += 1;
                // There is no message to blame; record the fault against an empty NewView.
                let placeholder: Message = NewView {
                    view: ViewNumber::init(),
                    sync_info: Default::default(),
                }
                .into();
                self.fault_log.record(
                    location,
                    message,
                    "",
                    RECOVERED_FROM_MESSAGE,
                    &placeholder,
                    seed,
                );
                None
            }
        }
    }

    /// Run the scenario with `replacement` swapped in for message 1. Returns `true` if the run
    /// passed.
    pub fn try_execute(&mut self, replacement: Message, seed: Option<u64>) -> bool {
        self.fault_log.total_scenarios += 1;

        let mut config = self.config.clone();
        config.injection = Some(Injection {
            ordinal: 1,
            replacement: replacement.clone(),
        });

        let outcome = catch_panic(|| {
            execute_scenario_with_registry(&self.scenario, &config, &self.registry)
        });
        // (location, message, detail). Only the first two tell faults apart.
        let fault = match outcome {
            Err((location, message)) => Some((location, message, String::new())),
            Ok(Err(ExecutionError::Fault { node, fault })) => Some((
                format!("{}:{}", fault.location().file(), fault.location().line()),
                String::from(fault.message()),
                if fault.detail().is_empty() {
                    format!("node {}", node)
                } else {
                    format!("node {}: {}", node, fault.detail())
                },
            )),
            Ok(Err(ExecutionError::DeadlineExceeded { ticks })) => Some((
                String::from("executor"),
                String::from("deadline exceeded"),
                format!("after {} ticks", ticks),
            )),
            Ok(Err(error)) => Some((String::from("executor"), error.to_string(), String::new())),
            Ok(Ok(result)) if !result.safe => Some((
                String::from("oracle"),
                String::from("expected no safety violations"),
                result
                    .verdict
                    .conflict
                    .map(|conflict| format!("{:?}", conflict))
                    .unwrap_or_default(),
            )),
            Ok(Ok(result)) if result.commits != self.expected_commits => Some((
                String::from("oracle"),
                String::from("unexpected number of commits"),
                format!(
                    "expected {} commits, got {}",
                    self.expected_commits, result.commits
                ),
            )),
            Ok(Ok(_)) => None,
        };

        match fault {
            Some((location, message, detail)) => {
                log::debug!("fuzz run failed at {}: {} ({})", location, message, detail);
                self.fault_log.failed_scenarios += 1;
                self.fault_log.record(
                    location,
                    message,
                    detail,
                    RECOVERED_FROM_SCENARIO,
                    &replacement,
                    seed,
                );
                false
            }
            None => true,
        }
    }

    /// Generate a message from `seed` and run the scenario with it.
    pub fn fuzz_seed(&mut self, seed: u64) -> bool {
        let num_replicas = self.config.num_nodes;
        match self.prepare(|| message_from_seed(seed, num_replicas), Some(seed)) {
            Some(message) => self.try_execute(message, Some(seed)),
            None => false,
        }
    }

    /// Run `iterations` scenarios, each with a fresh message from `mutator`.
    pub fn fuzz(&mut self, mutator: &mut MessageMutator, iterations: usize) {
        for _ in 0..iterations {
            if let Some(message) = self.prepare(|| mutator.random_message(), None) {
                self.try_execute(message, None);
            }
        }
    }
}

/// `views` views led by replica 1, with all `num_nodes` nodes in one group.
pub fn baseline_scenario(num_nodes: u32, views: usize) -> Scenario {
    let everyone: NodeSet = (1..=num_nodes).map(NodeId::new).collect();
    (0..views)
        .map(|_| ViewSchedule::new(ReplicaId::new(1), vec![everyone.clone()]))
        .collect()
}

/// The protocol the baseline harness runs unless told otherwise.
pub fn default_protocol() -> &'static str {
    ChainedHotStuff::NAME
}
