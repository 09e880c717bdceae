/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Twins: safety testing by running protocol instances through adversarial scenarios.
//!
//! A Byzantine replica is modelled by running two instances ("twins") with the same signing key. Each
//! view of a [`Scenario`] names a leader and splits the instances into groups that can only talk
//! among themselves in that view. The pieces fit together like this:
//!
//! 1. [`PartitionGenerator`] enumerates partition assignments.
//! 2. [`ScenarioGenerator`] combines assignments and leaders into scenarios.
//! 3. [`execute_scenario`] runs one scenario deterministically, tick by tick.
//! 4. [`SafetyOracle`] checks that no two honest instances committed different blocks at the same
//!    position. Its verdict is part of every [`ExecutionResult`].

pub mod executor;

pub mod generator;

pub mod network;

pub mod oracle;

pub mod partitions;

pub mod scenario;

pub use executor::{
    assign_node_ids, execute_scenario, execute_scenario_with_factory,
    execute_scenario_with_registry, ExecutionConfig, ExecutionError, ExecutionResult,
};
pub use generator::{GeneratorConfig, ScenarioGenerator};
pub use network::{Envelope, Injection, Recipients};
pub use oracle::{Conflict, SafetyOracle, SafetyVerdict};
pub use partitions::PartitionGenerator;
pub use scenario::{NodeSet, Scenario, ViewSchedule};
