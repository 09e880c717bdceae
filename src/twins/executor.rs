/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deterministic execution of one scenario.
//!
//! ## Node ids
//!
//! Replicas `1..=num_nodes` are assigned node ids in order, starting at 1. Each of the first
//! `num_twins` replicas gets two consecutive node ids (a twin pair), every other replica gets one. For
//! 4 replicas with 1 twin, the assignment is:
//!
//! ```text
//! replica 1 -> nodes 1, 2
//! replica 2 -> node 3
//! replica 3 -> node 4
//! replica 4 -> node 5
//! ```
//!
//! Partition assignments in a scenario are over these node ids.
//!
//! ## Ticks
//!
//! After every instance has been started, each tick first delivers every message sent during the
//! previous tick in ascending ordinal order, then advances every instance's timer in ascending node id
//! order. The run stops when the tick budget is used up, or once every instance has moved past the
//! last scheduled view.

use std::{
    collections::{BTreeMap, BTreeSet},
    error::Error,
    fmt::{self, Display, Formatter},
    sync::{
        mpsc::{self, Receiver},
        Arc,
    },
    time::{Duration, Instant},
};

use typed_builder::TypedBuilder;

use crate::{
    consensus::{
        quorum_size, Consensus, LeaderRotation, ProtocolFactory, ProtocolFault, ProtocolRegistry,
        ReplicaContext, ScenarioLeaders,
    },
    crypto::{Ed25519Scheme, SignatureCache},
    events::Event,
    logging::log_event,
    types::basic::{CryptoHash, NodeId, ReplicaId},
};

use super::{
    network::{Envelope, Injection, PartitionedNetwork},
    oracle::{SafetyOracle, SafetyVerdict},
    scenario::Scenario,
};

/// Stores the parameters of a single run.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building an [ExecutionConfig]. On the builder call the following methods to construct a valid [ExecutionConfig].

    Required:
    - `.num_nodes(...)`
    - `.num_twins(...)`
    - `.tick_budget(...)`
    - `.protocol(...)`

    Optional:
    - `.injection(...)`
    - `.view_timeout_ticks(...)` (default: 10)
    - `.signature_cache_capacity(...)` (default: 1024)
    - `.deadline(...)`
    - `.log_events(...)` (default: false)
"))]
pub struct ExecutionConfig {
    #[builder(setter(doc = "Set the number of replicas (distinct signing identities). Required."))]
    pub num_nodes: u32,
    #[builder(setter(doc = "Set how many of the replicas run as twin pairs. Required."))]
    pub num_twins: u32,
    #[builder(setter(doc = "Set the maximum number of ticks to run for. Required."))]
    pub tick_budget: u64,
    #[builder(setter(into, doc = "Set the name of the protocol to run. Required."))]
    pub protocol: String,
    #[builder(default, setter(strip_option, doc = "Replace one message right before it is delivered."))]
    pub injection: Option<Injection>,
    #[builder(default = 10, setter(doc = "Set the number of ticks an instance waits in a view before timing out."))]
    pub view_timeout_ticks: u64,
    #[builder(default = 1024, setter(doc = "Set the capacity of each instance's signature cache."))]
    pub signature_cache_capacity: usize,
    #[builder(default, setter(strip_option, doc = "Set a wall-clock limit for the run."))]
    pub deadline: Option<Duration>,
    #[builder(default = false, setter(doc = "Print every event published by the instances."))]
    pub log_events: bool,
}

/// The outcome of a run.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// No two honest instances committed different blocks at the same position.
    pub safe: bool,
    /// Length of the longest commit sequence among honest instances.
    pub commits: usize,
    pub message_count: usize,
    /// One line per sent, delivered, dropped, or injected message.
    pub message_log: String,
    /// Every sent message, in ordinal order.
    pub messages: Vec<Envelope>,
    /// The blocks each instance committed, in commit order.
    pub commit_log: BTreeMap<NodeId, Vec<CryptoHash>>,
    /// The injected replacement was delivered to at least one instance.
    pub injected: bool,
    pub ticks: u64,
    pub verdict: SafetyVerdict,
}

/// The different ways a run can fail.
#[derive(Debug)]
pub enum ExecutionError {
    UnknownProtocol(String),
    InvalidConfiguration(String),
    /// An instance rejected a message as structurally impossible.
    Fault { node: NodeId, fault: ProtocolFault },
    DeadlineExceeded { ticks: u64 },
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::UnknownProtocol(name) => write!(f, "unknown protocol: {}", name),
            ExecutionError::InvalidConfiguration(reason) => {
                write!(f, "invalid configuration: {}", reason)
            }
            ExecutionError::Fault { node, fault } => write!(f, "fault in node {}: {}", node, fault),
            ExecutionError::DeadlineExceeded { ticks } => {
                write!(f, "deadline exceeded after {} ticks", ticks)
            }
        }
    }
}

impl Error for ExecutionError {}

/// Run `scenario` with the protocol named in `config`, looked up in the default registry.
pub fn execute_scenario(
    scenario: &Scenario,
    config: &ExecutionConfig,
) -> Result<ExecutionResult, ExecutionError> {
    execute_scenario_with_registry(scenario, config, &ProtocolRegistry::default())
}

pub fn execute_scenario_with_registry(
    scenario: &Scenario,
    config: &ExecutionConfig,
    registry: &ProtocolRegistry,
) -> Result<ExecutionResult, ExecutionError> {
    let factory = registry
        .get(&config.protocol)
        .ok_or_else(|| ExecutionError::UnknownProtocol(config.protocol.clone()))?;
    execute_scenario_with_factory(scenario, config, &factory)
}

/// Run `scenario`, building every instance with `factory`. `config.protocol` is only used for
/// logging.
pub fn execute_scenario_with_factory(
    scenario: &Scenario,
    config: &ExecutionConfig,
    factory: &ProtocolFactory,
) -> Result<ExecutionResult, ExecutionError> {
    validate(scenario, config)?;
    log::debug!(
        "executing {} views of {} with {} replicas and {} twins",
        scenario.len(),
        config.protocol,
        config.num_nodes,
        config.num_twins
    );

    let started = Instant::now();
    let nodes = assign_node_ids(config.num_nodes, config.num_twins);
    let twins = twin_nodes(config.num_twins, &nodes);
    let replicas: Vec<ReplicaId> = (1..=config.num_nodes).map(ReplicaId::new).collect();
    let quorum = quorum_size(replicas.len());
    let leaders: Arc<dyn LeaderRotation> = Arc::new(ScenarioLeaders::new(scenario.leaders()));

    let mut network =
        PartitionedNetwork::new(scenario.clone(), nodes.clone(), config.injection.clone());
    let mut instances: Vec<Instance> = nodes
        .iter()
        .map(|(node, replica)| {
            let (event_publisher, events) = mpsc::channel();
            let signatures = Arc::new(SignatureCache::new(
                Ed25519Scheme::new(*replica, replicas.iter().copied()),
                config.signature_cache_capacity,
                quorum,
            ));
            let context = ReplicaContext {
                replica: *replica,
                node: *node,
                replicas: replicas.clone(),
                signatures,
                leaders: leaders.clone(),
                view_timeout_ticks: config.view_timeout_ticks,
                network: Box::new(network.outbox(*node, *replica)),
                event_publisher: Some(event_publisher),
            };
            Instance {
                node: *node,
                protocol: factory(context),
                events,
            }
        })
        .collect();
    let mut commit_log: BTreeMap<NodeId, Vec<CryptoHash>> =
        nodes.iter().map(|(node, _)| (*node, Vec::new())).collect();

    for instance in &mut instances {
        instance.protocol.start().map_err(|fault| ExecutionError::Fault {
            node: instance.node,
            fault,
        })?;
        network.collect_sent();
    }

    let last_view = scenario.last_view();
    let mut ticks = 0;
    while ticks < config.tick_budget {
        if let Some(deadline) = config.deadline {
            if started.elapsed() > deadline {
                return Err(ExecutionError::DeadlineExceeded { ticks });
            }
        }
        if instances
            .iter()
            .all(|instance| instance.protocol.current_view() > last_view)
        {
            break;
        }

        for delivery in network.next_batch() {
            let Some(instance) = instances
                .iter_mut()
                .find(|instance| instance.node == delivery.receiver)
            else {
                continue;
            };
            log::trace!(
                "delivering message #{} to node {}",
                delivery.ordinal,
                delivery.receiver
            );
            instance
                .protocol
                .on_receive_msg(delivery.origin, delivery.message)
                .map_err(|fault| ExecutionError::Fault {
                    node: instance.node,
                    fault,
                })?;
            network.collect_sent();
        }

        for instance in &mut instances {
            instance.protocol.on_tick().map_err(|fault| ExecutionError::Fault {
                node: instance.node,
                fault,
            })?;
            network.collect_sent();
        }

        for instance in &instances {
            instance.drain_events(&mut commit_log, config.log_events);
        }
        ticks += 1;
    }

    for instance in &instances {
        instance.drain_events(&mut commit_log, config.log_events);
    }

    let verdict = SafetyOracle::new(twins).check(&commit_log);
    if !verdict.safe {
        log::debug!("safety violation: {:?}", verdict.conflict);
    }
    let injected = network.injected();
    let message_count = network.message_count();
    let (message_log, messages) = network.into_records();

    Ok(ExecutionResult {
        safe: verdict.safe,
        commits: verdict.commits,
        message_count,
        message_log,
        messages,
        commit_log,
        injected,
        ticks,
        verdict,
    })
}

/// Assign node ids to replicas. Returns every instance with the replica it runs as, in ascending node
/// id order.
pub fn assign_node_ids(num_nodes: u32, num_twins: u32) -> Vec<(NodeId, ReplicaId)> {
    let mut nodes = Vec::new();
    let mut next_node = 1;
    for replica in (1..=num_nodes).map(ReplicaId::new) {
        let instances = if replica.int() <= num_twins { 2 } else { 1 };
        for _ in 0..instances {
            nodes.push((NodeId::new(next_node), replica));
            next_node += 1;
        }
    }
    nodes
}

/// Every node that shares its replica id with another node.
fn twin_nodes(num_twins: u32, nodes: &[(NodeId, ReplicaId)]) -> BTreeSet<NodeId> {
    nodes
        .iter()
        .filter(|(_, replica)| replica.int() <= num_twins)
        .map(|(node, _)| *node)
        .collect()
}

fn validate(scenario: &Scenario, config: &ExecutionConfig) -> Result<(), ExecutionError> {
    let invalid = |reason: String| Err(ExecutionError::InvalidConfiguration(reason));

    if config.num_nodes == 0 {
        return invalid(String::from("at least one replica is required"));
    }
    if config.num_twins > config.num_nodes {
        return invalid(format!(
            "{} twins requested but there are only {} replicas",
            config.num_twins, config.num_nodes
        ));
    }
    if scenario.is_empty() {
        return invalid(String::from("the scenario has no views"));
    }

    let universe: BTreeSet<NodeId> = (1..=config.num_nodes + config.num_twins)
        .map(NodeId::new)
        .collect();
    for (i, view) in scenario.views().iter().enumerate() {
        let view_number = i + 1;
        if view.leader.int() == 0 || view.leader.int() > config.num_nodes {
            return invalid(format!(
                "leader {} of view {} is not a replica",
                view.leader, view_number
            ));
        }

        let mut covered = BTreeSet::new();
        for node in view.partitions.iter().flat_map(|group| group.iter()) {
            if !universe.contains(node) {
                return invalid(format!(
                    "node {} in view {} does not exist",
                    node, view_number
                ));
            }
            if !covered.insert(*node) {
                return invalid(format!(
                    "node {} is in more than one group in view {}",
                    node, view_number
                ));
            }
        }
        if covered != universe {
            return invalid(format!(
                "the groups of view {} do not cover every node",
                view_number
            ));
        }
    }

    Ok(())
}

struct Instance {
    node: NodeId,
    protocol: Box<dyn Consensus>,
    events: Receiver<Event>,
}

impl Instance {
    fn drain_events(&self, commit_log: &mut BTreeMap<NodeId, Vec<CryptoHash>>, log_events: bool) {
        while let Ok(event) = self.events.try_recv() {
            if log_events {
                log_event(self.node, &event);
            }
            if let Event::CommitBlock(commit) = &event {
                commit_log.entry(self.node).or_default().push(commit.block);
            }
        }
    }
}
