use hotstuff_twins::{
    twins::{ExecutionConfig, NodeSet, Scenario, ViewSchedule},
    types::basic::{NodeId, ReplicaId},
};

/// Every view led by `leader`, with no partitions among `num_instances` instances.
pub(crate) fn connected_scenario(num_instances: u32, views: usize, leader: u32) -> Scenario {
    let everyone: NodeSet = (1..=num_instances).map(NodeId::new).collect();
    (0..views)
        .map(|_| ViewSchedule::new(ReplicaId::new(leader), vec![everyone.clone()]))
        .collect()
}

/// A view schedule from a leader and a list of groups.
pub(crate) fn view(leader: u32, groups: Vec<NodeSet>) -> ViewSchedule {
    ViewSchedule::new(ReplicaId::new(leader), groups)
}

pub(crate) fn config(num_nodes: u32, num_twins: u32, protocol: &str) -> ExecutionConfig {
    ExecutionConfig::builder()
        .num_nodes(num_nodes)
        .num_twins(num_twins)
        .tick_budget(100)
        .protocol(protocol)
        .build()
}
