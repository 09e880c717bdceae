/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The scenario model: who leads each view, and how the network is partitioned in it.

use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::basic::{NodeId, ReplicaId, ViewNumber};

/// An ordered set of unique node ids. One group of a partition assignment.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct NodeSet(BTreeSet<NodeId>);

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId) -> bool {
        self.0.insert(node)
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.0.contains(node)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.0.first().copied()
    }
}

impl FromIterator<NodeId> for NodeSet {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[u32; N]> for NodeSet {
    fn from(value: [u32; N]) -> Self {
        value.into_iter().map(NodeId::new).collect()
    }
}

impl Display for NodeSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", node)?;
        }
        write!(f, "}}")
    }
}

/// The leader of one view and the partition assignment that governs its messages.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct ViewSchedule {
    pub leader: ReplicaId,
    pub partitions: Vec<NodeSet>,
}

impl ViewSchedule {
    pub fn new(leader: ReplicaId, partitions: Vec<NodeSet>) -> Self {
        Self { leader, partitions }
    }

    /// Can a message travel from `sender` to `receiver` under this assignment?
    pub fn connected(&self, sender: &NodeId, receiver: &NodeId) -> bool {
        self.partitions
            .iter()
            .any(|group| group.contains(sender) && group.contains(receiver))
    }
}

impl Display for ViewSchedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "leader {} ", self.leader)?;
        for group in &self.partitions {
            write!(f, "{}", group)?;
        }
        Ok(())
    }
}

/// One adversarial execution plan. Entry `i` governs view `i + 1`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct Scenario(Vec<ViewSchedule>);

impl Scenario {
    pub fn new(views: Vec<ViewSchedule>) -> Self {
        Self(views)
    }

    pub fn views(&self) -> &[ViewSchedule] {
        &self.0
    }

    /// Number of scheduled views.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last scheduled view.
    pub fn last_view(&self) -> ViewNumber {
        ViewNumber::new(self.0.len() as u64)
    }

    /// The schedule of `view`, if `view` is scheduled.
    pub fn schedule(&self, view: ViewNumber) -> Option<&ViewSchedule> {
        let index = view.int().checked_sub(1)?;
        self.0.get(usize::try_from(index).ok()?)
    }

    pub fn leaders(&self) -> Vec<ReplicaId> {
        self.0.iter().map(|view| view.leader).collect()
    }

    pub fn push(&mut self, view: ViewSchedule) {
        self.0.push(view)
    }
}

impl FromIterator<ViewSchedule> for Scenario {
    fn from_iter<T: IntoIterator<Item = ViewSchedule>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for Scenario {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, view) in self.0.iter().enumerate() {
            writeln!(f, "view {}: {}", i + 1, view)?;
        }
        Ok(())
    }
}
