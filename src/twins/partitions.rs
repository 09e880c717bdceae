/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Enumeration of partition assignments.
//!
//! An assignment of `n` nodes into groups is represented by a restricted growth string `a` of length
//! `n`: node `i` belongs to group `a[i]`, `a[0] = 0`, and every `a[i]` is at most one more than the
//! largest value before it. Each set partition has exactly one such string, and enumerating the strings
//! in lexicographic order enumerates every partition exactly once. Groups come out ordered by their
//! smallest member.

use std::iter::FusedIterator;

use crate::types::basic::NodeId;

use super::scenario::NodeSet;

/// A lazy, finite iterator over every way to split a universe of nodes into at most `max_groups`
/// non-empty, pairwise disjoint groups that together cover the universe.
///
/// Once exhausted, the generator returns `None` forever; it cannot be restarted.
pub struct PartitionGenerator {
    universe: Vec<NodeId>,
    max_groups: usize,
    growth_string: Vec<usize>,
    exhausted: bool,
}

impl PartitionGenerator {
    /// `universe` is sorted and de-duplicated. An empty universe or `max_groups == 0` yields nothing.
    pub fn new(universe: impl IntoIterator<Item = NodeId>, max_groups: usize) -> Self {
        let mut universe: Vec<NodeId> = universe.into_iter().collect();
        universe.sort();
        universe.dedup();
        let exhausted = universe.is_empty() || max_groups == 0;
        Self {
            growth_string: vec![0; universe.len()],
            universe,
            max_groups,
            exhausted,
        }
    }

    /// The universe `1..=size` of node ids.
    pub fn for_nodes(size: u32, max_groups: usize) -> Self {
        Self::new((1..=size).map(NodeId::new), max_groups)
    }

    fn assignment(&self) -> Vec<NodeSet> {
        let num_groups = self.growth_string.iter().max().map_or(0, |max| max + 1);
        let mut groups = vec![NodeSet::new(); num_groups];
        for (node, group) in self.universe.iter().zip(&self.growth_string) {
            groups[*group].insert(*node);
        }
        groups
    }

    /// Step to the lexicographically next growth string. Returns `false` if there is none.
    fn advance(&mut self) -> bool {
        for i in (1..self.growth_string.len()).rev() {
            let prefix_max = self.growth_string[..i].iter().copied().max().unwrap_or(0);
            let candidate = self.growth_string[i] + 1;
            if candidate <= prefix_max + 1 && candidate < self.max_groups {
                self.growth_string[i] = candidate;
                for later in &mut self.growth_string[i + 1..] {
                    *later = 0;
                }
                return true;
            }
        }
        false
    }
}

impl Iterator for PartitionGenerator {
    type Item = Vec<NodeSet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let assignment = self.assignment();
        self.exhausted = !self.advance();
        Some(assignment)
    }
}

impl FusedIterator for PartitionGenerator {}
