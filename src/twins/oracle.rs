/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The safety check run over the commit logs of a finished run.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::basic::{CryptoHash, NodeId};

/// Two honest instances that committed different blocks at the same position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    /// Zero-based position in the commit sequences.
    pub index: usize,
    pub first: (NodeId, CryptoHash),
    pub second: (NodeId, CryptoHash),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub safe: bool,
    /// Length of the longest honest commit sequence.
    pub commits: usize,
    /// The first conflict found, if the run was unsafe.
    pub conflict: Option<Conflict>,
}

/// Checks that honest instances agree on every position of their commit sequences.
///
/// Twin instances are excluded: a twin pair is one Byzantine replica, and what it commits carries no
/// safety guarantee.
pub struct SafetyOracle {
    excluded: BTreeSet<NodeId>,
}

impl SafetyOracle {
    pub fn new(excluded: BTreeSet<NodeId>) -> Self {
        Self { excluded }
    }

    pub fn check(&self, commit_log: &BTreeMap<NodeId, Vec<CryptoHash>>) -> SafetyVerdict {
        let honest: Vec<(NodeId, &Vec<CryptoHash>)> = commit_log
            .iter()
            .filter(|(node, _)| !self.excluded.contains(*node))
            .map(|(node, commits)| (*node, commits))
            .collect();
        let commits = honest
            .iter()
            .map(|(_, commits)| commits.len())
            .max()
            .unwrap_or(0);

        for index in 0..commits {
            let mut reference: Option<(NodeId, CryptoHash)> = None;
            for (node, sequence) in &honest {
                let Some(hash) = sequence.get(index) else {
                    continue;
                };
                match reference {
                    None => reference = Some((*node, *hash)),
                    Some(first) if first.1 != *hash => {
                        return SafetyVerdict {
                            safe: false,
                            commits,
                            conflict: Some(Conflict {
                                index,
                                first,
                                second: (*node, *hash),
                            }),
                        };
                    }
                    Some(_) => {}
                }
            }
        }

        SafetyVerdict {
            safe: true,
            commits,
            conflict: None,
        }
    }
}
