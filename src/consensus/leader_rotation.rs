/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::types::basic::{ReplicaId, ViewNumber};

/// Decides who leads each view.
pub trait LeaderRotation: Send + Sync {
    /// The leader of `view`, or `None` if nobody leads it.
    fn leader(&self, view: ViewNumber) -> Option<ReplicaId>;
}

/// Leaders taken from a fixed schedule: view `v` is led by entry `v - 1`. View 0 and views past the
/// end of the schedule have no leader.
pub struct ScenarioLeaders {
    leaders: Vec<ReplicaId>,
}

impl ScenarioLeaders {
    pub fn new(leaders: Vec<ReplicaId>) -> Self {
        Self { leaders }
    }
}

impl LeaderRotation for ScenarioLeaders {
    fn leader(&self, view: ViewNumber) -> Option<ReplicaId> {
        let index = view.int().checked_sub(1)?;
        let index = usize::try_from(index).ok()?;
        self.leaders.get(index).copied()
    }
}
