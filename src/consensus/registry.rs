/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Named protocol factories.
//!
//! The executor looks a protocol up by name and calls its factory once per simulated instance, so
//! that every run starts from freshly constructed instances.

use std::{collections::BTreeMap, sync::Arc};

use super::{
    rules::{ChainedHotStuff, Rules, SimpleHotStuff},
    Consensus, ConsensusBase, ReplicaContext,
};

pub type ProtocolFactory = Arc<dyn Fn(ReplicaContext) -> Box<dyn Consensus> + Send + Sync>;

pub struct ProtocolRegistry {
    factories: BTreeMap<String, ProtocolFactory>,
}

impl ProtocolRegistry {
    /// A registry without any protocols.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any factory registered under the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: ProtocolFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn get(&self, name: &str) -> Option<ProtocolFactory> {
        self.factories.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for ProtocolRegistry {
    /// A registry with `"chainedhotstuff"` and `"simplehotstuff"`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ChainedHotStuff::NAME, factory_for::<ChainedHotStuff>());
        registry.register(SimpleHotStuff::NAME, factory_for::<SimpleHotStuff>());
        registry
    }
}

/// A factory that builds [`ConsensusBase`] instances with the rules `R`.
pub fn factory_for<R: Rules>() -> ProtocolFactory {
    Arc::new(|context: ReplicaContext| -> Box<dyn Consensus> {
        Box::new(ConsensusBase::<R>::new(context))
    })
}
