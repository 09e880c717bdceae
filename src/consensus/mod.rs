/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven HotStuff protocol instances that the Twins executor drives.
//!
//! ## Protocol instances
//!
//! A protocol instance is anything that implements [`Consensus`]. The executor never looks inside an
//! instance: it calls [`start`](Consensus::start) once, then feeds it messages through
//! [`on_receive_msg`](Consensus::on_receive_msg) and advances its clock through
//! [`on_tick`](Consensus::on_tick). Instances talk back through the [`Network`] in their
//! [`ReplicaContext`] and through [events](crate::events).
//!
//! [`ConsensusBase`] implements everything that the chained HotStuff variants have in common: the
//! chain store, vote and timeout collection, view synchronization, proposing, and committing. What
//! differs between variants (when to vote, when to lock, when to commit) is captured by the
//! [`Rules`] trait, which is implemented by [`ChainedHotStuff`] and [`SimpleHotStuff`].
//!
//! ## Faults
//!
//! A [`ProtocolFault`] is raised for a message that is structurally impossible for a correct replica
//! to send, e.g., a proposal whose block does not extend the block its certificate certifies.
//! Messages that are merely unverifiable or stale are ignored instead.

pub mod base;

pub mod block_chain;

pub mod collectors;

pub mod leader_rotation;

pub mod registry;

pub mod rules;

use std::{
    fmt::{self, Display, Formatter},
    panic::Location,
    sync::{mpsc::Sender, Arc},
};

use crate::{
    crypto::{Ed25519Scheme, SignatureCache},
    events::Event,
    messages::Message,
    types::basic::{NodeId, ReplicaId, ViewNumber},
};

pub use base::ConsensusBase;
pub use leader_rotation::{LeaderRotation, ScenarioLeaders};
pub use registry::{ProtocolFactory, ProtocolRegistry};
pub use rules::{ChainedHotStuff, Rules, SimpleHotStuff};

/// A single protocol instance, as seen by the executor.
pub trait Consensus {
    /// Enter view 1. The leader of view 1 proposes immediately.
    fn start(&mut self) -> Result<(), ProtocolFault>;

    /// Handle a message sent by the replica `origin`.
    fn on_receive_msg(&mut self, origin: ReplicaId, msg: Message) -> Result<(), ProtocolFault>;

    /// Advance the instance's view timer by one tick.
    fn on_tick(&mut self) -> Result<(), ProtocolFault>;

    fn current_view(&self) -> ViewNumber;
}

/// The outgoing side of an instance's network connection. Sends never block and never fail: a
/// message that cannot be delivered is silently lost.
pub trait Network {
    /// Send a message to every instance, including the sender.
    fn broadcast(&mut self, message: Message);

    /// Send a message to every instance that runs as `peer`.
    fn send(&mut self, peer: ReplicaId, message: Message);
}

/// Everything a protocol instance is constructed from.
pub struct ReplicaContext {
    pub replica: ReplicaId,
    pub node: NodeId,
    pub replicas: Vec<ReplicaId>,
    pub signatures: Arc<SignatureCache<Ed25519Scheme>>,
    pub leaders: Arc<dyn LeaderRotation>,
    pub view_timeout_ticks: u64,
    pub network: Box<dyn Network>,
    pub event_publisher: Option<Sender<Event>>,
}

/// Number of signatures a certificate needs among `num_replicas` replicas: `n - f`, where
/// `f = (n - 1) / 3`.
pub fn quorum_size(num_replicas: usize) -> usize {
    if num_replicas == 0 {
        return 0;
    }
    num_replicas - (num_replicas - 1) / 3
}

/// A structurally impossible message, together with the place in the protocol code that noticed it.
///
/// `message` describes what is wrong and is the same every time a given check fails. The hashes,
/// views, and replicas involved go in `detail`.
#[derive(Clone, Debug)]
pub struct ProtocolFault {
    location: &'static Location<'static>,
    message: &'static str,
    detail: String,
}

impl ProtocolFault {
    #[track_caller]
    pub fn new(message: &'static str) -> Self {
        Self {
            location: Location::caller(),
            message,
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn message(&self) -> &'static str {
        self.message
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl Display for ProtocolFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.location.file(),
            self.location.line(),
            self.message
        )?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolFault {}
