/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The simulated network of a single run.
//!
//! Instances hand their outgoing messages to an [`Outbox`], which passes them through a channel to
//! the [`PartitionedNetwork`]. The network numbers every message with a 1-based ordinal as it collects
//! it, and holds it until the executor asks for the next batch. Whether a message reaches a given
//! instance is decided at delivery time by the partition assignment of the message's view.

use std::{
    fmt::Write as _,
    sync::mpsc::{self, Receiver, Sender},
};

use crate::{
    consensus::Network,
    messages::Message,
    types::basic::{NodeId, ReplicaId},
};

use super::scenario::Scenario;

/// Who a message is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipients {
    /// Every instance, including the sender.
    All,
    /// Every instance that runs as the given replica.
    Replica(ReplicaId),
}

/// A message as it was sent, together with its ordinal and its addressing.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub ordinal: u64,
    pub sender: NodeId,
    pub origin: ReplicaId,
    pub recipients: Recipients,
    pub message: Message,
}

/// A message that will be handed to a receiving instance.
pub(crate) struct Delivery {
    pub(crate) ordinal: u64,
    pub(crate) receiver: NodeId,
    pub(crate) origin: ReplicaId,
    pub(crate) message: Message,
}

struct Outgoing {
    sender: NodeId,
    origin: ReplicaId,
    recipients: Recipients,
    message: Message,
}

/// The [`Network`] handle given to one instance.
pub(crate) struct Outbox {
    node: NodeId,
    replica: ReplicaId,
    sender: Sender<Outgoing>,
}

impl Network for Outbox {
    fn broadcast(&mut self, message: Message) {
        let _ = self.sender.send(Outgoing {
            sender: self.node,
            origin: self.replica,
            recipients: Recipients::All,
            message,
        });
    }

    fn send(&mut self, peer: ReplicaId, message: Message) {
        let _ = self.sender.send(Outgoing {
            sender: self.node,
            origin: self.replica,
            recipients: Recipients::Replica(peer),
            message,
        });
    }
}

/// A message to swap in for the message with the given ordinal, right before it is delivered.
#[derive(Clone, Debug)]
pub struct Injection {
    pub ordinal: u64,
    pub replacement: Message,
}

pub(crate) struct PartitionedNetwork {
    scenario: Scenario,
    nodes: Vec<(NodeId, ReplicaId)>,
    injection: Option<Injection>,
    injected: bool,
    next_ordinal: u64,
    pending: Vec<Envelope>,
    messages: Vec<Envelope>,
    log: String,
    outgoing_sender: Sender<Outgoing>,
    outgoing_receiver: Receiver<Outgoing>,
}

impl PartitionedNetwork {
    /// `nodes` lists every instance with the replica it runs as, in ascending node id order.
    pub(crate) fn new(
        scenario: Scenario,
        nodes: Vec<(NodeId, ReplicaId)>,
        injection: Option<Injection>,
    ) -> Self {
        let (outgoing_sender, outgoing_receiver) = mpsc::channel();
        Self {
            scenario,
            nodes,
            injection,
            injected: false,
            next_ordinal: 1,
            pending: Vec::new(),
            messages: Vec::new(),
            log: String::new(),
            outgoing_sender,
            outgoing_receiver,
        }
    }

    pub(crate) fn outbox(&self, node: NodeId, replica: ReplicaId) -> Outbox {
        Outbox {
            node,
            replica,
            sender: self.outgoing_sender.clone(),
        }
    }

    /// Number every message sent since the last call, and queue it for the next batch.
    pub(crate) fn collect_sent(&mut self) {
        while let Ok(outgoing) = self.outgoing_receiver.try_recv() {
            let envelope = Envelope {
                ordinal: self.next_ordinal,
                sender: outgoing.sender,
                origin: outgoing.origin,
                recipients: outgoing.recipients,
                message: outgoing.message,
            };
            self.next_ordinal += 1;

            let _ = writeln!(
                self.log,
                "send #{} node {} -> {}: {}",
                envelope.ordinal,
                envelope.sender,
                match envelope.recipients {
                    Recipients::All => String::from("all"),
                    Recipients::Replica(replica) => format!("replica {}", replica),
                },
                envelope.message
            );
            self.messages.push(envelope.clone());
            self.pending.push(envelope);
        }
    }

    /// Take every queued message and resolve it into deliveries, in ascending ordinal order, and for
    /// each message in ascending receiver order. Messages that may not travel are dropped and logged.
    pub(crate) fn next_batch(&mut self) -> Vec<Delivery> {
        let batch = std::mem::take(&mut self.pending);
        let mut deliveries = Vec::new();

        for mut envelope in batch {
            let is_injected = match &self.injection {
                Some(injection) if injection.ordinal == envelope.ordinal => {
                    envelope.message = injection.replacement.clone();
                    let _ = writeln!(
                        self.log,
                        "inject #{}: {}",
                        envelope.ordinal, envelope.message
                    );
                    log::debug!("injecting {} as message #{}", envelope.message, envelope.ordinal);
                    true
                }
                _ => false,
            };

            let view = envelope.message.view();
            let Some(schedule) = self.scenario.schedule(view) else {
                let _ = writeln!(
                    self.log,
                    "drop #{}: view {} is not scheduled",
                    envelope.ordinal, view
                );
                continue;
            };

            for (receiver, replica) in &self.nodes {
                let addressed = match envelope.recipients {
                    Recipients::All => true,
                    Recipients::Replica(target) => target == *replica,
                };
                if !addressed {
                    continue;
                }

                if schedule.connected(&envelope.sender, receiver) {
                    let _ = writeln!(
                        self.log,
                        "deliver #{} node {} -> node {}",
                        envelope.ordinal, envelope.sender, receiver
                    );
                    if is_injected {
                        self.injected = true;
                    }
                    deliveries.push(Delivery {
                        ordinal: envelope.ordinal,
                        receiver: *receiver,
                        origin: envelope.origin,
                        message: envelope.message.clone(),
                    });
                } else {
                    let _ = writeln!(
                        self.log,
                        "drop #{} node {} -> node {}: partitioned in view {}",
                        envelope.ordinal, envelope.sender, receiver, view
                    );
                    log::trace!(
                        "dropping message #{} from node {} to node {}",
                        envelope.ordinal,
                        envelope.sender,
                        receiver
                    );
                }
            }
        }

        deliveries
    }

    pub(crate) fn injected(&self) -> bool {
        self.injected
    }

    pub(crate) fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The textual log and the list of sent messages.
    pub(crate) fn into_records(self) -> (String, Vec<Envelope>) {
        (self.log, self.messages)
    }
}
