/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of events published by protocol instances.
//!
//! Note: an event for a given action indicates that the action has been completed.
//!
//! Each instance publishes on its own channel, so the receiving end always knows which instance an
//! event came from. The executor drains these channels to build the per-instance commit log, and,
//! if enabled, prints every event through [`logging`](crate::logging).

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::{
    messages::{NewView, Proposal, TimeoutMsg, Vote},
    types::{
        basic::{CryptoHash, ReplicaId, ViewNumber},
        block::Block,
        certificates::{QuorumCertificate, TimeoutCertificate},
    },
};

pub enum Event {
    // Events that change the local chain.
    InsertBlock(InsertBlockEvent),
    CommitBlock(CommitBlockEvent),
    // Events that involve broadcasting/sending a message.
    Propose(ProposeEvent),
    Vote(VoteEvent),
    NewView(NewViewEvent),
    Timeout(TimeoutEvent),
    // Events that involve receiving a message.
    ReceiveProposal(ReceiveProposalEvent),
    ReceiveVote(ReceiveVoteEvent),
    // View synchronization events.
    StartView(StartViewEvent),
    CollectQC(CollectQCEvent),
    CollectTC(CollectTCEvent),
}

impl Event {
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            // The receiving end goes away when a run is torn down; events after that are not needed.
            let _ = event_publisher.send(self);
        }
    }
}

pub struct InsertBlockEvent {
    pub timestamp: SystemTime,
    pub block: Block,
}

pub struct CommitBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub view: ViewNumber,
}

pub struct ProposeEvent {
    pub timestamp: SystemTime,
    pub proposal: Proposal,
}

pub struct VoteEvent {
    pub timestamp: SystemTime,
    pub vote: Vote,
}

pub struct NewViewEvent {
    pub timestamp: SystemTime,
    pub leader: ReplicaId,
    pub new_view: NewView,
}

pub struct TimeoutEvent {
    pub timestamp: SystemTime,
    pub timeout: TimeoutMsg,
}

pub struct ReceiveProposalEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaId,
    pub proposal: Proposal,
}

pub struct ReceiveVoteEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaId,
    pub vote: Vote,
}

pub struct StartViewEvent {
    pub timestamp: SystemTime,
    pub leader: Option<ReplicaId>,
    pub view: ViewNumber,
}

pub struct CollectQCEvent {
    pub timestamp: SystemTime,
    pub quorum_certificate: QuorumCertificate,
}

pub struct CollectTCEvent {
    pub timestamp: SystemTime,
    pub timeout_certificate: TimeoutCertificate,
}
