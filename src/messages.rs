/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Messages exchanged between protocol instances.
//!
//! The set of messages is closed: a [`Message`] is always exactly one of a [`Proposal`], a [`Vote`], a
//! [`TimeoutMsg`] or a [`NewView`]. Every message belongs to a view ([`Message::view`]); the executor
//! uses that view to decide which partition assignment governs the message's delivery.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    basic::{CryptoHash, ViewNumber},
    block::Block,
    certificates::{QuorumCertificate, Signature, SyncInfo},
};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Message {
    Propose(Proposal),
    Vote(Vote),
    Timeout(TimeoutMsg),
    NewView(NewView),
}

impl Message {
    /// The view this message belongs to.
    pub fn view(&self) -> ViewNumber {
        match self {
            Message::Propose(proposal) => proposal.block.view(),
            Message::Vote(vote) => vote.view,
            Message::Timeout(timeout) => timeout.view,
            Message::NewView(new_view) => new_view.view,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Propose(_) => "Propose",
            Message::Vote(_) => "Vote",
            Message::Timeout(_) => "Timeout",
            Message::NewView(_) => "NewView",
        }
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Message::Propose(proposal) => write!(
                f,
                "Propose(view {}, block {}, proposer {})",
                proposal.block.view(),
                proposal.block.hash(),
                proposal.block.proposer()
            ),
            Message::Vote(vote) => write!(
                f,
                "Vote(view {}, block {}, signer {})",
                vote.view,
                vote.block,
                vote.signature.signer()
            ),
            Message::Timeout(timeout) => write!(
                f,
                "Timeout(view {}, signer {}, high qc view {})",
                timeout.view,
                timeout.signature.signer(),
                timeout.high_qc.view()
            ),
            Message::NewView(new_view) => write!(
                f,
                "NewView(view {}, qc view {}, tc view {})",
                new_view.view,
                new_view
                    .sync_info
                    .qc()
                    .map_or(String::from("-"), |qc| qc.view().to_string()),
                new_view
                    .sync_info
                    .tc()
                    .map_or(String::from("-"), |tc| tc.view().to_string())
            ),
        }
    }
}

/// A leader's proposal of a new block for the block's view.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Proposal {
    pub block: Block,
}

impl From<Proposal> for Message {
    fn from(value: Proposal) -> Self {
        Message::Propose(value)
    }
}

/// A replica's vote for `block`, sent to the leader of the next view.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Vote {
    pub view: ViewNumber,
    pub block: CryptoHash,
    pub signature: Signature,
}

impl From<Vote> for Message {
    fn from(value: Vote) -> Self {
        Message::Vote(value)
    }
}

/// Broadcast by a replica whose view timer expired. The signature is over the view hash, and the
/// replica's highest quorum certificate rides along so that the next leader can extend it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TimeoutMsg {
    pub view: ViewNumber,
    pub signature: Signature,
    pub high_qc: QuorumCertificate,
}

impl From<TimeoutMsg> for Message {
    fn from(value: TimeoutMsg) -> Self {
        Message::Timeout(value)
    }
}

/// Sent to the leader of `view` by a replica that just entered it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NewView {
    pub view: ViewNumber,
    pub sync_info: SyncInfo,
}

impl From<NewView> for Message {
    fn from(value: NewView) -> Self {
        Message::NewView(value)
    }
}
