/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the caller enabled them via the executor's
//! [config](crate::twins::executor::ExecutionConfig::log_events).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least three values. The first three values
//! are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//! 3. The simulated instance (node id) that emitted the event.
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [ReceiveProposal](crate::events::ReceiveProposalEvent) is printed:
//!
//! ```text
//! ReceiveProposal, 1701329264, 3, 1, fNGCJyk, 2
//! ```
//!
//! In the snippet:
//! - The fourth value is the replica id of the origin of the proposal.
//! - The fifth value is the first seven characters of the Base64 encoding of the hash of the proposed
//!   block.
//! - The sixth value is the view of the proposed block.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::{events::*, types::basic::NodeId};

// Names of each event in PascalCase for printing:
pub const INSERT_BLOCK: &str = "InsertBlock";
pub const COMMIT_BLOCK: &str = "CommitBlock";

pub const PROPOSE: &str = "Propose";
pub const VOTE: &str = "Vote";
pub const NEW_VIEW: &str = "NewView";
pub const TIMEOUT: &str = "Timeout";

pub const RECEIVE_PROPOSAL: &str = "ReceiveProposal";
pub const RECEIVE_VOTE: &str = "ReceiveVote";

pub const START_VIEW: &str = "StartView";
pub const COLLECT_QC: &str = "CollectQC";
pub const COLLECT_TC: &str = "CollectTC";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send>;
}

/// Print `event`, emitted by `node`, with the default logging handler for its type.
pub(crate) fn log_event(node: NodeId, event: &Event) {
    match event {
        Event::InsertBlock(e) => InsertBlockEvent::get_logger()(node, e),
        Event::CommitBlock(e) => CommitBlockEvent::get_logger()(node, e),
        Event::Propose(e) => ProposeEvent::get_logger()(node, e),
        Event::Vote(e) => VoteEvent::get_logger()(node, e),
        Event::NewView(e) => NewViewEvent::get_logger()(node, e),
        Event::Timeout(e) => TimeoutEvent::get_logger()(node, e),
        Event::ReceiveProposal(e) => ReceiveProposalEvent::get_logger()(node, e),
        Event::ReceiveVote(e) => ReceiveVoteEvent::get_logger()(node, e),
        Event::StartView(e) => StartViewEvent::get_logger()(node, e),
        Event::CollectQC(e) => CollectQCEvent::get_logger()(node, e),
        Event::CollectTC(e) => CollectTCEvent::get_logger()(node, e),
    }
}

impl Logger for InsertBlockEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, insert_block_event: &InsertBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                INSERT_BLOCK,
                secs_since_unix_epoch(insert_block_event.timestamp),
                node,
                first_seven_base64_chars(&insert_block_event.block.hash().bytes()),
                insert_block_event.block.view()
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitBlockEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, commit_block_event: &CommitBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                COMMIT_BLOCK,
                secs_since_unix_epoch(commit_block_event.timestamp),
                node,
                first_seven_base64_chars(&commit_block_event.block.bytes()),
                commit_block_event.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for ProposeEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, propose_event: &ProposeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                PROPOSE,
                secs_since_unix_epoch(propose_event.timestamp),
                node,
                first_seven_base64_chars(&propose_event.proposal.block.hash().bytes()),
                propose_event.proposal.block.view()
            )
        };
        Box::new(logger)
    }
}

impl Logger for VoteEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, vote_event: &VoteEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                VOTE,
                secs_since_unix_epoch(vote_event.timestamp),
                node,
                first_seven_base64_chars(&vote_event.vote.block.bytes()),
                vote_event.vote.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for NewViewEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, new_view_event: &NewViewEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                NEW_VIEW,
                secs_since_unix_epoch(new_view_event.timestamp),
                node,
                new_view_event.leader,
                new_view_event.new_view.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for TimeoutEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, timeout_event: &TimeoutEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                TIMEOUT,
                secs_since_unix_epoch(timeout_event.timestamp),
                node,
                timeout_event.timeout.view,
                timeout_event.timeout.high_qc.view()
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveProposalEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, receive_proposal_event: &ReceiveProposalEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_PROPOSAL,
                secs_since_unix_epoch(receive_proposal_event.timestamp),
                node,
                receive_proposal_event.origin,
                first_seven_base64_chars(&receive_proposal_event.proposal.block.hash().bytes()),
                receive_proposal_event.proposal.block.view()
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveVoteEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, receive_vote_event: &ReceiveVoteEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_VOTE,
                secs_since_unix_epoch(receive_vote_event.timestamp),
                node,
                receive_vote_event.origin,
                first_seven_base64_chars(&receive_vote_event.vote.block.bytes()),
                receive_vote_event.vote.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartViewEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, start_view_event: &StartViewEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                START_VIEW,
                secs_since_unix_epoch(start_view_event.timestamp),
                node,
                start_view_event
                    .leader
                    .map_or(String::from("none"), |leader| leader.to_string()),
                start_view_event.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectQCEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, collect_qc_event: &CollectQCEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                COLLECT_QC,
                secs_since_unix_epoch(collect_qc_event.timestamp),
                node,
                first_seven_base64_chars(&collect_qc_event.quorum_certificate.block_hash().bytes()),
                collect_qc_event.quorum_certificate.view()
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectTCEvent {
    fn get_logger() -> Box<dyn Fn(NodeId, &Self) + Send> {
        let logger = |node: NodeId, collect_tc_event: &CollectTCEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                COLLECT_TC,
                secs_since_unix_epoch(collect_tc_event.timestamp),
                node,
                collect_tc_event.timeout_certificate.view(),
                collect_tc_event.timeout_certificate.signatures().len()
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}
