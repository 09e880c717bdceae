/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven implementation of the parts that chained HotStuff variants share.
//!
//! Main type: [`ConsensusBase`].

use std::{
    sync::{mpsc::Sender, Arc},
    time::SystemTime,
};

use crate::{
    crypto::{Ed25519Scheme, SignatureCache},
    events::{
        CollectQCEvent, CollectTCEvent, CommitBlockEvent, Event, InsertBlockEvent, NewViewEvent,
        ProposeEvent, ReceiveProposalEvent, ReceiveVoteEvent, StartViewEvent, TimeoutEvent,
        VoteEvent,
    },
    messages::{Message, NewView, Proposal, TimeoutMsg, Vote},
    types::{
        basic::{Command, CryptoHash, NodeId, ReplicaId, ViewNumber},
        block::Block,
        certificates::{QuorumCertificate, SyncInfo, TimeoutCertificate},
    },
};

use super::{
    block_chain::BlockChain,
    collectors::{TimeoutCollector, VoteCollector},
    quorum_size,
    rules::{Rules, SafetyState},
    Consensus, LeaderRotation, Network, ProtocolFault, ReplicaContext,
};

/// A single HotStuff protocol instance whose voting, locking, and commit rules are given by `R`.
///
/// # Usage
///
/// `ConsensusBase` is meant to be used in an "event-oriented" fashion through the [`Consensus`]
/// trait:
/// 1. [`start`](Consensus::start): called once, enters view 1.
/// 2. [`on_receive_msg`](Consensus::on_receive_msg): called when a message for this instance is
///    delivered.
/// 3. [`on_tick`](Consensus::on_tick): called once per tick of the simulated clock. When the instance
///    spends `view_timeout_ticks` ticks in one view, it broadcasts a timeout for that view.
///
/// ## View synchronization
///
/// The instance moves to view `v + 1` as soon as it learns a valid quorum certificate or timeout
/// certificate for a view `v` at or above its current view. On entering a view, the leader of that
/// view proposes a block extending the highest quorum certificate, and everyone else sends a
/// [`NewView`] to the leader.
pub struct ConsensusBase<R: Rules> {
    rules: R,
    replica: ReplicaId,
    node: NodeId,
    signatures: Arc<SignatureCache<Ed25519Scheme>>,
    leaders: Arc<dyn LeaderRotation>,
    view_timeout_ticks: u64,
    network: Box<dyn Network>,
    event_publisher: Option<Sender<Event>>,
    chain: BlockChain,
    safety: SafetyState,
    executed: CryptoHash,
    high_qc: QuorumCertificate,
    high_tc: Option<TimeoutCertificate>,
    current_view: ViewNumber,
    view_ticks: u64,
    last_proposed: ViewNumber,
    votes: VoteCollector,
    timeouts: TimeoutCollector,
    committed: Vec<CryptoHash>,
}

impl<R: Rules> ConsensusBase<R> {
    pub fn new(context: ReplicaContext) -> Self {
        let quorum = quorum_size(context.replicas.len());
        Self {
            rules: R::default(),
            replica: context.replica,
            node: context.node,
            signatures: context.signatures,
            leaders: context.leaders,
            view_timeout_ticks: context.view_timeout_ticks,
            network: context.network,
            event_publisher: context.event_publisher,
            chain: BlockChain::new(),
            safety: SafetyState::new(),
            executed: Block::genesis_hash(),
            high_qc: QuorumCertificate::genesis(),
            high_tc: None,
            current_view: ViewNumber::init(),
            view_ticks: 0,
            last_proposed: ViewNumber::init(),
            votes: VoteCollector::new(&context.replicas, quorum),
            timeouts: TimeoutCollector::new(&context.replicas, quorum),
            committed: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        R::NAME
    }

    pub fn chain(&self) -> &BlockChain {
        &self.chain
    }

    /// Hashes of the blocks this instance committed, in commit order.
    pub fn committed(&self) -> &[CryptoHash] {
        &self.committed
    }

    pub fn high_qc(&self) -> &QuorumCertificate {
        &self.high_qc
    }

    pub fn locked(&self) -> CryptoHash {
        self.safety.locked
    }

    /// Process a newly received `proposal`.
    fn on_receive_proposal(
        &mut self,
        origin: ReplicaId,
        proposal: Proposal,
    ) -> Result<(), ProtocolFault> {
        Event::ReceiveProposal(ReceiveProposalEvent {
            timestamp: SystemTime::now(),
            origin,
            proposal: proposal.clone(),
        })
        .publish(&self.event_publisher);

        // 1. Reject proposals that no correct replica could have sent.
        let block = proposal.block;
        if block.view() == ViewNumber::init() {
            return Err(ProtocolFault::new("proposal for view 0"));
        }
        let Some(qc) = block.justify() else {
            return Err(ProtocolFault::new("proposal carries no quorum certificate")
                .with_detail(format!("view {}", block.view())));
        };
        if block.parent() != qc.block_hash() {
            return Err(
                ProtocolFault::new("block parent differs from its certificate's block").with_detail(
                    format!(
                        "block {}, parent {}, certified {}",
                        block.hash(),
                        block.parent(),
                        qc.block_hash()
                    ),
                ),
            );
        }
        if block.proposer() != origin {
            return Err(
                ProtocolFault::new("proposal was sent by a replica other than its proposer")
                    .with_detail(format!("proposer {}, sender {}", block.proposer(), origin)),
            );
        }

        // 2. Ignore proposals from anyone but the leader, and proposals with an invalid certificate.
        if self.leaders.leader(block.view()) != Some(origin) {
            log::debug!(
                "node {}: ignoring proposal for view {} from non-leader {}",
                self.node,
                block.view(),
                origin
            );
            return Ok(());
        }
        if !self.is_valid_qc(qc) {
            log::debug!(
                "node {}: ignoring proposal for view {} with an invalid certificate",
                self.node,
                block.view()
            );
            return Ok(());
        }

        // 3. Catch up with the certificate, then drop the proposal if it is for a past view.
        self.advance_view(&SyncInfo::new().with_qc(qc.clone()));
        if block.view() < self.current_view {
            log::debug!(
                "node {}: ignoring stale proposal for view {} in view {}",
                self.node,
                block.view(),
                self.current_view
            );
            return Ok(());
        }

        // 4. Store the block. Until its whole ancestry is known, neither commit nor vote on it.
        self.insert_block(&block);
        if !self.chain.has_ancestry(&block) {
            log::debug!(
                "node {}: holding back block {} of view {}: ancestry unknown",
                self.node,
                block.hash(),
                block.view()
            );
            return Ok(());
        }

        // 5. Commit whatever the block completes.
        if let Some(commit) = self
            .rules
            .commit_rule(&self.chain, &mut self.safety, &block)
        {
            self.commit(commit);
        }

        // 6. Vote, if I have not voted in this view yet and the rules allow it.
        if block.view() > self.safety.last_vote
            && self
                .rules
                .vote_rule(&self.chain, &self.safety, &block, self.current_view)
        {
            self.vote(&block);
        }

        Ok(())
    }

    fn on_receive_vote(&mut self, origin: ReplicaId, vote: Vote) -> Result<(), ProtocolFault> {
        Event::ReceiveVote(ReceiveVoteEvent {
            timestamp: SystemTime::now(),
            origin,
            vote: vote.clone(),
        })
        .publish(&self.event_publisher);

        if vote.signature.signer() != origin {
            return Err(
                ProtocolFault::new("vote was sent by a replica other than its signer").with_detail(
                    format!("signer {}, sender {}", vote.signature.signer(), origin),
                ),
            );
        }

        // Votes of view v are collected by the leader of view v + 1, which is at most in view v + 1.
        if vote.view + 1 < self.current_view {
            return Ok(());
        }
        match self.chain.get(&vote.block) {
            Some(block) if block.view() == vote.view => {}
            _ => {
                log::trace!(
                    "node {}: ignoring vote for unknown block {}",
                    self.node,
                    vote.block
                );
                return Ok(());
            }
        }
        if !self.signatures.verify(&vote.signature, &vote.block) {
            log::debug!(
                "node {}: ignoring vote with an invalid signature from {}",
                self.node,
                origin
            );
            return Ok(());
        }

        if let Some(qc) = self.votes.collect(vote.view, vote.block, vote.signature) {
            Event::CollectQC(CollectQCEvent {
                timestamp: SystemTime::now(),
                quorum_certificate: qc.clone(),
            })
            .publish(&self.event_publisher);
            self.advance_view(&SyncInfo::new().with_qc(qc));
        }

        Ok(())
    }

    fn on_receive_timeout(
        &mut self,
        origin: ReplicaId,
        timeout: TimeoutMsg,
    ) -> Result<(), ProtocolFault> {
        if timeout.view == ViewNumber::init() {
            return Err(ProtocolFault::new("timeout for view 0"));
        }
        if timeout.signature.signer() != origin {
            return Err(
                ProtocolFault::new("timeout was sent by a replica other than its signer")
                    .with_detail(format!(
                        "signer {}, sender {}",
                        timeout.signature.signer(),
                        origin
                    )),
            );
        }

        if timeout.view < self.current_view {
            return Ok(());
        }
        if !self
            .signatures
            .verify(&timeout.signature, &timeout.view.to_hash())
            || !self.is_valid_qc(&timeout.high_qc)
        {
            log::debug!(
                "node {}: ignoring invalid timeout for view {} from {}",
                self.node,
                timeout.view,
                origin
            );
            return Ok(());
        }

        if timeout.high_qc.view() > self.high_qc.view() {
            self.advance_view(&SyncInfo::new().with_qc(timeout.high_qc.clone()));
        }

        if let Some((tc, highest_qc)) =
            self.timeouts
                .collect(timeout.view, timeout.signature, timeout.high_qc)
        {
            Event::CollectTC(CollectTCEvent {
                timestamp: SystemTime::now(),
                timeout_certificate: tc.clone(),
            })
            .publish(&self.event_publisher);
            self.advance_view(&SyncInfo::new().with_tc(tc).with_qc(highest_qc));
        }

        Ok(())
    }

    fn on_receive_new_view(
        &mut self,
        _origin: ReplicaId,
        new_view: NewView,
    ) -> Result<(), ProtocolFault> {
        if new_view.view == ViewNumber::init() {
            return Err(ProtocolFault::new("new view message for view 0"));
        }
        self.advance_view(&new_view.sync_info);
        Ok(())
    }

    /// Move to the view after the highest view certified in `sync_info`, if that is not behind the
    /// current view. Invalid certificates are ignored.
    fn advance_view(&mut self, sync_info: &SyncInfo) {
        let mut certified_view = None;

        if let Some(tc) = sync_info.tc() {
            if !tc.has_distinct_signers() || !self.signatures.verify_timeout_cert(tc) {
                log::debug!("node {}: ignoring invalid timeout certificate", self.node);
                return;
            }
            if self
                .high_tc
                .as_ref()
                .map_or(true, |high_tc| tc.view() > high_tc.view())
            {
                self.high_tc = Some(tc.clone());
            }
            certified_view = Some(tc.view());
        }

        if let Some(qc) = sync_info.qc() {
            if !self.is_valid_qc(qc) {
                log::debug!("node {}: ignoring invalid quorum certificate", self.node);
                return;
            }
            if qc.view() > self.high_qc.view() {
                self.high_qc = qc.clone();
            }
            if certified_view.map_or(true, |view| qc.view() >= view) {
                certified_view = Some(qc.view());
            }
        }

        match certified_view {
            Some(view) if view >= self.current_view => self.enter_view(view + 1),
            _ => {}
        }
    }

    fn enter_view(&mut self, view: ViewNumber) {
        self.current_view = view;
        self.view_ticks = 0;
        self.votes.prune_below(view - 1);
        self.timeouts.prune_below(view);

        let leader = self.leaders.leader(view);
        Event::StartView(StartViewEvent {
            timestamp: SystemTime::now(),
            leader,
            view,
        })
        .publish(&self.event_publisher);
        log::trace!("node {}: entered view {}", self.node, view);

        match leader {
            Some(leader) if leader == self.replica => self.propose(),
            Some(leader) => {
                let new_view = NewView {
                    view,
                    sync_info: self.sync_info(),
                };
                Event::NewView(NewViewEvent {
                    timestamp: SystemTime::now(),
                    leader,
                    new_view: new_view.clone(),
                })
                .publish(&self.event_publisher);
                self.network.send(leader, new_view.into());
            }
            None => {}
        }
    }

    /// Propose a block extending the highest quorum certificate, at most once per view.
    fn propose(&mut self) {
        if self.last_proposed >= self.current_view {
            return;
        }
        self.last_proposed = self.current_view;

        // The node id makes the blocks of twin leaders differ, so that twins equivocate.
        let command = Command::new(
            format!("node {} view {}", self.node, self.current_view).into_bytes(),
        );
        let block = Block::new(
            self.high_qc.block_hash(),
            Some(self.high_qc.clone()),
            command,
            self.current_view,
            self.replica,
        );
        self.insert_block(&block);

        let proposal = Proposal { block };
        Event::Propose(ProposeEvent {
            timestamp: SystemTime::now(),
            proposal: proposal.clone(),
        })
        .publish(&self.event_publisher);
        self.network.broadcast(proposal.into());
    }

    fn vote(&mut self, block: &Block) {
        self.safety.last_vote = block.view();
        let vote = Vote {
            view: block.view(),
            block: block.hash(),
            signature: self.signatures.sign(&block.hash()),
        };
        Event::Vote(VoteEvent {
            timestamp: SystemTime::now(),
            vote: vote.clone(),
        })
        .publish(&self.event_publisher);

        match self.leaders.leader(block.view() + 1) {
            Some(next_leader) => self.network.send(next_leader, vote.into()),
            None => log::trace!(
                "node {}: view {} has no leader to send the vote to",
                self.node,
                block.view() + 1
            ),
        }
    }

    /// Broadcast a timeout for the current view, and stop voting in it.
    fn on_local_timeout(&mut self) {
        let view = self.current_view;
        if self.safety.last_vote < view {
            self.safety.last_vote = view;
        }

        let timeout = TimeoutMsg {
            view,
            signature: self.signatures.sign(&view.to_hash()),
            high_qc: self.high_qc.clone(),
        };
        Event::Timeout(TimeoutEvent {
            timestamp: SystemTime::now(),
            timeout: timeout.clone(),
        })
        .publish(&self.event_publisher);
        self.network.broadcast(timeout.into());
    }

    /// Commit the block with hash `hash`, and every uncommitted ancestor of it, oldest first. Nothing
    /// is committed unless every block between `hash` and the last committed block is stored.
    fn commit(&mut self, hash: CryptoHash) {
        let executed_view = self
            .chain
            .get(&self.executed)
            .map_or(ViewNumber::init(), Block::view);

        let mut to_commit = Vec::new();
        let mut cursor = hash;
        loop {
            let Some(block) = self.chain.get(&cursor) else {
                log::debug!(
                    "node {}: not committing {}: ancestor {} is unknown",
                    self.node,
                    hash,
                    cursor
                );
                return;
            };
            if block.view() <= executed_view {
                break;
            }
            to_commit.push((block.hash(), block.view()));
            cursor = block.parent();
        }

        for (block, view) in to_commit.into_iter().rev() {
            self.executed = block;
            self.committed.push(block);
            Event::CommitBlock(CommitBlockEvent {
                timestamp: SystemTime::now(),
                block,
                view,
            })
            .publish(&self.event_publisher);
        }
    }

    fn insert_block(&mut self, block: &Block) {
        if self.chain.contains(&block.hash()) {
            return;
        }
        self.chain.insert(block.clone());
        Event::InsertBlock(InsertBlockEvent {
            timestamp: SystemTime::now(),
            block: block.clone(),
        })
        .publish(&self.event_publisher);
    }

    /// A certificate is valid if its signers are distinct, its signatures form a quorum, and, when the
    /// certified block is known, it was certified in the block's own view.
    fn is_valid_qc(&self, qc: &QuorumCertificate) -> bool {
        qc.has_distinct_signers()
            && self.signatures.verify_quorum_cert(qc)
            && self
                .chain
                .get(&qc.block_hash())
                .map_or(true, |block| block.view() == qc.view())
    }

    fn sync_info(&self) -> SyncInfo {
        let sync_info = SyncInfo::new().with_qc(self.high_qc.clone());
        match &self.high_tc {
            Some(tc) if tc.view() > self.high_qc.view() => sync_info.with_tc(tc.clone()),
            _ => sync_info,
        }
    }
}

impl<R: Rules> Consensus for ConsensusBase<R> {
    fn start(&mut self) -> Result<(), ProtocolFault> {
        self.advance_view(&SyncInfo::new().with_qc(QuorumCertificate::genesis()));
        Ok(())
    }

    fn on_receive_msg(&mut self, origin: ReplicaId, msg: Message) -> Result<(), ProtocolFault> {
        match msg {
            Message::Propose(proposal) => self.on_receive_proposal(origin, proposal),
            Message::Vote(vote) => self.on_receive_vote(origin, vote),
            Message::Timeout(timeout) => self.on_receive_timeout(origin, timeout),
            Message::NewView(new_view) => self.on_receive_new_view(origin, new_view),
        }
    }

    fn on_tick(&mut self) -> Result<(), ProtocolFault> {
        self.view_ticks += 1;
        if self.view_ticks >= self.view_timeout_ticks {
            self.view_ticks = 0;
            self.on_local_timeout();
        }
        Ok(())
    }

    fn current_view(&self) -> ViewNumber {
        self.current_view
    }
}
