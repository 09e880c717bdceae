/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Seeded generation and mutation of protocol messages.
//!
//! Generated values are biased towards the small ranges a four-replica, four-view run actually uses
//! (views `0..=max_view + 1`, replicas `0..=num_replicas + 1`), so that a good share of the generated
//! messages get past the cheap checks and reach the deeper parts of the protocol. Signatures are random
//! bytes and never verify.

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

use crate::{
    messages::{Message, NewView, Proposal, TimeoutMsg, Vote},
    types::{
        basic::{Command, CryptoHash, ReplicaId, SignatureBytes, ViewNumber},
        block::Block,
        certificates::{QuorumCertificate, Signature, SyncInfo, TimeoutCertificate},
    },
};

/// The message [`MessageMutator::random_message`] produces first for `seed`.
pub fn message_from_seed(seed: u64, num_replicas: u32) -> Message {
    MessageMutator::new(seed, num_replicas).random_message()
}

pub struct MessageMutator {
    rng: StdRng,
    num_replicas: u32,
    max_view: u64,
}

impl MessageMutator {
    pub fn new(seed: u64, num_replicas: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            num_replicas,
            max_view: 4,
        }
    }

    /// Generate views up to `max_view + 1` instead of the default 5.
    pub fn with_max_view(mut self, max_view: u64) -> Self {
        self.max_view = max_view;
        self
    }

    pub fn random_message(&mut self) -> Message {
        match self.rng.gen_range(0, 4) {
            0 => Proposal {
                block: self.random_block(),
            }
            .into(),
            1 => Vote {
                view: self.random_view(),
                block: self.random_hash(),
                signature: self.random_signature(),
            }
            .into(),
            2 => TimeoutMsg {
                view: self.random_view(),
                signature: self.random_signature(),
                high_qc: self.random_qc(),
            }
            .into(),
            _ => NewView {
                view: self.random_view(),
                sync_info: self.random_sync_info(),
            }
            .into(),
        }
    }

    /// Change one part of `message`. One time in ten the message is replaced entirely.
    pub fn mutate(&mut self, message: &Message) -> Message {
        if self.rng.gen_bool(0.1) {
            return self.random_message();
        }

        match message {
            Message::Propose(proposal) => {
                let block = &proposal.block;
                let mut parent = block.parent();
                let mut justify = block.justify().cloned();
                let mut command = block.command().clone();
                let mut view = block.view();
                let mut proposer = block.proposer();
                match self.rng.gen_range(0, 5) {
                    0 => parent = self.random_hash(),
                    1 => justify = self.maybe(Self::random_qc),
                    2 => command = self.random_command(),
                    3 => view = self.random_view(),
                    _ => proposer = self.random_replica(),
                }
                Proposal {
                    block: Block::new(parent, justify, command, view, proposer),
                }
                .into()
            }
            Message::Vote(vote) => {
                let mut vote = vote.clone();
                match self.rng.gen_range(0, 3) {
                    0 => vote.view = self.random_view(),
                    1 => vote.block = self.random_hash(),
                    _ => vote.signature = self.random_signature(),
                }
                vote.into()
            }
            Message::Timeout(timeout) => {
                let mut timeout = timeout.clone();
                match self.rng.gen_range(0, 3) {
                    0 => timeout.view = self.random_view(),
                    1 => timeout.signature = self.random_signature(),
                    _ => timeout.high_qc = self.random_qc(),
                }
                timeout.into()
            }
            Message::NewView(new_view) => {
                let mut new_view = new_view.clone();
                match self.rng.gen_range(0, 2) {
                    0 => new_view.view = self.random_view(),
                    _ => new_view.sync_info = self.random_sync_info(),
                }
                new_view.into()
            }
        }
    }

    fn maybe<T>(&mut self, generate: fn(&mut Self) -> T) -> Option<T> {
        if self.rng.gen_bool(0.8) {
            Some(generate(self))
        } else {
            None
        }
    }

    fn random_view(&mut self) -> ViewNumber {
        ViewNumber::new(self.rng.gen_range(0, self.max_view + 2))
    }

    fn random_replica(&mut self) -> ReplicaId {
        ReplicaId::new(self.rng.gen_range(0, self.num_replicas + 2))
    }

    fn random_hash(&mut self) -> CryptoHash {
        if self.rng.gen_bool(0.3) {
            return Block::genesis_hash();
        }
        let mut bytes = [0u8; 32];
        self.rng.fill_bytes(&mut bytes);
        CryptoHash::new(bytes)
    }

    fn random_signature(&mut self) -> Signature {
        let mut bytes = [0u8; 64];
        self.rng.fill_bytes(&mut bytes);
        Signature::new(self.random_replica(), SignatureBytes::new(bytes))
    }

    fn random_signatures(&mut self) -> Vec<Signature> {
        let count = self.rng.gen_range(0, self.num_replicas as usize + 1);
        (0..count).map(|_| self.random_signature()).collect()
    }

    fn random_command(&mut self) -> Command {
        let mut bytes = vec![0u8; self.rng.gen_range(0, 16)];
        self.rng.fill_bytes(&mut bytes);
        Command::new(bytes)
    }

    fn random_qc(&mut self) -> QuorumCertificate {
        if self.rng.gen_bool(0.3) {
            return QuorumCertificate::genesis();
        }
        let view = self.random_view();
        let block = self.random_hash();
        QuorumCertificate::new(view, block, self.random_signatures())
    }

    fn random_tc(&mut self) -> TimeoutCertificate {
        let view = self.random_view();
        TimeoutCertificate::new(view, self.random_signatures())
    }

    fn random_sync_info(&mut self) -> SyncInfo {
        let mut sync_info = SyncInfo::new();
        if let Some(qc) = self.maybe(Self::random_qc) {
            sync_info = sync_info.with_qc(qc);
        }
        if self.rng.gen_bool(0.5) {
            sync_info = sync_info.with_tc(self.random_tc());
        }
        sync_info
    }

    fn random_block(&mut self) -> Block {
        let justify = self.maybe(Self::random_qc);
        let parent = match &justify {
            Some(qc) if self.rng.gen_bool(0.7) => qc.block_hash(),
            _ => self.random_hash(),
        };
        let command = self.random_command();
        let view = self.random_view();
        let proposer = self.random_replica();
        Block::new(parent, justify, command, view, proposer)
    }
}
