/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type and its associated methods.
//!
//! A block links to its parent by hash only, and carries the quorum certificate that justifies the
//! parent. The hash of a block is computed over its canonical encoding:
//!
//! ```text
//! parent (32 bytes) ‖ proposer (u32 LE) ‖ view (u64 LE) ‖ command bytes ‖ certificate bytes
//! ```
//!
//! The certificate segment is omitted when the block carries no certificate (only the genesis block
//! does not).

use std::{
    fmt::{self, Debug, Formatter},
    sync::OnceLock,
};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    basic::{Command, CryptoHash, ReplicaId, ViewNumber},
    certificates::QuorumCertificate,
    crypto_primitives::{CryptoHasher, Digest},
};

/// A block proposed in some view. Fields are private so that the memoized hash can never go stale.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct Block {
    parent: CryptoHash,
    proposer: ReplicaId,
    command: Command,
    justify: Option<QuorumCertificate>,
    view: ViewNumber,
    #[borsh_skip]
    hash: OnceLock<CryptoHash>,
}

impl Block {
    pub fn new(
        parent: CryptoHash,
        justify: Option<QuorumCertificate>,
        command: Command,
        view: ViewNumber,
        proposer: ReplicaId,
    ) -> Block {
        Block {
            parent,
            proposer,
            command,
            justify,
            view,
            hash: OnceLock::new(),
        }
    }

    /// The root of every chain: zero parent, proposer 0, view 0, empty command, no certificate.
    pub fn genesis() -> Block {
        Block::new(
            CryptoHash::zero(),
            None,
            Command::default(),
            ViewNumber::init(),
            ReplicaId::new(0),
        )
    }

    pub fn genesis_hash() -> CryptoHash {
        static GENESIS_HASH: OnceLock<CryptoHash> = OnceLock::new();
        *GENESIS_HASH.get_or_init(|| Block::genesis().hash())
    }

    /// Get the hash of the block. Computed on first access and memoized for the lifetime of the value.
    pub fn hash(&self) -> CryptoHash {
        *self.hash.get_or_init(|| {
            let mut hasher = CryptoHasher::new();
            hasher.update(self.to_bytes());
            CryptoHash::new(hasher.finalize().into())
        })
    }

    /// The canonical encoding the block hash is computed over.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 + 4 + 8 + self.command.len());
        bytes.extend_from_slice(&self.parent.bytes());
        bytes.extend_from_slice(&self.proposer.to_le_bytes());
        bytes.extend_from_slice(&self.view.to_le_bytes());
        bytes.extend_from_slice(self.command.bytes());
        if let Some(justify) = &self.justify {
            bytes.extend_from_slice(&justify.to_bytes());
        }
        bytes
    }

    pub fn parent(&self) -> CryptoHash {
        self.parent
    }

    pub fn proposer(&self) -> ReplicaId {
        self.proposer
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn justify(&self) -> Option<&QuorumCertificate> {
        self.justify.as_ref()
    }

    pub fn view(&self) -> ViewNumber {
        self.view
    }

    pub fn is_genesis(&self) -> bool {
        self.hash() == Block::genesis_hash()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Block {}

impl Debug for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("hash", &self.hash().to_string())
            .field("parent", &self.parent.to_string())
            .field("proposer", &self.proposer.int())
            .field("view", &self.view.int())
            .field("justify", &self.justify.as_ref().map(|qc| qc.view().int()))
            .field("command_len", &self.command.len())
            .finish()
    }
}
