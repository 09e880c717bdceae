/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Partial certificates (single signatures) and the certificates aggregated from them.
//!
//! A [`QuorumCertificate`] proves that a quorum of replicas voted for a block in a view. A
//! [`TimeoutCertificate`] proves that a quorum of replicas gave up on a view. Neither type checks its
//! own signatures: verification goes through [`SignatureCache`](crate::crypto::SignatureCache), which
//! is the only component that knows the replicas' public keys.

use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    basic::{CryptoHash, ReplicaId, SignatureBytes, ViewNumber},
    block::Block,
};

/// A partial certificate: one replica's signature over a 32-byte hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct Signature {
    signer: ReplicaId,
    bytes: SignatureBytes,
}

impl Signature {
    pub fn new(signer: ReplicaId, bytes: SignatureBytes) -> Self {
        Self { signer, bytes }
    }

    pub fn signer(&self) -> ReplicaId {
        self.signer
    }

    pub fn bytes(&self) -> SignatureBytes {
        self.bytes
    }

    /// Canonical bytes: signer (u32 LE) followed by the 64 signature bytes.
    pub fn to_bytes(&self) -> [u8; 68] {
        let mut bytes = [0u8; 68];
        bytes[..4].copy_from_slice(&self.signer.to_le_bytes());
        bytes[4..].copy_from_slice(&self.bytes.bytes());
        bytes
    }
}

/// Signatures sorted by signer (then by bytes), so that the encoding of a certificate does not
/// depend on the order its votes arrived in.
fn canonical_signature_bytes(signatures: &[Signature]) -> Vec<u8> {
    let mut sorted: Vec<[u8; 68]> = signatures.iter().map(Signature::to_bytes).collect();
    sorted.sort_by(|a, b| a[..4].iter().rev().cmp(b[..4].iter().rev()).then(a.cmp(b)));
    sorted.concat()
}

fn distinct_signers(signatures: &[Signature]) -> bool {
    let signers: BTreeSet<ReplicaId> = signatures.iter().map(Signature::signer).collect();
    signers.len() == signatures.len()
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct QuorumCertificate {
    view: ViewNumber,
    block: CryptoHash,
    signatures: Vec<Signature>,
}

impl QuorumCertificate {
    pub fn new(view: ViewNumber, block: CryptoHash, signatures: Vec<Signature>) -> Self {
        Self {
            view,
            block,
            signatures,
        }
    }

    /// The certificate every replica starts with. It certifies the genesis block and needs no
    /// signatures.
    pub fn genesis() -> Self {
        Self::new(ViewNumber::init(), Block::genesis_hash(), Vec::new())
    }

    pub fn is_genesis_qc(&self) -> bool {
        self.block == Block::genesis_hash() && self.view == ViewNumber::init()
    }

    pub fn view(&self) -> ViewNumber {
        self.view
    }

    pub fn block_hash(&self) -> CryptoHash {
        self.block
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn has_distinct_signers(&self) -> bool {
        distinct_signers(&self.signatures)
    }

    /// Canonical bytes: block hash ‖ view (u64 LE) ‖ signatures in signer order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(40 + 68 * self.signatures.len());
        bytes.extend_from_slice(&self.block.bytes());
        bytes.extend_from_slice(&self.view.to_le_bytes());
        bytes.extend(canonical_signature_bytes(&self.signatures));
        bytes
    }
}

/// Proof that a quorum of replicas timed out in `view`. Every signature is over
/// [`ViewNumber::to_hash`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TimeoutCertificate {
    view: ViewNumber,
    signatures: Vec<Signature>,
}

impl TimeoutCertificate {
    pub fn new(view: ViewNumber, signatures: Vec<Signature>) -> Self {
        Self { view, signatures }
    }

    pub fn view(&self) -> ViewNumber {
        self.view
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn has_distinct_signers(&self) -> bool {
        distinct_signers(&self.signatures)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 68 * self.signatures.len());
        bytes.extend_from_slice(&self.view.to_le_bytes());
        bytes.extend(canonical_signature_bytes(&self.signatures));
        bytes
    }
}

/// The certificates a replica shares when it moves to a new view.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SyncInfo {
    qc: Option<QuorumCertificate>,
    tc: Option<TimeoutCertificate>,
}

impl SyncInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_qc(mut self, qc: QuorumCertificate) -> Self {
        self.qc = Some(qc);
        self
    }

    pub fn with_tc(mut self, tc: TimeoutCertificate) -> Self {
        self.tc = Some(tc);
        self
    }

    pub fn qc(&self) -> Option<&QuorumCertificate> {
        self.qc.as_ref()
    }

    pub fn tc(&self) -> Option<&TimeoutCertificate> {
        self.tc.as_ref()
    }
}
