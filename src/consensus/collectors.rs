/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Collectors that aggregate verified signatures into certificates.
//!
//! Both collectors count each replica at most once per certificate. Twins share a replica id, so a
//! twin pair contributes a single signature no matter how many of its instances send one.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{
    basic::{CryptoHash, ReplicaId, ViewNumber},
    certificates::{QuorumCertificate, Signature, TimeoutCertificate},
};

pub(crate) struct VoteCollector {
    replicas: HashSet<ReplicaId>,
    quorum_size: usize,
    signature_sets: HashMap<(ViewNumber, CryptoHash), Vec<Signature>>,
}

impl VoteCollector {
    pub(crate) fn new(replicas: &[ReplicaId], quorum_size: usize) -> Self {
        Self {
            replicas: replicas.iter().copied().collect(),
            quorum_size,
            signature_sets: HashMap::new(),
        }
    }

    /// Adds the vote to the signature set of (`view`, `block`). Returns a quorum certificate if adding
    /// the vote completes a quorum.
    ///
    /// # Preconditions
    /// `signature` is a valid signature over `block`.
    pub(crate) fn collect(
        &mut self,
        view: ViewNumber,
        block: CryptoHash,
        signature: Signature,
    ) -> Option<QuorumCertificate> {
        if !self.replicas.contains(&signature.signer()) {
            return None;
        }

        let signatures = self.signature_sets.entry((view, block)).or_default();
        if signatures
            .iter()
            .any(|collected| collected.signer() == signature.signer())
        {
            return None;
        }
        signatures.push(signature);

        if signatures.len() >= self.quorum_size {
            let signatures = self.signature_sets.remove(&(view, block))?;
            return Some(QuorumCertificate::new(view, block, signatures));
        }

        None
    }

    /// Forget partial signature sets of views before `view`.
    pub(crate) fn prune_below(&mut self, view: ViewNumber) {
        self.signature_sets
            .retain(|(collected_view, _), _| *collected_view >= view);
    }
}

/// Collects timeout signatures per view, remembering the highest quorum certificate reported along
/// with them.
pub(crate) struct TimeoutCollector {
    replicas: HashSet<ReplicaId>,
    quorum_size: usize,
    timeouts: BTreeMap<ViewNumber, (Vec<Signature>, QuorumCertificate)>,
}

impl TimeoutCollector {
    pub(crate) fn new(replicas: &[ReplicaId], quorum_size: usize) -> Self {
        Self {
            replicas: replicas.iter().copied().collect(),
            quorum_size,
            timeouts: BTreeMap::new(),
        }
    }

    /// Adds the timeout of `view`. Returns a timeout certificate, and the highest quorum certificate
    /// seen among the collected timeouts, if adding the timeout completes a quorum.
    ///
    /// # Preconditions
    /// `signature` is a valid signature over the view hash of `view`, and `high_qc` has been verified.
    pub(crate) fn collect(
        &mut self,
        view: ViewNumber,
        signature: Signature,
        high_qc: QuorumCertificate,
    ) -> Option<(TimeoutCertificate, QuorumCertificate)> {
        if !self.replicas.contains(&signature.signer()) {
            return None;
        }

        let (signatures, highest_qc) = self
            .timeouts
            .entry(view)
            .or_insert_with(|| (Vec::new(), high_qc.clone()));
        if signatures
            .iter()
            .any(|collected| collected.signer() == signature.signer())
        {
            return None;
        }
        signatures.push(signature);
        if high_qc.view() > highest_qc.view() {
            *highest_qc = high_qc;
        }

        if signatures.len() >= self.quorum_size {
            let (signatures, highest_qc) = self.timeouts.remove(&view)?;
            return Some((TimeoutCertificate::new(view, signatures), highest_qc));
        }

        None
    }

    pub(crate) fn prune_below(&mut self, view: ViewNumber) {
        self.timeouts = self.timeouts.split_off(&view);
    }
}
