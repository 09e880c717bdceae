/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A capacity-bounded, least-recently-used cache of verified signatures.
//!
//! ## Concurrency
//!
//! One [`Mutex`] guards both the key map and the recency order, so that an entry and its position in
//! the order are always updated together. The lock is never held while a signature is being verified.
//!
//! [`verify_aggregate`](SignatureCache::verify_aggregate) verifies the uncached signatures of a
//! certificate as tasks of a [`rayon::scope`] on the global thread pool. Valid signatures are tallied in
//! an [`AtomicUsize`] which is only read after the scope has joined every task.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use crate::{
    fuzz::panics::CaptureSession,
    types::{
        basic::{CryptoHash, ViewNumber},
        block::Block,
        certificates::{QuorumCertificate, Signature, TimeoutCertificate},
    },
};

use super::scheme::SignatureScheme;

type CacheKey = (CryptoHash, Signature);

pub struct SignatureCache<S: SignatureScheme> {
    scheme: S,
    capacity: usize,
    quorum_size: usize,
    entries: Mutex<LruEntries>,
}

impl<S: SignatureScheme> SignatureCache<S> {
    /// Create a cache that holds at most `capacity` verified signatures and accepts an aggregate when
    /// at least `quorum_size` of its signatures are valid.
    pub fn new(scheme: S, capacity: usize, quorum_size: usize) -> Self {
        Self {
            scheme,
            capacity,
            quorum_size,
            entries: Mutex::new(LruEntries::default()),
        }
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    /// Number of signatures currently cached.
    pub fn len(&self) -> usize {
        self.lock().stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sign `hash` with the underlying scheme. The produced signature is cached as valid.
    pub fn sign(&self, hash: &CryptoHash) -> Signature {
        let signature = self.scheme.sign(hash);
        self.insert((*hash, signature));
        signature
    }

    /// Check a single signature over `hash`. A cache hit refreshes the entry and skips the
    /// cryptographic check; only signatures that verified are ever inserted.
    pub fn verify(&self, signature: &Signature, hash: &CryptoHash) -> bool {
        let key = (*hash, *signature);
        if self.check(&key) {
            return true;
        }

        if self.scheme.verify(signature, hash) {
            self.insert(key);
            true
        } else {
            false
        }
    }

    /// Check that at least [`quorum_size`](Self::quorum_size) of `signatures` are valid signatures
    /// over `hash`.
    ///
    /// Identical signatures are counted once. Signatures over the genesis block hash are accepted
    /// without any check, since the genesis certificate carries none.
    pub fn verify_aggregate(&self, signatures: &[Signature], hash: &CryptoHash) -> bool {
        if *hash == Block::genesis_hash() {
            return true;
        }

        let mut seen = HashSet::new();
        let unique: Vec<&Signature> = signatures
            .iter()
            .filter(|signature| seen.insert(signature.to_bytes()))
            .collect();
        if unique.len() < self.quorum_size {
            return false;
        }

        let mut num_valid = 0;
        let mut uncached = Vec::new();
        for signature in unique {
            if self.check(&(*hash, *signature)) {
                num_valid += 1;
            } else {
                uncached.push(signature);
            }
        }
        if num_valid >= self.quorum_size {
            return true;
        }

        let valid_count = AtomicUsize::new(num_valid);
        let session = CaptureSession::current();
        rayon::scope(|scope| {
            for signature in uncached {
                let valid_count = &valid_count;
                scope.spawn(move |_| {
                    session.enter(|| {
                        if self.verify(signature, hash) {
                            valid_count.fetch_add(1, Ordering::Relaxed);
                        }
                    })
                });
            }
        });

        valid_count.load(Ordering::Acquire) >= self.quorum_size
    }

    /// Check the signatures of a quorum certificate against the block it certifies.
    pub fn verify_quorum_cert(&self, qc: &QuorumCertificate) -> bool {
        if qc.is_genesis_qc() {
            return true;
        }
        self.verify_aggregate(qc.signatures(), &qc.block_hash())
    }

    /// Check the signatures of a timeout certificate against the view hash of its view.
    pub fn verify_timeout_cert(&self, tc: &TimeoutCertificate) -> bool {
        if tc.view() == ViewNumber::init() {
            return false;
        }
        self.verify_aggregate(tc.signatures(), &tc.view().to_hash())
    }

    fn lock(&self) -> MutexGuard<'_, LruEntries> {
        // The entries are consistent between any two statements, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, key: &CacheKey) -> bool {
        self.lock().promote(key)
    }

    fn insert(&self, key: CacheKey) {
        if self.capacity == 0 {
            return;
        }
        self.lock().insert(key, self.capacity);
    }
}

/// Cached keys and their recency. Each key has a unique stamp; the smallest stamp is the least
/// recently used entry.
#[derive(Default)]
struct LruEntries {
    stamps: HashMap<CacheKey, u64>,
    order: BTreeMap<u64, CacheKey>,
    next_stamp: u64,
}

impl LruEntries {
    fn promote(&mut self, key: &CacheKey) -> bool {
        let Some(stamp) = self.stamps.get_mut(key) else {
            return false;
        };
        self.order.remove(stamp);
        *stamp = self.next_stamp;
        self.order.insert(self.next_stamp, *key);
        self.next_stamp += 1;
        true
    }

    fn insert(&mut self, key: CacheKey, capacity: usize) {
        if self.promote(&key) {
            return;
        }
        while self.stamps.len() >= capacity {
            self.drop_oldest();
        }
        self.stamps.insert(key, self.next_stamp);
        self.order.insert(self.next_stamp, key);
        self.next_stamp += 1;
    }

    fn drop_oldest(&mut self) {
        if let Some((_, key)) = self.order.pop_first() {
            self.stamps.remove(&key);
        }
    }
}
