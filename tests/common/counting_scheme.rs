use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use hotstuff_twins::{
    crypto::{Ed25519Scheme, SignatureScheme},
    types::{
        basic::{CryptoHash, ReplicaId},
        certificates::Signature,
    },
};

/// An [`Ed25519Scheme`] that counts how many signatures it was asked to verify.
pub(crate) struct CountingScheme {
    inner: Ed25519Scheme,
    verifications: Arc<AtomicUsize>,
}

impl CountingScheme {
    /// A scheme signing as `me` among replicas `1..=num_replicas`, and a handle to its verification
    /// counter.
    pub(crate) fn new(me: u32, num_replicas: u32) -> (Self, Arc<AtomicUsize>) {
        let verifications = Arc::new(AtomicUsize::new(0));
        let scheme = Self {
            inner: Ed25519Scheme::new(
                ReplicaId::new(me),
                (1..=num_replicas).map(ReplicaId::new),
            ),
            verifications: verifications.clone(),
        };
        (scheme, verifications)
    }
}

impl SignatureScheme for CountingScheme {
    fn signer(&self) -> ReplicaId {
        self.inner.signer()
    }

    fn sign(&self, hash: &CryptoHash) -> Signature {
        self.inner.sign(hash)
    }

    fn verify(&self, signature: &Signature, hash: &CryptoHash) -> bool {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(signature, hash)
    }
}

/// Signatures by replicas `signers` over `hash`.
pub(crate) fn signatures_by(signers: &[u32], num_replicas: u32, hash: &CryptoHash) -> Vec<Signature> {
    signers
        .iter()
        .map(|signer| {
            Ed25519Scheme::new(ReplicaId::new(*signer), (1..=num_replicas).map(ReplicaId::new))
                .sign(hash)
        })
        .collect()
}

/// A scheme whose every verification panics.
pub(crate) struct PanickingScheme;

pub(crate) const VERIFY_PANIC: &str = "verification is not available";

impl SignatureScheme for PanickingScheme {
    fn signer(&self) -> ReplicaId {
        ReplicaId::new(1)
    }

    fn sign(&self, _hash: &CryptoHash) -> Signature {
        panic!("{}", VERIFY_PANIC)
    }

    fn verify(&self, _signature: &Signature, _hash: &CryptoHash) -> bool {
        panic!("{}", VERIFY_PANIC)
    }
}
