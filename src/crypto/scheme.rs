/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::collections::HashMap;

use crate::types::{
    basic::{CryptoHash, ReplicaId},
    certificates::Signature,
    crypto_primitives::{Ed25519Signature, Keypair, Verifier, VerifyingKey},
};

/// Produces and checks single signatures over 32-byte hashes.
///
/// Implementations must be usable from several threads at once:
/// [`SignatureCache::verify_aggregate`](super::SignatureCache::verify_aggregate) verifies the
/// signatures of one certificate in parallel.
pub trait SignatureScheme: Send + Sync {
    /// The replica this scheme signs as.
    fn signer(&self) -> ReplicaId;

    fn sign(&self, hash: &CryptoHash) -> Signature;

    /// Returns `false` for any signature that does not check out, including signatures by replicas
    /// the scheme does not know.
    fn verify(&self, signature: &Signature, hash: &CryptoHash) -> bool;
}

/// Ed25519 signatures with keys derived deterministically from replica ids.
pub struct Ed25519Scheme {
    keypair: Keypair,
    me: ReplicaId,
    verifying_keys: HashMap<ReplicaId, VerifyingKey>,
}

impl Ed25519Scheme {
    pub fn new(me: ReplicaId, replicas: impl IntoIterator<Item = ReplicaId>) -> Self {
        let verifying_keys = replicas
            .into_iter()
            .map(|replica| (replica, Keypair::for_replica(replica).public()))
            .collect();
        Self {
            keypair: Keypair::for_replica(me),
            me,
            verifying_keys,
        }
    }

    pub fn verifying_key(&self, replica: &ReplicaId) -> Option<&VerifyingKey> {
        self.verifying_keys.get(replica)
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn signer(&self) -> ReplicaId {
        self.me
    }

    fn sign(&self, hash: &CryptoHash) -> Signature {
        Signature::new(self.me, self.keypair.sign(hash))
    }

    fn verify(&self, signature: &Signature, hash: &CryptoHash) -> bool {
        match self.verifying_keys.get(&signature.signer()) {
            Some(verifying_key) => {
                let ed25519_signature = Ed25519Signature::from_bytes(&signature.bytes().bytes());
                verifying_key
                    .verify(&hash.bytes(), &ed25519_signature)
                    .is_ok()
            }
            None => false,
        }
    }
}
