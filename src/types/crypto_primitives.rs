/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate.
//! 2. **Digital Signatures**: provided by the [`ed25519_dalek`] crate.

use super::basic::{CryptoHash, ReplicaId, SignatureBytes};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{
    Signature as Ed25519Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey,
};

/// A facade around [`SigningKey`] that implements method for [`sign`](Self::sign)-ing hashes as well
/// as a getter for the [`public`](Self::public) key associated with the signing key.
#[derive(Clone)]
pub(crate) struct Keypair(SigningKey);

impl Keypair {
    /// Derive the keypair of `replica` deterministically from its id.
    ///
    /// Every instance that runs as `replica` (including both halves of a twin pair) ends up with the
    /// same key, so their signatures are indistinguishable.
    pub(crate) fn for_replica(replica: ReplicaId) -> Keypair {
        let mut hasher = CryptoHasher::new();
        hasher.update(b"hotstuff_twins/replica-key");
        hasher.update(replica.to_le_bytes());
        let seed: [u8; 32] = hasher.finalize().into();
        Keypair(SigningKey::from_bytes(&seed))
    }

    /// Sign a 32-byte `hash` with the `Keypair`.
    pub(crate) fn sign(&self, hash: &CryptoHash) -> SignatureBytes {
        SignatureBytes::new(self.0.sign(&hash.bytes()).to_bytes())
    }

    /// Get the `VerifyingKey` of this `Keypair`.
    pub(crate) fn public(&self) -> VerifyingKey {
        self.0.verifying_key()
    }
}
