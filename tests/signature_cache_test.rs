/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for the signature cache: hits, eviction, and aggregate verification.

use std::{sync::atomic::Ordering, thread};

use hotstuff_twins::{
    crypto::{SignatureCache, SignatureScheme},
    types::{
        basic::{CryptoHash, ReplicaId, SignatureBytes, ViewNumber},
        block::Block,
        certificates::{QuorumCertificate, Signature, TimeoutCertificate},
    },
};

mod common;

use common::counting_scheme::{signatures_by, CountingScheme};

fn hash(byte: u8) -> CryptoHash {
    CryptoHash::new([byte; 32])
}

#[test]
fn cache_hit_skips_verification() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 16, 3);
    let signature = signatures_by(&[2], 4, &hash(1)).remove(0);

    assert!(cache.verify(&signature, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 1);
    assert!(cache.verify(&signature, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn invalid_signatures_are_never_cached() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 16, 3);
    let forged = Signature::new(ReplicaId::new(2), SignatureBytes::new([9u8; 64]));

    assert!(!cache.verify(&forged, &hash(1)));
    assert!(!cache.verify(&forged, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 2);
    assert!(cache.is_empty());

    // A valid signature over a different hash does not verify either.
    let signature = signatures_by(&[2], 4, &hash(1)).remove(0);
    assert!(!cache.verify(&signature, &hash(2)));

    // Unknown signers never verify.
    let stranger = signatures_by(&[9], 9, &hash(1)).remove(0);
    assert!(!cache.verify(&stranger, &hash(1)));
}

#[test]
fn own_signatures_are_cached_when_signing() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 16, 3);
    let signature = cache.sign(&hash(5));

    assert_eq!(signature.signer(), ReplicaId::new(1));
    assert!(cache.verify(&signature, &hash(5)));
    assert_eq!(verifications.load(Ordering::SeqCst), 0);
}

#[test]
fn least_recently_used_entry_is_evicted() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 2, 3);
    let first = signatures_by(&[1], 4, &hash(1)).remove(0);
    let second = signatures_by(&[2], 4, &hash(1)).remove(0);
    let third = signatures_by(&[3], 4, &hash(1)).remove(0);

    assert!(cache.verify(&first, &hash(1)));
    assert!(cache.verify(&second, &hash(1)));
    // Touch `first`, so that `second` becomes the oldest entry.
    assert!(cache.verify(&first, &hash(1)));
    assert!(cache.verify(&third, &hash(1)));
    assert_eq!(cache.len(), 2);
    assert_eq!(verifications.load(Ordering::SeqCst), 3);

    // `first` is still cached, `second` was evicted.
    assert!(cache.verify(&first, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 3);
    assert!(cache.verify(&second, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 4);
}

#[test]
fn cache_is_shared_between_threads() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 8, 3);
    let hashes: Vec<CryptoHash> = (1..=8).map(hash).collect();
    let signatures: Vec<(CryptoHash, Vec<Signature>)> = hashes
        .iter()
        .map(|hash| (*hash, signatures_by(&[1, 2, 3, 4], 4, hash)))
        .collect();
    let forged = Signature::new(ReplicaId::new(2), SignatureBytes::new([9u8; 64]));

    thread::scope(|scope| {
        for worker in 0..4 {
            let cache = &cache;
            let signatures = &signatures;
            let hashes = &hashes;
            scope.spawn(move || {
                for round in 0..5 {
                    for (hash, by_replica) in signatures {
                        let signature = &by_replica[(worker + round) % by_replica.len()];
                        assert!(cache.verify(signature, hash));
                        assert!(!cache.verify(&forged, hash));
                    }
                    let (hash, by_replica) = &signatures[worker];
                    assert!(cache.verify_aggregate(by_replica, hash));
                    let own = cache.sign(&hashes[round]);
                    assert!(cache.verify(&own, &hashes[round]));
                }
            });
        }
    });

    assert!(cache.len() <= cache.capacity());
    assert!(!cache.is_empty());
    // 32 distinct valid signatures, but every forgery is checked again each time.
    assert!(verifications.load(Ordering::SeqCst) >= 4 * 5 * 8);
}

#[test]
fn zero_capacity_caches_nothing() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 0, 3);
    let signature = signatures_by(&[2], 4, &hash(1)).remove(0);

    assert!(cache.verify(&signature, &hash(1)));
    assert!(cache.verify(&signature, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 2);
    assert!(cache.is_empty());
}

#[test]
fn aggregate_needs_a_quorum_of_valid_signatures() {
    let (scheme, _) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 16, 3);

    let quorum = signatures_by(&[1, 2, 3], 4, &hash(1));
    assert!(cache.verify_aggregate(&quorum, &hash(1)));

    let short = signatures_by(&[1, 2], 4, &hash(1));
    assert!(!cache.verify_aggregate(&short, &hash(2)));

    let mut with_forgery = signatures_by(&[1, 2], 4, &hash(3));
    with_forgery.push(Signature::new(
        ReplicaId::new(3),
        SignatureBytes::new([1u8; 64]),
    ));
    assert!(!cache.verify_aggregate(&with_forgery, &hash(3)));
}

#[test]
fn duplicate_signatures_are_counted_once() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 16, 3);

    let mut signatures = signatures_by(&[1, 2], 4, &hash(1));
    signatures.push(signatures[0]);
    assert!(!cache.verify_aggregate(&signatures, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 0);
}

#[test]
fn aggregate_uses_cached_signatures() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 16, 3);
    let signatures = signatures_by(&[2, 3, 4], 4, &hash(1));

    assert!(cache.verify_aggregate(&signatures, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 3);
    assert!(cache.verify_aggregate(&signatures, &hash(1)));
    assert_eq!(verifications.load(Ordering::SeqCst), 3);
}

#[test]
fn genesis_certificate_needs_no_signatures() {
    let (scheme, verifications) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 16, 3);

    assert!(cache.verify_quorum_cert(&QuorumCertificate::genesis()));
    assert!(cache.verify_aggregate(&[], &Block::genesis_hash()));
    assert_eq!(verifications.load(Ordering::SeqCst), 0);
}

#[test]
fn certificates_are_checked_against_what_they_certify() {
    let (scheme, _) = CountingScheme::new(1, 4);
    let cache = SignatureCache::new(scheme, 16, 3);

    let qc = QuorumCertificate::new(
        ViewNumber::new(1),
        hash(1),
        signatures_by(&[1, 2, 3], 4, &hash(1)),
    );
    assert!(cache.verify_quorum_cert(&qc));
    let misdirected = QuorumCertificate::new(ViewNumber::new(1), hash(2), qc.signatures().to_vec());
    assert!(!cache.verify_quorum_cert(&misdirected));

    let view = ViewNumber::new(2);
    let tc = TimeoutCertificate::new(view, signatures_by(&[2, 3, 4], 4, &view.to_hash()));
    assert!(cache.verify_timeout_cert(&tc));
    let wrong_view = TimeoutCertificate::new(ViewNumber::new(3), tc.signatures().to_vec());
    assert!(!cache.verify_timeout_cert(&wrong_view));
    let view_zero = TimeoutCertificate::new(
        ViewNumber::init(),
        signatures_by(&[2, 3, 4], 4, &ViewNumber::init().to_hash()),
    );
    assert!(!cache.verify_timeout_cert(&view_zero));
}

#[test]
fn scheme_signs_as_its_replica() {
    let (scheme, _) = CountingScheme::new(3, 4);
    assert_eq!(scheme.signer(), ReplicaId::new(3));
    assert!(scheme.verify(&scheme.sign(&hash(1)), &hash(1)));
}
