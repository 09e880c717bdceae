/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Signing and verification for protocol instances.
//!
//! [`SignatureScheme`] is the seam between the protocol and the actual cryptography.
//! [`Ed25519Scheme`] is the scheme every simulated replica uses. [`SignatureCache`] wraps any scheme
//! and remembers signatures that are known to be valid, so that the same vote or certificate arriving
//! at an instance again does not cost another signature verification.

pub mod cache;

pub mod scheme;

pub use cache::SignatureCache;
pub use scheme::{Ed25519Scheme, SignatureScheme};
