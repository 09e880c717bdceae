/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store numbers and bytes, and do not have any major "active" behavior.
//!
//! The types defined here follow the newtype pattern. Two kinds of identities are defined, and they
//! should never be conflated:
//! 1. [`ReplicaId`]: the identity a replica signs with and is counted under in quorums.
//! 2. [`NodeId`]: the identity of one simulated instance, used for routing, partitions, and chain
//!    storage. Two "twin" instances share one `ReplicaId` but always have distinct `NodeId`s.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Identity of a replica, i.e., the key it signs with. Valid replica ids start at 1.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ReplicaId(u32);

impl ReplicaId {
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u32 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Identity of a single simulated protocol instance. Valid node ids start at 1.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u32 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// HotStuff view number. View 0 belongs to the genesis block; the first view that is actually run is 1.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ViewNumber(u64);

impl ViewNumber {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn init() -> Self {
        Self(0)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// The hash that replicas sign when they time out in this view: the little-endian view number in
    /// the first eight bytes, zeroes elsewhere.
    pub fn to_hash(&self) -> CryptoHash {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&self.0.to_le_bytes());
        CryptoHash::new(bytes)
    }
}

impl Display for ViewNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for ViewNumber {
    type Output = ViewNumber;

    fn add(self, rhs: u64) -> Self::Output {
        ViewNumber(self.0.saturating_add(rhs))
    }
}

impl Sub<u64> for ViewNumber {
    type Output = ViewNumber;

    fn sub(self, rhs: u64) -> Self::Output {
        ViewNumber(self.0.saturating_sub(rhs))
    }
}

/// The hash of a block. Given a [block][crate::types::block::Block] the hash is obtained
/// [like this][crate::types::block::Block::hash].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Opaque client payload carried by a block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Command(Vec<u8>);

impl Command {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Command {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

/// Signature represented in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..")
    }
}
