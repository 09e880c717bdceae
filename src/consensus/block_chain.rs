/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The blocks known to a single protocol instance.

use std::collections::HashMap;

use crate::types::{
    basic::{CryptoHash, ViewNumber},
    block::Block,
};

/// An in-memory store of blocks indexed by hash. Always contains the genesis block.
///
/// Blocks are only ever added. A block may be stored before its parent is known, so callers that act on
/// a block's history check [`has_ancestry`](Self::has_ancestry) first.
pub struct BlockChain {
    blocks: HashMap<CryptoHash, Block>,
}

impl BlockChain {
    pub fn new() -> Self {
        let genesis = Block::genesis();
        let mut blocks = HashMap::new();
        blocks.insert(genesis.hash(), genesis);
        Self { blocks }
    }

    /// Store `block`. Returns `false` if it was already stored.
    pub fn insert(&mut self, block: Block) -> bool {
        let hash = block.hash();
        if self.blocks.contains_key(&hash) {
            return false;
        }
        self.blocks.insert(hash, block);
        true
    }

    pub fn get(&self, hash: &CryptoHash) -> Option<&Block> {
        self.blocks.get(hash)
    }

    pub fn contains(&self, hash: &CryptoHash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Does `block` have `ancestor` among its known ancestors (or is it `ancestor` itself)?
    pub fn extends(&self, block: &Block, ancestor: &CryptoHash) -> bool {
        let Some(target) = self.get(ancestor) else {
            return false;
        };

        let mut cursor = block;
        loop {
            if cursor.hash() == *ancestor {
                return true;
            }
            if cursor.view() <= target.view() {
                return false;
            }
            match self.get(&cursor.parent()) {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    /// Is every ancestor of `block`, down to genesis, stored?
    pub fn has_ancestry(&self, block: &Block) -> bool {
        let mut cursor = block;
        while cursor.view() > ViewNumber::init() {
            match self.get(&cursor.parent()) {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
        cursor.is_genesis()
    }

    /// The block certified by the certificate `block` carries.
    pub fn justified_by(&self, block: &Block) -> Option<&Block> {
        block.justify().and_then(|qc| self.get(&qc.block_hash()))
    }
}

impl Default for BlockChain {
    fn default() -> Self {
        Self::new()
    }
}
