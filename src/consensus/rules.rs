/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The voting, locking, and commit rules that tell the HotStuff variants apart.
//!
//! Both variants are driven by [`ConsensusBase`](super::ConsensusBase). The base only ever votes for
//! a block of a higher view than its last vote; the rules below decide everything else.

use crate::types::{
    basic::{CryptoHash, ViewNumber},
    block::Block,
};

use super::block_chain::BlockChain;

/// Locking state shared by the rules and the base.
pub struct SafetyState {
    /// The locked block (`bLock`).
    pub locked: CryptoHash,
    /// The highest view this instance voted in.
    pub last_vote: ViewNumber,
}

impl SafetyState {
    pub(crate) fn new() -> Self {
        Self {
            locked: Block::genesis_hash(),
            last_vote: ViewNumber::init(),
        }
    }

    fn locked_view(&self, chain: &BlockChain) -> ViewNumber {
        chain
            .get(&self.locked)
            .map_or(ViewNumber::init(), Block::view)
    }
}

pub trait Rules: Default + 'static {
    /// The name this variant is registered under.
    const NAME: &'static str;

    /// Whether it is safe to vote for `block` in `current_view`.
    fn vote_rule(
        &self,
        chain: &BlockChain,
        safety: &SafetyState,
        block: &Block,
        current_view: ViewNumber,
    ) -> bool;

    /// Update the lock for the newly received `block`, and return the block that becomes committed
    /// because of it, if any.
    fn commit_rule(
        &self,
        chain: &BlockChain,
        safety: &mut SafetyState,
        block: &Block,
    ) -> Option<CryptoHash>;
}

/// Chained HotStuff: lock on the two-chain, commit on a three-chain of direct parents.
#[derive(Default)]
pub struct ChainedHotStuff;

impl Rules for ChainedHotStuff {
    const NAME: &'static str = "chainedhotstuff";

    fn vote_rule(
        &self,
        chain: &BlockChain,
        safety: &SafetyState,
        block: &Block,
        _current_view: ViewNumber,
    ) -> bool {
        // Safety: the block extends the locked block.
        if chain.extends(block, &safety.locked) {
            return true;
        }

        // Liveness: the block's certificate is newer than the lock.
        match chain.justified_by(block) {
            Some(justified) => justified.view() > safety.locked_view(chain),
            None => false,
        }
    }

    fn commit_rule(
        &self,
        chain: &BlockChain,
        safety: &mut SafetyState,
        block: &Block,
    ) -> Option<CryptoHash> {
        // block1 <- block2 <- block3 <- block, linked by certificates.
        let block1 = chain.justified_by(block)?;
        let block2 = chain.justified_by(block1)?;
        if block2.view() > safety.locked_view(chain) {
            log::trace!("lock {} at view {}", block2.hash(), block2.view());
            safety.locked = block2.hash();
        }

        let block3 = chain.justified_by(block2)?;
        if block1.parent() == block2.hash() && block2.parent() == block3.hash() {
            Some(block3.hash())
        } else {
            None
        }
    }
}

/// Simple HotStuff: lock on the grandparent, commit when three certified ancestors have consecutive
/// views.
#[derive(Default)]
pub struct SimpleHotStuff;

impl Rules for SimpleHotStuff {
    const NAME: &'static str = "simplehotstuff";

    fn vote_rule(
        &self,
        chain: &BlockChain,
        safety: &SafetyState,
        block: &Block,
        current_view: ViewNumber,
    ) -> bool {
        if block.view() < current_view {
            return false;
        }

        match chain.justified_by(block) {
            Some(parent) => parent.view() >= safety.locked_view(chain),
            None => false,
        }
    }

    fn commit_rule(
        &self,
        chain: &BlockChain,
        safety: &mut SafetyState,
        block: &Block,
    ) -> Option<CryptoHash> {
        let parent = chain.justified_by(block)?;
        let grandparent = chain.justified_by(parent)?;
        if grandparent.view() > safety.locked_view(chain) {
            log::trace!("lock {} at view {}", grandparent.hash(), grandparent.view());
            safety.locked = grandparent.hash();
        }

        let great_grandparent = chain.justified_by(grandparent)?;
        let consecutive = parent.parent() == grandparent.hash()
            && grandparent.parent() == great_grandparent.hash()
            && great_grandparent.view() + 1 == grandparent.view()
            && grandparent.view() + 1 == parent.view();
        if consecutive {
            Some(great_grandparent.hash())
        } else {
            None
        }
    }
}
