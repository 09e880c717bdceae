/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Fuzzing protocol instances by swapping a generated message into a known-good scenario.
//!
//! The [`FuzzHarness`] runs a fixed scenario (by default the baseline from
//! [`FuzzHarness::baseline`]) with the first sent message replaced by a message from the
//! [`MessageMutator`]. Every run that errors, panics, violates safety, or commits an unexpected number
//! of blocks is recorded in a [`FaultLog`]. Offending messages and the seeds they were generated from
//! can be written to disk with the functions in [`corpus`] and replayed later.

pub mod corpus;

pub mod faults;

pub mod harness;

pub mod mutator;

pub(crate) mod panics;

pub use corpus::{
    decode_message, encode_message, fresh_seeds, load_corpus, load_seeds, save_corpus, save_seeds,
    CorpusError,
};
pub use faults::{FaultLog, FaultRecord};
pub use harness::{baseline_scenario, default_protocol, FuzzHarness};
pub use mutator::{message_from_seed, MessageMutator};
