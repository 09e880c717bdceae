/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A Twins-style safety testing engine for chained HotStuff.
//!
//! Twins tests a BFT protocol by running several instances of it deterministically on one machine,
//! giving some replicas two instances that share a signing key, and partitioning the network
//! differently in every view. After each run, a safety oracle checks that no two honest instances
//! committed conflicting blocks.
//!
//! ## Crate layout
//!
//! - [`types`]: blocks, certificates, and the basic newtypes everything else is built from.
//! - [`crypto`]: Ed25519 signing and a bounded cache of verified signatures.
//! - [`messages`]: the four protocol messages.
//! - [`consensus`]: the protocol instances, and the registry of protocols by name.
//! - [`twins`]: scenarios, scenario generation, the executor, and the safety oracle.
//! - [`fuzz`]: a harness that injects generated messages into a baseline scenario.
//! - [`events`]: events that instances publish as they make progress.
//!
//! ## Logging
//!
//! This crate logs through the [log](https://docs.rs/log/latest/log/) facade. Events are printed as
//! CSV lines at the `info` level when [`ExecutionConfig::log_events`](twins::ExecutionConfig) is set,
//! and the simulated network traces every send, delivery, and drop at the `trace` level. Install any
//! logger implementation to see them.

pub mod types;

pub mod crypto;

pub mod messages;

pub mod events;

pub(crate) mod logging;

pub mod consensus;

pub mod twins;

pub mod fuzz;
