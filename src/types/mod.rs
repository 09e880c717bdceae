/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are shared by the protocol instances, the executor, and the fuzz harness.
//!
//! Types specific to a single component live next to that component, e.g., the scenario model in
//! [`crate::twins::scenario`].

pub mod basic;

pub mod block;

pub mod certificates;

pub mod crypto_primitives;
