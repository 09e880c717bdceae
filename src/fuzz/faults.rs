/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Aggregation of the faults found while fuzzing.
//!
//! Faults are de-duplicated by where they were raised (`file:line`), what they said, and which step
//! of the harness caught them. The detail of a fault (the node, hashes, and views involved) is kept
//! for the report but does not tell faults apart. For every distinct fault the log keeps the smallest offending message
//! seen so far, measured by the number of lines in its pretty-printed form.

use std::{collections::BTreeMap, fmt::Write as _};

use crate::messages::Message;

use super::corpus::encode_message;

/// One distinct fault, with the smallest message known to trigger it.
#[derive(Clone, Debug)]
pub struct FaultRecord {
    pub location: String,
    pub message: String,
    /// Particulars of the occurrence kept in the record, such as the node that raised it.
    pub detail: String,
    pub recovered_from: String,
    /// Pretty-printed offending message.
    pub rendering: String,
    /// The offending message in corpus encoding.
    pub encoded: String,
    pub offending: Message,
    /// Seed the offending message was generated from, if it was generated.
    pub seed: Option<u64>,
    pub occurrences: usize,
}

impl FaultRecord {
    fn size(&self) -> (usize, usize) {
        (self.rendering.lines().count(), self.rendering.len())
    }
}

/// A fault log. Workers that fuzz in parallel each keep their own log and [`merge`](FaultLog::merge)
/// them at the end.
#[derive(Clone, Debug, Default)]
pub struct FaultLog {
    faults: BTreeMap<String, FaultRecord>,
    pub total_scenarios: usize,
    pub failed_scenarios: usize,
    pub total_messages: usize,
    pub failed_messages: usize,
    pub error_count: usize,
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of a fault caused by `offending`.
    pub fn record(
        &mut self,
        location: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
        recovered_from: impl Into<String>,
        offending: &Message,
        seed: Option<u64>,
    ) {
        let record = FaultRecord {
            location: location.into(),
            message: message.into(),
            detail: detail.into(),
            recovered_from: recovered_from.into(),
            rendering: format!("{:#?}", offending),
            encoded: encode_message(offending),
            offending: offending.clone(),
            seed,
            occurrences: 1,
        };
        self.error_count += 1;
        self.insert(record);
    }

    fn insert(&mut self, record: FaultRecord) {
        let key = format!(
            "error location:\t{}\nerror info:\t{}\nrecovered from:\t{}",
            record.location, record.message, record.recovered_from
        );
        match self.faults.get_mut(&key) {
            Some(existing) => {
                let occurrences = existing.occurrences + record.occurrences;
                if record.size() < existing.size() {
                    *existing = record;
                }
                existing.occurrences = occurrences;
            }
            None => {
                self.faults.insert(key, record);
            }
        }
    }

    /// Fold `other` into this log.
    pub fn merge(&mut self, other: FaultLog) {
        self.total_scenarios += other.total_scenarios;
        self.failed_scenarios += other.failed_scenarios;
        self.total_messages += other.total_messages;
        self.failed_messages += other.failed_messages;
        self.error_count += other.error_count;
        for record in other.faults.into_values() {
            self.insert(record);
        }
    }

    /// Number of distinct faults.
    pub fn unique_faults(&self) -> usize {
        self.faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Distinct faults, ordered by their key.
    pub fn faults(&self) -> impl Iterator<Item = &FaultRecord> {
        self.faults.values()
    }

    /// The smallest offending message of every distinct fault.
    pub fn offending_messages(&self) -> Vec<Message> {
        self.faults
            .values()
            .map(|record| record.offending.clone())
            .collect()
    }

    /// Seeds of the offending messages that were generated from one.
    pub fn offending_seeds(&self) -> Vec<u64> {
        self.faults.values().filter_map(|record| record.seed).collect()
    }

    /// A human-readable summary of every distinct fault and the counters.
    pub fn report(&self) -> String {
        let mut report = String::from("ERROR INFO\n");
        for (i, (key, record)) in self.faults.iter().enumerate() {
            let _ = writeln!(report);
            let _ = writeln!(report, "ERROR NUMBER {}", i + 1);
            let _ = writeln!(report, "{}", key);
            if !record.detail.is_empty() {
                let _ = writeln!(report, "error detail:\t{}", record.detail);
            }
            let _ = writeln!(report, "occurrences:\t{}", record.occurrences);
            if let Some(seed) = record.seed {
                let _ = writeln!(report, "seed:\t{}", seed);
            }
            let _ = writeln!(report, "- FUZZ MESSAGE BEGIN");
            let _ = writeln!(report, "{}", record.rendering);
            let _ = writeln!(report, "- FUZZ MESSAGE END");
        }
        let _ = writeln!(report);
        let _ = writeln!(report, "unique errors found: {}", self.faults.len());
        let _ = writeln!(report, "{} runs were errors", self.error_count);
        let _ = writeln!(
            report,
            "{} of {} scenarios failed",
            self.failed_scenarios, self.total_scenarios
        );
        let _ = writeln!(
            report,
            "{} of {} messages failed",
            self.failed_messages, self.total_messages
        );
        report
    }
}
