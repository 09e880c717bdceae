/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Persistence of fuzz inputs.
//!
//! A corpus file holds one message per line, encoded as base64 (standard alphabet, padded) of the
//! message's borsh serialization. A seed file holds one decimal `u64` per line; each seed regenerates
//! a message through [`message_from_seed`](super::mutator::message_from_seed). Blank lines are
//! skipped in both formats.

use std::{
    fmt::{self, Display, Formatter},
    fs, io,
    num::ParseIntError,
    path::Path,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use rand_core::{OsRng, RngCore};

use crate::messages::Message;

#[derive(Debug)]
pub enum CorpusError {
    Io(io::Error),
    /// A line is not valid base64.
    Decode { line: usize, error: base64::DecodeError },
    /// A line decodes to bytes that are not a message.
    Deserialize { line: usize, error: io::Error },
    /// A line of a seed file is not a `u64`.
    InvalidSeed { line: usize, error: ParseIntError },
}

impl Display for CorpusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CorpusError::Io(error) => write!(f, "corpus i/o error: {}", error),
            CorpusError::Decode { line, error } => write!(f, "line {}: {}", line, error),
            CorpusError::Deserialize { line, error } => {
                write!(f, "line {}: not a message: {}", line, error)
            }
            CorpusError::InvalidSeed { line, error } => {
                write!(f, "line {}: not a seed: {}", line, error)
            }
        }
    }
}

impl std::error::Error for CorpusError {}

impl From<io::Error> for CorpusError {
    fn from(value: io::Error) -> Self {
        CorpusError::Io(value)
    }
}

pub fn encode_message(message: &Message) -> String {
    // Serializing into a `Vec` does not fail.
    let bytes = message.try_to_vec().unwrap_or_default();
    STANDARD.encode(bytes)
}

pub fn decode_message(encoded: &str) -> Result<Message, CorpusError> {
    decode_line(0, encoded)
}

fn decode_line(line: usize, encoded: &str) -> Result<Message, CorpusError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|error| CorpusError::Decode { line, error })?;
    Message::try_from_slice(&bytes).map_err(|error| CorpusError::Deserialize { line, error })
}

pub fn save_corpus(path: impl AsRef<Path>, messages: &[Message]) -> Result<(), CorpusError> {
    let mut contents = String::new();
    for message in messages {
        contents.push_str(&encode_message(message));
        contents.push('\n');
    }
    fs::write(path, contents)?;
    Ok(())
}

pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<Message>, CorpusError> {
    let contents = fs::read_to_string(path)?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| decode_line(i + 1, line))
        .collect()
}

pub fn save_seeds(path: impl AsRef<Path>, seeds: &[u64]) -> Result<(), CorpusError> {
    let mut contents = String::new();
    for seed in seeds {
        contents.push_str(&seed.to_string());
        contents.push('\n');
    }
    fs::write(path, contents)?;
    Ok(())
}

pub fn load_seeds(path: impl AsRef<Path>) -> Result<Vec<u64>, CorpusError> {
    let contents = fs::read_to_string(path)?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            line.trim()
                .parse()
                .map_err(|error| CorpusError::InvalidSeed { line: i + 1, error })
        })
        .collect()
}

/// Fresh seeds from the operating system's randomness source.
pub fn fresh_seeds(count: usize) -> Vec<u64> {
    (0..count).map(|_| OsRng.next_u64()).collect()
}
