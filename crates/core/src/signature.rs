// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signature/Family/TTP/Tag accumulators and the write-once processing result
//! map (§3, "Signature / Family / TTP / Tag trackers", "Processing result").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Allowed signature severity scores. Anything else is a construction error.
pub const VALID_SCORES: [u8; 5] = [1, 6, 8, 9, 10];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    pub score: u8,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub ioc: Vec<String>,
    #[serde(default)]
    pub ttps: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
#[error("invalid signature score {0}, must be one of {VALID_SCORES:?}")]
pub struct InvalidScore(u8);

impl Signature {
    pub fn new(
        name: impl Into<String>,
        short_description: impl Into<String>,
        long_description: impl Into<String>,
        score: u8,
    ) -> Result<Self, InvalidScore> {
        if !VALID_SCORES.contains(&score) {
            return Err(InvalidScore(score));
        }
        Ok(Signature {
            name: name.into(),
            short_description: short_description.into(),
            long_description: long_description.into(),
            score,
            family: None,
            ioc: Vec::new(),
            ttps: Vec::new(),
            tags: Vec::new(),
        })
    }
}

/// Per-analysis or per-task signature accumulator. Re-adding a signature by
/// name merges its IOCs into the existing entry rather than duplicating it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureTracker {
    signatures: Vec<Signature>,
}

impl SignatureTracker {
    pub fn add(&mut self, signature: Signature) {
        if let Some(existing) = self.signatures.iter_mut().find(|s| s.name == signature.name) {
            for ioc in signature.ioc {
                if !existing.ioc.contains(&ioc) {
                    existing.ioc.push(ioc);
                }
            }
            for tag in signature.tags {
                if !existing.tags.contains(&tag) {
                    existing.tags.push(tag);
                }
            }
        } else {
            self.signatures.push(signature);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

#[derive(Debug, Error)]
#[error("processing result key {0:?} was already written")]
pub struct DuplicateKey(pub String);

/// A write-once mapping from plugin key to structured data within one
/// processing stage. Overwriting an existing key is rejected rather than
/// silently accepted or panicking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingResult {
    entries: BTreeMap<String, Value>,
}

impl ProcessingResult {
    pub fn store(&mut self, key: impl Into<String>, value: Value) -> Result<(), DuplicateKey> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(DuplicateKey(key));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
