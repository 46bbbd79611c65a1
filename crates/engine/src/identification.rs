// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The identification stage's structured handoff to the state controller.
//!
//! Identification plugin bodies are out of scope; what is in scope is the
//! shape of their output. `original_source/common/cuckoo/common/strictcontainer.py`'s
//! `Identification` strict container (`selected`, `target`, `category`,
//! `identified`, `ignored`, `errors`) round-trips through `identification.json`
//! on disk in the original. Nothing here writes that file: an identification
//! plugin populates [`warden_core::ProcessingResult`] directly (the `"identification"`
//! key), and the state controller reads it back out of the same in-memory
//! [`warden_core::signature::ProcessingResult`] map the plugin wrote into
//! rather than round-tripping through the filesystem.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use warden_core::ProcessingResult;

/// What identification decided about an analysis's target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentificationOutcome {
    /// Whether a target selection was made at all (empty selection routes
    /// the analysis straight to `no_selected`).
    #[serde(default)]
    pub selected: bool,
    /// Platform names identification found the target compatible with.
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Tags identification derived from the target, used when `autotag` is
    /// enabled in configuration.
    #[serde(default)]
    pub machine_tags: BTreeSet<String>,
}

/// Reads the `"identification"` key out of a finished identification stage's
/// result map. Absence is treated the same as an explicit empty selection —
/// a plugin that runs to completion without storing anything has, in
/// effect, selected nothing.
pub fn read_identification_outcome(result: &ProcessingResult) -> IdentificationOutcome {
    match result.get("identification") {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
        None => IdentificationOutcome::default(),
    }
}

#[cfg(test)]
#[path = "identification_tests.rs"]
mod tests;
