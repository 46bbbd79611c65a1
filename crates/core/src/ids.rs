// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity types for analyses and tasks.
//!
//! Unlike the fixed-prefix `IdBuf` scheme in [`crate::id`], analysis and task
//! identities have their own fixed external formats (`YYYYMMDD-xxxxxx` and
//! `<analysis_id>_<n>`) and are not interchangeable with generic entity ids.

use std::fmt;

use serde::{Deserialize, Serialize};

const ALPHANUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// `YYYYMMDD-<6-alphanum>`, e.g. `20260729-a3f91c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(String);

impl AnalysisId {
    /// Build an id from a UTC day and a pre-generated suffix (dependency-injected
    /// for determinism; callers use [`crate::clock::Clock::epoch_ms`] plus a
    /// random-suffix source rather than reaching for wall-clock time here).
    pub fn new(year: i32, month: u32, day: u32, suffix: &str) -> Self {
        debug_assert_eq!(suffix.len(), 6, "analysis id suffix must be 6 chars: {suffix:?}");
        Self(format!("{year:04}{month:02}{day:02}-{suffix}"))
    }

    /// Generate a random 6-character alphanumeric suffix suitable for [`AnalysisId::new`].
    pub fn random_suffix() -> String {
        nanoid::nanoid!(6, ALPHANUM)
    }

    pub fn from_string(s: impl Into<String>) -> Result<Self, InvalidId> {
        let s = s.into();
        if !is_valid_analysis_id(&s) {
            return Err(InvalidId { kind: "analysis", value: s });
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYYMMDD` day component, used to shard `storage/analyses/<day>/<id>/`.
    pub fn day(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

fn is_valid_analysis_id(s: &str) -> bool {
    let Some((day, suffix)) = s.split_once('-') else { return false };
    day.len() == 8
        && day.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == 6
        && suffix.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AnalysisId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `<analysis_id>_<task_number>`, `task_number` 1-based and monotonic per analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(analysis_id: &AnalysisId, task_number: u32) -> Self {
        debug_assert!(task_number >= 1, "task_number is 1-based");
        Self(format!("{analysis_id}_{task_number}"))
    }

    pub fn from_string(s: impl Into<String>) -> Result<Self, InvalidId> {
        let s = s.into();
        if Self::parse_parts(&s).is_none() {
            return Err(InvalidId { kind: "task", value: s });
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The owning analysis id, parsed back out of the task id.
    pub fn analysis_id(&self) -> AnalysisId {
        let (analysis, _) = Self::parse_parts(&self.0).unwrap_or((self.0.clone(), 0));
        AnalysisId(analysis)
    }

    pub fn task_number(&self) -> u32 {
        Self::parse_parts(&self.0).map(|(_, n)| n).unwrap_or(0)
    }

    fn parse_parts(s: &str) -> Option<(String, u32)> {
        let (analysis, number) = s.rsplit_once('_')?;
        if !is_valid_analysis_id(analysis) {
            return None;
        }
        let n: u32 = number.parse().ok()?;
        if n == 0 {
            return None;
        }
        Some((analysis.to_string(), n))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {kind} id: {value:?}")]
pub struct InvalidId {
    kind: &'static str,
    value: String,
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
