// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Task entity, its state machine, and the dependency-hash used by the
//! durable task queue's fast-skip iterator (§3, §4.2, §4.6).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::{AnalysisId, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum TaskState {
    Pending,
    Running,
    PendingPost,
    Reported,
    FatalError { reason: String },
}

crate::simple_display! {
    TaskState {
        Pending => "pending",
        Running => "running",
        PendingPost => "pending_post",
        Reported => "reported",
        FatalError(..) => "fatal_error",
    }
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Reported | TaskState::FatalError { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub analysis_id: AnalysisId,
    pub kind: String,
    pub priority: u32,
    pub created_on_ms: u64,
    pub platform: String,
    pub os_version: String,
    /// Canonicalised (sorted) machine tag set.
    pub machine_tags: BTreeSet<String>,
    pub machine_name: Option<String>,
    pub route: Option<String>,
    pub state: TaskState,
    pub score: i32,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TaskId,
        analysis_id: AnalysisId,
        priority: u32,
        created_on_ms: u64,
        platform: impl Into<String>,
        os_version: impl Into<String>,
        machine_tags: BTreeSet<String>,
        machine_name: Option<String>,
        route: Option<String>,
    ) -> Self {
        Task {
            id,
            analysis_id,
            kind: "standard".to_string(),
            priority,
            created_on_ms,
            platform: platform.into(),
            os_version: os_version.into(),
            machine_tags,
            machine_name,
            route,
            state: TaskState::Pending,
            score: 0,
        }
    }

    pub fn machine_tags_canonical(&self) -> String {
        self.machine_tags.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// Stable hash of `(platform, os_version, sorted_machine_tags, route)`,
    /// truncated to a fixed 16 hex-character width. Two queued tasks share a
    /// dependency hash iff their machine-selection constraints are identical.
    pub fn dependency_hash(&self) -> DependencyHash {
        dependency_hash(&self.platform, &self.os_version, &self.machine_tags_canonical(), self.route.as_deref())
    }
}

/// A stable, fixed-width (16 hex chars / 64 bits) identifier for a task's
/// machine-selection constraints. Grounded on `original_source`'s MD5-based
/// dephash, reimplemented with SHA-256 since that is the hash crate already in
/// the dependency stack; truncation width is unrelated to the digest choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyHash(u64);

impl std::fmt::Display for DependencyHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

pub fn dependency_hash(
    platform: &str,
    os_version: &str,
    tags_canonical: &str,
    route: Option<&str>,
) -> DependencyHash {
    let mut hasher = Sha256::new();
    hasher.update(platform.as_bytes());
    hasher.update(b"\0");
    hasher.update(os_version.as_bytes());
    hasher.update(b"\0");
    hasher.update(tags_canonical.as_bytes());
    hasher.update(b"\0");
    hasher.update(route.unwrap_or("").as_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[..8].try_into().unwrap_or([0u8; 8]);
    DependencyHash(u64::from_be_bytes(bytes))
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
