// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ties [`Snapshot`] and [`MaterializedState`] together for fast-restart
//! recovery: a [`Checkpointer`] writes a point-in-time snapshot so the next
//! startup can load it and replay only the WAL entries after its sequence
//! number, instead of the whole log.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::StorageResult;
use crate::migration::MigrationRegistry;
use crate::snapshot::Snapshot;
use crate::state::MaterializedState;

/// Loads the snapshot at `path`, or `None` if this is a first boot with
/// nothing to recover from.
pub fn load_snapshot(path: &Path) -> StorageResult<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    Snapshot::load(path, &MigrationRegistry::new()).map(Some)
}

/// Result of a completed checkpoint write.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointResult {
    pub seq: u64,
    pub size_bytes: u64,
}

/// Writes checkpoints to a fixed snapshot path.
pub struct Checkpointer {
    snapshot_path: PathBuf,
}

impl Checkpointer {
    pub fn new(snapshot_path: PathBuf) -> Self {
        Checkpointer { snapshot_path }
    }

    /// Writes `state` as a snapshot at `seq`, blocking the calling thread.
    /// Used on shutdown, where there is no benefit to offloading the write.
    pub fn checkpoint_sync(&self, seq: u64, state: &MaterializedState) -> StorageResult<CheckpointResult> {
        let snapshot = Snapshot::new(seq, state.clone(), Utc::now());
        snapshot.save(&self.snapshot_path)?;
        let size_bytes = std::fs::metadata(&self.snapshot_path)?.len();
        Ok(CheckpointResult { seq, size_bytes })
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
