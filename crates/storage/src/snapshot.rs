// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! A snapshot stores the complete [`MaterializedState`] as of a WAL sequence
//! number. Recovery loads the snapshot and replays [`crate::wal::Wal`]
//! entries after that sequence rather than the whole log, bounding startup
//! time to the size of one checkpoint instead of the lifetime of the daemon.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StorageError, StorageResult};
use crate::migration::MigrationRegistry;
use crate::state::MaterializedState;

/// Current snapshot schema version.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

/// A snapshot of the materialized state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version for migrations.
    #[serde(rename = "v")]
    pub version: u32,
    /// WAL sequence number at the time of snapshot.
    pub seq: u64,
    /// The complete materialized state.
    pub state: MaterializedState,
    /// When this snapshot was created.
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState, created_at: DateTime<Utc>) -> Self {
        Snapshot { version: CURRENT_SNAPSHOT_VERSION, seq, state, created_at }
    }

    /// Writes the snapshot zstd-compressed to `path`, atomically: the
    /// compressed bytes land in a sibling `.tmp` file first, then an
    /// existing snapshot is rotated to `.bak` before the rename replaces it
    /// (P6: never empty or partially written).
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut encoder = zstd::stream::Encoder::new(file, ZSTD_LEVEL)?;
            serde_json::to_writer(&mut encoder, self)?;
            let file = encoder.finish()?;
            file.sync_all()?;
        }
        if path.exists() {
            let bak_path = rotate_bak_path(path);
            fs::copy(path, bak_path)?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Loads and decompresses the snapshot at `path`, migrating it to
    /// [`CURRENT_SNAPSHOT_VERSION`] if it was written by an older build.
    pub fn load(path: &Path, migrations: &MigrationRegistry) -> StorageResult<Self> {
        let file = File::open(path)?;
        let decoder = zstd::stream::Decoder::new(file).map_err(StorageError::Io)?;
        let raw: Value = serde_json::from_reader(decoder)?;
        let migrated = migrations.migrate_to(raw, CURRENT_SNAPSHOT_VERSION)?;
        Ok(serde_json::from_value(migrated)?)
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Picks the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`. The
/// oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
