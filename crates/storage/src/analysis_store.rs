// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem persistence of analyses and tasks under `storage/analyses/…`
//! (§6). The WAL and [`crate::state::MaterializedState`] are authoritative
//! for recovery; these JSON files exist so external tooling (and a human
//! operator) can read an analysis's result without going through IPC.

use std::fs::{self, File};
use std::path::Path;

use warden_core::{Analysis, Paths, Task};

use crate::error::StorageResult;

/// Writes `analysis.json` for `analysis`, creating its directory tree if
/// this is the analysis's first write.
pub fn write_analysis(paths: &Paths, analysis: &Analysis) -> StorageResult<()> {
    let path = paths.analysis_json(&analysis.id);
    write_json_atomic(&path, analysis)
}

pub fn read_analysis(paths: &Paths, id: &warden_core::AnalysisId) -> StorageResult<Analysis> {
    let file = File::open(paths.analysis_json(id))?;
    Ok(serde_json::from_reader(file)?)
}

/// Writes `task_<n>/task.json` for `task`.
pub fn write_task(paths: &Paths, task: &Task) -> StorageResult<()> {
    let path = paths.task_json(&task.id);
    write_json_atomic(&path, task)
}

pub fn read_task(paths: &Paths, task_id: &warden_core::TaskId) -> StorageResult<Task> {
    let file = File::open(paths.task_json(task_id))?;
    Ok(serde_json::from_reader(file)?)
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_path)?;
        serde_json::to_writer_pretty(&file, value)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "analysis_store_tests.rs"]
mod tests;
