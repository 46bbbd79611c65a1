// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Paths`: every on-disk location the control plane touches, derived purely
//! from `CWD` via a typed helper instead of scattered string joins.

use std::path::{Path, PathBuf};

use crate::ids::{AnalysisId, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    cwd: PathBuf,
}

impl Paths {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Paths { cwd: cwd.into() }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn cwd_marker(&self) -> PathBuf {
        self.cwd.join(".cuckoocwd")
    }

    pub fn db_file(&self) -> PathBuf {
        self.cwd.join("cuckoo.db")
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.cwd.join("conf")
    }

    pub fn sockets_dir(&self) -> PathBuf {
        self.cwd.join("operational").join("sockets")
    }

    pub fn socket(&self, name: &str) -> PathBuf {
        self.sockets_dir().join(format!("{name}.sock"))
    }

    pub fn machine_snapshot_file(&self) -> PathBuf {
        self.cwd.join("operational").join("generated").join("machinestates.json")
    }

    pub fn state_snapshot_file(&self) -> PathBuf {
        self.cwd.join("operational").join("generated").join("snapshot.zst")
    }

    pub fn binary_blob(&self, sha256: &str) -> PathBuf {
        let (head, _) = sha256.split_at(sha256.len().min(2));
        self.cwd.join("storage").join("binaries").join(head).join(sha256)
    }

    pub fn untracked_marker(&self, id: &AnalysisId) -> PathBuf {
        self.cwd.join("storage").join("untracked").join(id.as_str())
    }

    pub fn untracked_dir(&self) -> PathBuf {
        self.cwd.join("storage").join("untracked")
    }

    pub fn analysis_dir(&self, id: &AnalysisId) -> PathBuf {
        self.cwd.join("storage").join("analyses").join(id.day()).join(id.as_str())
    }

    pub fn analysis_json(&self, id: &AnalysisId) -> PathBuf {
        self.analysis_dir(id).join("analysis.json")
    }

    pub fn identification_json(&self, id: &AnalysisId) -> PathBuf {
        self.analysis_dir(id).join("identification.json")
    }

    pub fn pre_json(&self, id: &AnalysisId) -> PathBuf {
        self.analysis_dir(id).join("pre.json")
    }

    pub fn filetree_json(&self, id: &AnalysisId) -> PathBuf {
        self.analysis_dir(id).join("filetree.json")
    }

    pub fn filemap_json(&self, id: &AnalysisId) -> PathBuf {
        self.analysis_dir(id).join("filemap.json")
    }

    pub fn binary_symlink(&self, id: &AnalysisId) -> PathBuf {
        self.analysis_dir(id).join("binary")
    }

    pub fn task_dir(&self, task_id: &TaskId) -> PathBuf {
        self.analysis_dir(&task_id.analysis_id()).join(format!("task_{}", task_id.task_number()))
    }

    pub fn task_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("task.json")
    }

    pub fn task_machine_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("machine.json")
    }

    pub fn task_logs_dir(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("logs")
    }

    pub fn task_memory_dump(&self, task_id: &TaskId) -> PathBuf {
        self.task_logs_dir(task_id).join("memory.dmp")
    }

    pub fn task_report_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("report.json")
    }

    pub fn task_run_err_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("run_err.json")
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
