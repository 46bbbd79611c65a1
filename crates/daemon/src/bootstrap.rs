// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Working-directory initialization (`warden createcwd`) and the startup
//! recovery path: load the last snapshot, replay the WAL after it, and
//! rebuild the in-memory [`TaskQueue`] and machine inventory the durable
//! records imply.
//!
//! Grounded on the directory layout `warden_core::paths::Paths` already
//! encodes and on `original_source/common/cuckoo/common/storage.py`'s
//! `_CuckooCWD.create`: a handful of directories and a `.cuckoocwd` marker
//! file, checked for before anything else runs.

use std::fs;

use tracing::info;
use warden_core::{Config, Machine, Paths};
use warden_storage::{load_machine_states, load_snapshot, MaterializedState, TaskQueue, Wal};

use crate::error::{DaemonError, DaemonResult};

const DEFAULT_CONFIG_TOML: &str = "default_platform = \"windows\"\n";

/// Creates the on-disk tree a fresh `CWD` needs and a default `conf/cuckoo.toml`.
/// Idempotent: re-running it on an already-initialized CWD is a no-op other
/// than re-creating any directory an operator deleted by hand.
pub fn createcwd(paths: &Paths) -> DaemonResult<()> {
    for dir in [
        paths.conf_dir(),
        paths.sockets_dir(),
        paths.untracked_dir(),
        paths.cwd().join("storage").join("binaries"),
        paths.cwd().join("storage").join("analyses"),
        paths.cwd().join("operational").join("generated"),
        paths.cwd().join("operational").join("logs"),
    ] {
        fs::create_dir_all(&dir)?;
    }

    let config_path = paths.conf_dir().join("cuckoo.toml");
    if !config_path.exists() {
        fs::write(&config_path, DEFAULT_CONFIG_TOML)?;
    }

    if !paths.cwd_marker().exists() {
        fs::write(paths.cwd_marker(), "")?;
    }

    info!(cwd = %paths.cwd().display(), "initialized working directory");
    Ok(())
}

pub fn is_initialized(paths: &Paths) -> bool {
    paths.cwd_marker().exists()
}

pub fn require_initialized(paths: &Paths) -> DaemonResult<()> {
    if is_initialized(paths) {
        Ok(())
    } else {
        Err(DaemonError::NotInitialized(paths.cwd().to_path_buf()))
    }
}

/// Loads `conf/cuckoo.toml`, falling back to defaults if the file is absent
/// (e.g. a CWD created by an older `createcwd` run).
pub fn load_config(paths: &Paths) -> DaemonResult<Config> {
    let config_path = paths.conf_dir().join("cuckoo.toml");
    let config = if config_path.exists() {
        let raw = fs::read_to_string(&config_path)?;
        Config::from_toml_str(&raw)?
    } else {
        Config::default()
    };
    Ok(config)
}

/// The durable state recovered at startup: the WAL positioned for further
/// appends, the materialized state folded from the last snapshot plus
/// whatever entries came after it, and a queue pre-loaded with every task
/// still `Pending` (the queue itself is never persisted).
pub struct RecoveredState {
    pub wal: Wal,
    pub state: MaterializedState,
    pub queue: TaskQueue,
}

/// Replays durable storage: load the last snapshot (if any), open the WAL
/// positioned after its sequence number, and fold every remaining entry in
/// order. A first boot with no snapshot and an empty WAL yields empty state.
pub fn recover(paths: &Paths) -> DaemonResult<RecoveredState> {
    let snapshot = load_snapshot(&paths.state_snapshot_file())?;

    let (processed_seq, mut state) = match snapshot {
        Some(snap) => (snap.seq, snap.state),
        None => (0, MaterializedState::default()),
    };

    let mut wal = Wal::open(paths.db_file(), processed_seq)?;
    while let Some(entry) = wal.next_unprocessed()? {
        state.apply(&entry.event);
        wal.mark_processed(entry.seq);
    }
    wal.flush()?;

    let queue = TaskQueue::new();
    for task in state.pending_tasks() {
        queue.push(task.clone());
    }

    info!(
        analyses = state.analyses.len(),
        tasks = state.tasks.len(),
        pending = queue.len(),
        "recovered durable state"
    );

    Ok(RecoveredState { wal, state, queue })
}

/// Loads the machine inventory from the last-dumped snapshot, or an empty
/// fleet on first boot. Machine provisioning itself (describing real VMs to
/// the machinery manager) is operator-driven and out of scope here.
pub fn load_machines(paths: &Paths) -> DaemonResult<Vec<Machine>> {
    let path = paths.machine_snapshot_file();
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(load_machine_states(&path)?)
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
