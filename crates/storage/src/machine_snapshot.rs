// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dump/load of `operational/generated/machinestates.json` (§6): the
//! machinery manager's inventory, written so operators and other tooling can
//! inspect machine state without opening a socket.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use serde::{Deserialize, Serialize};
use warden_core::Machine;

use crate::error::StorageResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MachineStatesFile {
    machines: BTreeMap<String, Machine>,
}

/// Dumps `machines` to `path`, atomically (P6: never empty or partially
/// written). Keyed and sorted by machine name so repeated dumps of
/// unchanged inventory produce byte-identical files.
pub fn dump(path: &Path, machines: &[Machine]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = MachineStatesFile { machines: machines.iter().map(|m| (m.name.clone(), m.clone())).collect() };

    let tmp_path = path.with_extension("json.tmp");
    {
        let handle = File::create(&tmp_path)?;
        serde_json::to_writer_pretty(&handle, &file)?;
        handle.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Loads the machine inventory previously written by [`dump`]. A missing
/// file is an empty inventory, not an error — first boot has no snapshot yet.
pub fn load(path: &Path) -> StorageResult<Vec<Machine>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let parsed: MachineStatesFile = serde_json::from_reader(file)?;
    Ok(parsed.machines.into_values().collect())
}

#[cfg(test)]
#[path = "machine_snapshot_tests.rs"]
mod tests;
