// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable write-ahead log's event vocabulary: every fact recorded about
//! an analysis, task, or machine, scoped to this control plane's entities.

use serde::{Deserialize, Serialize};
use warden_core::{Analysis, AnalysisState, Machine, MachineState, Task, TaskState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StorageEvent {
    AnalysisCreated { analysis: Analysis },
    AnalysisStateChanged { analysis_id: String, state: AnalysisState },
    /// A richer analysis mutation (settings merge, error append, task list
    /// growth) that doesn't fit `AnalysisStateChanged`'s single-field shape —
    /// replaces the whole stored row.
    AnalysisUpdated { analysis: Analysis },
    TaskEnqueued { task: Task },
    TaskDequeued { task_id: String, machine: String },
    TaskStateChanged { task_id: String, state: TaskState },
    MachineUpserted { machine: Machine },
    MachineStateChanged { name: String, state: MachineState },
    MachineLocked { name: String, task_id: String },
    MachineReleased { name: String },
    /// Control event: the daemon is shutting down. Recorded so recovery can
    /// recognise where a prior run ended; the engine loop skips it, it is
    /// never replayed into materialized state.
    Shutdown,
}
