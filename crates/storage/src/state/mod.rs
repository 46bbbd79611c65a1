// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state rebuilt by replaying the write-ahead log (§4, §6).
//!
//! Analyses, tasks, and machines are facts derived by folding
//! [`crate::event::StorageEvent`]s over the materialized state — apply
//! handlers are idempotent so replaying the same entry twice
//! during recovery never double-applies a state change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use warden_core::{Analysis, Machine, Task, TaskId, TaskState};

use crate::event::StorageEvent;

mod helpers;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub analyses: HashMap<String, Analysis>,
    pub tasks: HashMap<String, Task>,
    pub machines: HashMap<String, Machine>,
}

impl MaterializedState {
    pub fn get_analysis(&self, id: &str) -> Option<&Analysis> {
        helpers::find_by_prefix(&self.analyses, id)
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        helpers::find_by_prefix(&self.tasks, id)
    }

    pub fn get_machine(&self, name: &str) -> Option<&Machine> {
        self.machines.get(name)
    }

    /// Applies one logged event. All handlers are idempotent: replaying the
    /// same entry twice (once for immediate visibility, once during WAL
    /// recovery) must leave state identical to applying it once.
    pub fn apply(&mut self, event: &StorageEvent) {
        match event {
            StorageEvent::AnalysisCreated { analysis } => {
                self.analyses.entry(analysis.id.to_string()).or_insert_with(|| analysis.clone());
            }
            StorageEvent::AnalysisStateChanged { analysis_id, state } => {
                if let Some(analysis) = self.analyses.get_mut(analysis_id) {
                    analysis.state = state.clone();
                }
            }
            StorageEvent::AnalysisUpdated { analysis } => {
                self.analyses.insert(analysis.id.to_string(), analysis.clone());
            }
            StorageEvent::TaskEnqueued { task } => {
                self.tasks.entry(task.id.to_string()).or_insert_with(|| task.clone());
            }
            StorageEvent::TaskDequeued { task_id, machine } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.machine_name = Some(machine.clone());
                    task.state = TaskState::Running;
                }
            }
            StorageEvent::TaskStateChanged { task_id, state } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.state = state.clone();
                }
            }
            StorageEvent::MachineUpserted { machine } => {
                self.machines.insert(machine.name.clone(), machine.clone());
            }
            StorageEvent::MachineStateChanged { name, state } => {
                if let Some(machine) = self.machines.get_mut(name) {
                    machine.state = state.clone();
                }
            }
            StorageEvent::MachineLocked { name, task_id } => {
                if let (Some(machine), Ok(task_id)) = (self.machines.get_mut(name), TaskId::from_string(task_id)) {
                    if machine.locked_by.as_ref() != Some(&task_id) {
                        let _ = machine.lock(task_id);
                    }
                }
            }
            StorageEvent::MachineReleased { name } => {
                if let Some(machine) = self.machines.get_mut(name) {
                    let _ = machine.release();
                }
            }
            StorageEvent::Shutdown => {}
        }
    }

    /// Terminal analyses/tasks still present (for e.g. retention sweeps).
    pub fn terminal_analysis_count(&self) -> usize {
        self.analyses.values().filter(|a| a.state.is_terminal()).count()
    }

    pub fn available_machines(&self) -> impl Iterator<Item = &Machine> {
        self.machines.values().filter(|m| m.is_available())
    }

    /// Tasks still waiting to be scheduled. Used at startup to rebuild the
    /// in-memory task queue, which is never itself persisted — only the
    /// task records its entries are built from survive a restart.
    pub fn pending_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|t| matches!(t.state, TaskState::Pending))
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
